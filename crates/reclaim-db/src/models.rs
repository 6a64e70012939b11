use reclaim_types::models::ItemType;

/// Database row types — these map directly to SQLite rows.
/// Distinct from the reclaim-types API models to keep the DB layer independent.

pub struct UserRow {
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub last_notifications_check: Option<String>,
    pub created_at: String,
}

pub struct ItemRow {
    pub item_id: i64,
    pub user_id: i64,
    pub item_type: String,
    pub item_name: String,
    pub description: String,
    pub location: String,
    pub event_date: String,
    pub category: String,
    pub image_url: Option<String>,
    pub posted_at: String,
    pub is_claimed: bool,
    pub status: String,
    pub claimed_at: Option<String>,
    pub poster_name: String,
    pub poster_phone: Option<String>,
}

/// Slim projection for ownership and claim checks.
pub struct ItemBriefRow {
    pub item_id: i64,
    pub user_id: i64,
    pub item_name: String,
    pub is_claimed: bool,
}

pub struct MessageRow {
    pub message_id: i64,
    pub item_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub message_text: String,
    pub sent_at: String,
    pub is_read: bool,
    pub sender_name: String,
}

pub struct ConversationRow {
    pub item_id: i64,
    pub item_name: String,
    pub item_type: String,
    pub image_url: Option<String>,
    pub other_user_id: i64,
    pub other_user_name: String,
    pub last_message_text: String,
    pub last_message_at: String,
    pub unread_count: i64,
}

pub struct NotificationRow {
    pub notification_id: i64,
    pub title: String,
    pub body: String,
    pub kind: String,
    pub item_id: Option<i64>,
    pub item_name: Option<String>,
    pub created_at: String,
    pub is_read: bool,
}

/// Column values for a new listing.
pub struct NewItem<'a> {
    pub user_id: i64,
    pub item_type: ItemType,
    pub item_name: &'a str,
    pub description: &'a str,
    pub location: &'a str,
    pub event_date: &'a str,
    pub category: &'a str,
    pub image_url: Option<&'a str>,
}

/// Column values for editing a listing. `None` keeps the stored value.
pub struct ItemUpdate<'a> {
    pub item_id: i64,
    pub user_id: i64,
    pub item_type: ItemType,
    pub item_name: &'a str,
    pub description: &'a str,
    pub location: Option<&'a str>,
    pub event_date: Option<&'a str>,
    pub category: Option<&'a str>,
}

/// Filters for the listing query. Absent fields mean no filter.
#[derive(Default)]
pub struct ItemFilter {
    pub item_type: Option<ItemType>,
    pub search: Option<String>,
    pub owner_id: Option<i64>,
}
