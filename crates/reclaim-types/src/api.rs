use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ItemType, NotificationKind};

// -- JWT Claims --

/// JWT claims issued on signup/signin and checked on every authenticated
/// action. Canonical definition lives here in reclaim-types so the API
/// layer and any future client share one shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id of the token holder.
    pub sub: i64,
    pub name: String,
    pub exp: usize,
}

// -- Response envelope --

/// Uniform response wrapper: `status` is "success" on every 2xx reply,
/// `message` is an optional human-readable note, and the payload fields
/// are flattened alongside them.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: Some(message.into()),
            data,
        }
    }
}

/// Empty payload for actions that only acknowledge.
#[derive(Debug, Default, Serialize)]
pub struct Ack {}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user_id: i64,
    pub full_name: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SigninResponse {
    pub user_id: i64,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub user_id: i64,
    pub full_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Required when `new_password` is set.
    #[serde(default)]
    pub current_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    pub full_name: String,
    pub phone_number: Option<String>,
}

// -- Items --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostItemRequest {
    pub user_id: i64,
    pub item_type: ItemType,
    pub item_name: String,
    pub description: String,
    pub location: String,
    pub event_date: String,
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostItemResponse {
    pub item_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchItemsRequest {
    /// `None` lists both lost and found items.
    #[serde(default)]
    pub item_type: Option<ItemType>,
    /// Case-insensitive match against item name, description and poster name.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub my_posts_only: bool,
    /// Owner filter, required when `my_posts_only` is set.
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ItemSummary {
    pub item_id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub item_type: ItemType,
    pub item_name: String,
    pub description: String,
    pub location: String,
    pub event_date: String,
    pub category: String,
    pub image_url: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub is_claimed: bool,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub items: Vec<ItemSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetItemDetailsRequest {
    pub item_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ItemDetails {
    pub item_id: i64,
    pub user_id: i64,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub item_type: ItemType,
    pub item_name: String,
    pub description: String,
    pub location: String,
    pub event_date: String,
    pub category: String,
    pub image_url: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub is_claimed: bool,
    pub status: String,
    pub claimed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ItemDetailsResponse {
    pub item: ItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateItemRequest {
    pub user_id: i64,
    pub item_id: i64,
    pub item_type: ItemType,
    pub item_name: String,
    pub description: String,
    /// Omitted fields keep their stored value.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteItemRequest {
    pub user_id: i64,
    pub item_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimItemRequest {
    pub user_id: i64,
    pub item_id: i64,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub item_id: i64,
    pub message_text: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchMessagesRequest {
    /// The viewer. Messages addressed to them in this thread get marked read.
    pub user_id: i64,
    /// The other participant.
    pub receiver_id: i64,
    pub item_id: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub message_id: i64,
    pub item_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub sender_name: String,
    pub message_text: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetUserConversationsRequest {
    pub user_id: i64,
}

/// One row of the inbox: the latest message of a thread plus enough
/// context to render it.
#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub item_id: i64,
    pub item_name: String,
    pub item_type: ItemType,
    pub image_url: Option<String>,
    pub other_user_id: i64,
    pub other_user_name: String,
    pub last_message_text: String,
    pub last_message_at: DateTime<Utc>,
    /// Unread messages from `other_user_id` in this thread.
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationView>,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetUnreadCountRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetUserNotificationsRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct NotificationView {
    pub notification_id: i64,
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    pub item_id: Option<i64>,
    /// Name of the referenced item, when it still exists.
    pub item_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationView>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkNotificationsReadRequest {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkNotificationsViewedRequest {
    pub user_id: i64,
}

// -- Dispatch --

/// Every API call arrives as one JSON object whose `action` field selects
/// the operation; the remaining fields are that operation's payload.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ApiRequest {
    /// Create an account and sign in
    Signup(SignupRequest),

    /// Exchange credentials for a token
    Signin(SigninRequest),

    /// Update name/phone and optionally rotate the password
    UpdateProfile(UpdateProfileRequest),

    /// Publish a lost or found listing
    PostItem(PostItemRequest),

    /// Browse listings with optional type/search/owner filters
    FetchItems(FetchItemsRequest),

    /// Full detail for one listing, including poster contact info
    GetItemDetails(GetItemDetailsRequest),

    /// Edit a listing (owner only)
    UpdateItem(UpdateItemRequest),

    /// Remove a listing (owner only)
    DeleteItem(DeleteItemRequest),

    /// Mark a listing recovered (owner only, once)
    ClaimItem(ClaimItemRequest),

    /// Send a chat message about an item
    SendMessage(SendMessageRequest),

    /// Read one thread and mark its incoming messages read
    FetchMessages(FetchMessagesRequest),

    /// Inbox: latest message per thread
    GetUserConversations(GetUserConversationsRequest),

    /// Badge count of unread notifications
    GetUnreadCount(GetUnreadCountRequest),

    /// Notification feed, newest first
    GetUserNotifications(GetUserNotificationsRequest),

    /// Flip every notification to read
    MarkNotificationsRead(MarkNotificationsReadRequest),

    /// Record that the notification panel was opened
    MarkNotificationsViewed(MarkNotificationsViewedRequest),
}

impl ApiRequest {
    /// The user id this request claims to act as, or `None` for public
    /// actions. The dispatcher checks it against the bearer token before
    /// any handler runs.
    pub fn actor_id(&self) -> Option<i64> {
        match self {
            Self::Signup(_) | Self::Signin(_) => None,
            Self::FetchItems(_) | Self::GetItemDetails(_) => None,
            Self::UpdateProfile(req) => Some(req.user_id),
            Self::PostItem(req) => Some(req.user_id),
            Self::UpdateItem(req) => Some(req.user_id),
            Self::DeleteItem(req) => Some(req.user_id),
            Self::ClaimItem(req) => Some(req.user_id),
            Self::SendMessage(req) => Some(req.sender_id),
            Self::FetchMessages(req) => Some(req.user_id),
            Self::GetUserConversations(req) => Some(req.user_id),
            Self::GetUnreadCount(req) => Some(req.user_id),
            Self::GetUserNotifications(req) => Some(req.user_id),
            Self::MarkNotificationsRead(req) => Some(req.user_id),
            Self::MarkNotificationsViewed(req) => Some(req.user_id),
        }
    }
}
