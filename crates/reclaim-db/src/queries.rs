use crate::Database;
use crate::models::{
    ConversationRow, ItemBriefRow, ItemFilter, ItemRow, ItemUpdate, MessageRow, NewItem,
    NotificationRow, UserRow,
};
use anyhow::Result;
use reclaim_types::models::{ConversationKey, NotificationKind};
use rusqlite::Connection;
use rusqlite::types::Value;

impl Database {
    // -- Users --

    pub fn create_user(&self, full_name: &str, email: &str, password_hash: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (full_name, email, password_hash) VALUES (?1, ?2, ?3)",
                (full_name, email, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, user_id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, user_id))
    }

    pub fn get_display_name(&self, user_id: i64) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT full_name FROM users WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn update_profile(
        &self,
        user_id: i64,
        full_name: &str,
        phone_number: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = if let Some(hash) = password_hash {
                conn.execute(
                    "UPDATE users SET full_name = ?1, phone_number = ?2, password_hash = ?3
                     WHERE user_id = ?4",
                    rusqlite::params![full_name, phone_number, hash, user_id],
                )?
            } else {
                conn.execute(
                    "UPDATE users SET full_name = ?1, phone_number = ?2 WHERE user_id = ?3",
                    rusqlite::params![full_name, phone_number, user_id],
                )?
            };
            Ok(changed > 0)
        })
    }

    pub fn touch_notifications_check(&self, user_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET last_notifications_check = datetime('now') WHERE user_id = ?1",
                [user_id],
            )?;
            Ok(())
        })
    }

    /// Everyone who should hear about a new listing.
    pub fn all_user_ids_except(&self, user_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT user_id FROM users WHERE user_id != ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }

    // -- Items --

    pub fn insert_item(&self, item: &NewItem<'_>) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO items (user_id, item_type, item_name, description, location, event_date, category, image_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    item.user_id,
                    item.item_type.as_str(),
                    item.item_name,
                    item.description,
                    item.location,
                    item.event_date,
                    item.category,
                    item.image_url,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_item(&self, item_id: i64) -> Result<Option<ItemRow>> {
        self.with_conn(|conn| query_item(conn, item_id))
    }

    pub fn get_item_brief(&self, item_id: i64) -> Result<Option<ItemBriefRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT item_id, user_id, item_name, is_claimed FROM items WHERE item_id = ?1",
                [item_id],
                |row| {
                    Ok(ItemBriefRow {
                        item_id: row.get(0)?,
                        user_id: row.get(1)?,
                        item_name: row.get(2)?,
                        is_claimed: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn list_items(&self, filter: &ItemFilter) -> Result<Vec<ItemRow>> {
        self.with_conn(|conn| query_items(conn, filter))
    }

    pub fn update_item(&self, update: &ItemUpdate<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE items
                 SET item_type = ?1,
                     item_name = ?2,
                     description = ?3,
                     location = COALESCE(?4, location),
                     event_date = COALESCE(?5, event_date),
                     category = COALESCE(?6, category)
                 WHERE item_id = ?7 AND user_id = ?8",
                rusqlite::params![
                    update.item_type.as_str(),
                    update.item_name,
                    update.description,
                    update.location,
                    update.event_date,
                    update.category,
                    update.item_id,
                    update.user_id,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_item(&self, item_id: i64, owner_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM items WHERE item_id = ?1 AND user_id = ?2",
                rusqlite::params![item_id, owner_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Atomically flip an unclaimed item to claimed/Recovered. The guard on
    /// `is_claimed` means concurrent claims change at most one row in total:
    /// whoever loses the race gets `false`.
    pub fn claim_item(&self, item_id: i64, owner_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE items
                 SET is_claimed = 1, status = 'Recovered', claimed_at = datetime('now')
                 WHERE item_id = ?1 AND user_id = ?2 AND is_claimed = 0",
                rusqlite::params![item_id, owner_id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        item_id: i64,
        sender_id: i64,
        receiver_id: i64,
        message_text: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (item_id, sender_id, receiver_id, message_text)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![item_id, sender_id, receiver_id, message_text],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_conversation_messages(&self, key: &ConversationKey) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_conversation_messages(conn, key))
    }

    /// Mark one direction of a thread read: messages sent by `other_id` to
    /// `viewer_id` about this item. The viewer's own outgoing messages are
    /// untouched, as is every other thread.
    pub fn mark_conversation_read(
        &self,
        item_id: i64,
        viewer_id: i64,
        other_id: i64,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let marked = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE item_id = ?1 AND receiver_id = ?2 AND sender_id = ?3 AND is_read = 0",
                rusqlite::params![item_id, viewer_id, other_id],
            )?;
            Ok(marked)
        })
    }

    pub fn get_conversations(&self, user_id: i64) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| query_conversations(conn, user_id))
    }

    /// Distinct users who have messaged about an item, minus `exclude_user`.
    pub fn get_chatter_ids(&self, item_id: i64, exclude_user: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM (
                     SELECT sender_id AS user_id FROM messages WHERE item_id = ?1
                     UNION
                     SELECT receiver_id FROM messages WHERE item_id = ?1
                 ) WHERE user_id != ?2",
            )?;
            let ids = stmt
                .query_map(rusqlite::params![item_id, exclude_user], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }

    // -- Notifications --

    pub fn insert_notification(
        &self,
        user_id: i64,
        title: &str,
        body: &str,
        kind: NotificationKind,
        item_id: Option<i64>,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (user_id, title, body, kind, item_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![user_id, title, body, kind.as_str(), item_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn unread_notification_count(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn get_notifications(&self, user_id: i64, limit: u32) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| query_notifications(conn, user_id, limit))
    }

    pub fn mark_notifications_read(&self, user_id: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let marked = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                [user_id],
            )?;
            Ok(marked)
        })
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, full_name, email, password_hash, phone_number,
                last_notifications_check, created_at
         FROM users WHERE email = ?1",
    )?;

    let row = stmt.query_row([email], map_user_row).optional()?;
    Ok(row)
}

fn query_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, full_name, email, password_hash, phone_number,
                last_notifications_check, created_at
         FROM users WHERE user_id = ?1",
    )?;

    let row = stmt.query_row([user_id], map_user_row).optional()?;
    Ok(row)
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        user_id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        phone_number: row.get(4)?,
        last_notifications_check: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn query_item(conn: &Connection, item_id: i64) -> Result<Option<ItemRow>> {
    // JOIN users for the poster's name and phone in a single query
    let mut stmt = conn.prepare(
        "SELECT i.item_id, i.user_id, i.item_type, i.item_name, i.description,
                i.location, i.event_date, i.category, i.image_url, i.posted_at,
                i.is_claimed, i.status, i.claimed_at, u.full_name, u.phone_number
         FROM items i
         JOIN users u ON u.user_id = i.user_id
         WHERE i.item_id = ?1",
    )?;

    let row = stmt.query_row([item_id], map_item_row).optional()?;
    Ok(row)
}

fn query_items(conn: &Connection, filter: &ItemFilter) -> Result<Vec<ItemRow>> {
    let mut sql = String::from(
        "SELECT i.item_id, i.user_id, i.item_type, i.item_name, i.description,
                i.location, i.event_date, i.category, i.image_url, i.posted_at,
                i.is_claimed, i.status, i.claimed_at, u.full_name, u.phone_number
         FROM items i
         JOIN users u ON u.user_id = i.user_id
         WHERE 1=1",
    );
    let mut params: Vec<Value> = Vec::new();

    if let Some(item_type) = filter.item_type {
        sql.push_str(" AND i.item_type = ?");
        params.push(item_type.as_str().to_string().into());
    }
    if let Some(owner_id) = filter.owner_id {
        sql.push_str(" AND i.user_id = ?");
        params.push(owner_id.into());
    }
    if let Some(search) = filter.search.as_deref() {
        sql.push_str(" AND (i.item_name LIKE ? OR i.description LIKE ? OR u.full_name LIKE ?)");
        let pattern = format!("%{search}%");
        params.push(pattern.clone().into());
        params.push(pattern.clone().into());
        params.push(pattern.into());
    }
    sql.push_str(" ORDER BY i.posted_at DESC, i.item_id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), map_item_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn map_item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        item_id: row.get(0)?,
        user_id: row.get(1)?,
        item_type: row.get(2)?,
        item_name: row.get(3)?,
        description: row.get(4)?,
        location: row.get(5)?,
        event_date: row.get(6)?,
        category: row.get(7)?,
        image_url: row.get(8)?,
        posted_at: row.get(9)?,
        is_claimed: row.get(10)?,
        status: row.get(11)?,
        claimed_at: row.get(12)?,
        poster_name: row.get(13)?,
        poster_phone: row.get(14)?,
    })
}

fn query_conversation_messages(conn: &Connection, key: &ConversationKey) -> Result<Vec<MessageRow>> {
    // JOIN users for the sender's display name in a single query.
    // The symmetric sender/receiver predicate covers both directions of
    // the normalized pair.
    let mut stmt = conn.prepare(
        "SELECT m.message_id, m.item_id, m.sender_id, m.receiver_id,
                m.message_text, m.sent_at, m.is_read, u.full_name
         FROM messages m
         JOIN users u ON u.user_id = m.sender_id
         WHERE m.item_id = ?1
           AND ((m.sender_id = ?2 AND m.receiver_id = ?3)
             OR (m.sender_id = ?3 AND m.receiver_id = ?2))
         ORDER BY m.sent_at ASC, m.message_id ASC",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![key.item_id, key.low, key.high], |row| {
            Ok(MessageRow {
                message_id: row.get(0)?,
                item_id: row.get(1)?,
                sender_id: row.get(2)?,
                receiver_id: row.get(3)?,
                message_text: row.get(4)?,
                sent_at: row.get(5)?,
                is_read: row.get(6)?,
                sender_name: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_conversations(conn: &Connection, user_id: i64) -> Result<Vec<ConversationRow>> {
    // One inbox row per (item, participant pair). The scalar MIN/MAX in the
    // GROUP BY normalize the pair so both directions land in the same group,
    // and MAX(message_id) picks the latest message because ids are assigned
    // in insert order. The INNER JOIN on items hides threads whose listing
    // was deleted; the correlated subquery counts unread messages from the
    // other party only.
    let mut stmt = conn.prepare(
        "SELECT m.item_id, i.item_name, i.item_type, i.image_url,
                u.user_id, u.full_name, m.message_text, m.sent_at,
                (SELECT COUNT(*) FROM messages sub
                 WHERE sub.item_id = m.item_id
                   AND sub.receiver_id = ?1
                   AND sub.sender_id = u.user_id
                   AND sub.is_read = 0) AS unread_count
         FROM messages m
         JOIN (SELECT MAX(message_id) AS latest_id
               FROM messages
               WHERE sender_id = ?1 OR receiver_id = ?1
               GROUP BY item_id, MIN(sender_id, receiver_id), MAX(sender_id, receiver_id)) latest
           ON latest.latest_id = m.message_id
         JOIN items i ON i.item_id = m.item_id
         JOIN users u ON u.user_id = CASE WHEN m.sender_id = ?1 THEN m.receiver_id ELSE m.sender_id END
         ORDER BY m.sent_at DESC, m.message_id DESC",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(ConversationRow {
                item_id: row.get(0)?,
                item_name: row.get(1)?,
                item_type: row.get(2)?,
                image_url: row.get(3)?,
                other_user_id: row.get(4)?,
                other_user_name: row.get(5)?,
                last_message_text: row.get(6)?,
                last_message_at: row.get(7)?,
                unread_count: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_notifications(conn: &Connection, user_id: i64, limit: u32) -> Result<Vec<NotificationRow>> {
    // LEFT JOIN: the referenced listing may have been deleted since.
    let mut stmt = conn.prepare(
        "SELECT n.notification_id, n.title, n.body, n.kind, n.item_id,
                i.item_name, n.created_at, n.is_read
         FROM notifications n
         LEFT JOIN items i ON i.item_id = n.item_id
         WHERE n.user_id = ?1
         ORDER BY n.created_at DESC, n.notification_id DESC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![user_id, limit], |row| {
            Ok(NotificationRow {
                notification_id: row.get(0)?,
                title: row.get(1)?,
                body: row.get(2)?,
                kind: row.get(3)?,
                item_id: row.get(4)?,
                item_name: row.get(5)?,
                created_at: row.get(6)?,
                is_read: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reclaim_types::models::ItemType;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, name: &str) -> i64 {
        let email = format!("{}@example.com", name.to_lowercase());
        db.create_user(name, &email, "argon2-hash").unwrap()
    }

    fn seed_item(db: &Database, owner_id: i64, item_name: &str) -> i64 {
        db.insert_item(&NewItem {
            user_id: owner_id,
            item_type: ItemType::Lost,
            item_name,
            description: "left on the 42 bus",
            location: "Main St station",
            event_date: "2025-06-01",
            category: "Electronics",
            image_url: None,
        })
        .unwrap()
    }

    #[test]
    fn users_round_trip_by_email_and_id() {
        let db = test_db();
        let id = seed_user(&db, "Ana");

        let by_email = db.get_user_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(by_email.user_id, id);
        assert_eq!(by_email.full_name, "Ana");
        assert_eq!(by_email.password_hash, "argon2-hash");
        assert!(by_email.phone_number.is_none());

        let by_id = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(by_id.email, "ana@example.com");

        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn update_profile_keeps_or_rotates_password() {
        let db = test_db();
        let id = seed_user(&db, "Ana");

        assert!(db.update_profile(id, "Ana M.", Some("555-0100"), None).unwrap());
        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.full_name, "Ana M.");
        assert_eq!(user.phone_number.as_deref(), Some("555-0100"));
        assert_eq!(user.password_hash, "argon2-hash");

        assert!(db.update_profile(id, "Ana M.", Some("555-0100"), Some("new-hash")).unwrap());
        let user = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(user.password_hash, "new-hash");
    }

    #[test]
    fn message_ids_grow_in_insert_order() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");
        let item = seed_item(&db, ana, "Black Wallet");

        let first = db.insert_message(item, ana, ben, "first").unwrap();
        let second = db.insert_message(item, ben, ana, "second").unwrap();
        assert!(second > first);
    }

    #[test]
    fn conversation_messages_cover_both_directions_in_order() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");
        let item = seed_item(&db, ana, "Black Wallet");

        db.insert_message(item, ben, ana, "Is this yours?").unwrap();
        db.insert_message(item, ana, ben, "Yes! Where did you find it?").unwrap();
        db.insert_message(item, ben, ana, "On the 42 bus.").unwrap();

        let key = ConversationKey::new(item, ana, ben);
        let messages = db.get_conversation_messages(&key).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].message_text, "Is this yours?");
        assert_eq!(messages[0].sender_name, "Ben");
        assert_eq!(messages[1].message_text, "Yes! Where did you find it?");
        assert_eq!(messages[2].message_text, "On the 42 bus.");

        // Same thread no matter which side builds the key
        let flipped = ConversationKey::new(item, ben, ana);
        assert_eq!(db.get_conversation_messages(&flipped).unwrap().len(), 3);
    }

    #[test]
    fn conversations_group_by_pair_not_direction() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");
        let item = seed_item(&db, ana, "Black Wallet");

        db.insert_message(item, ana, ben, "one").unwrap();
        db.insert_message(item, ben, ana, "two").unwrap();
        db.insert_message(item, ana, ben, "three").unwrap();

        let inbox = db.get_conversations(ana).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].last_message_text, "three");
        assert_eq!(inbox[0].other_user_id, ben);
        assert_eq!(inbox[0].other_user_name, "Ben");
        // Unread from Ben toward Ana: just "two"
        assert_eq!(inbox[0].unread_count, 1);

        let inbox = db.get_conversations(ben).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].other_user_id, ana);
        // Unread from Ana toward Ben: "one" and "three"
        assert_eq!(inbox[0].unread_count, 2);
    }

    #[test]
    fn conversations_split_per_item_and_per_peer() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");
        let cleo = seed_user(&db, "Cleo");
        let wallet = seed_item(&db, ana, "Black Wallet");
        let keys = seed_item(&db, ana, "House Keys");

        db.insert_message(wallet, ben, ana, "wallet thread").unwrap();
        db.insert_message(keys, ben, ana, "keys thread").unwrap();
        db.insert_message(wallet, cleo, ana, "other finder").unwrap();

        let inbox = db.get_conversations(ana).unwrap();
        assert_eq!(inbox.len(), 3);
        // Newest thread first; equal timestamps fall back to message id
        assert_eq!(inbox[0].last_message_text, "other finder");
        assert_eq!(inbox[1].last_message_text, "keys thread");
        assert_eq!(inbox[2].last_message_text, "wallet thread");

        // Ben sees two threads, Cleo one
        assert_eq!(db.get_conversations(ben).unwrap().len(), 2);
        assert_eq!(db.get_conversations(cleo).unwrap().len(), 1);
    }

    #[test]
    fn conversations_hide_deleted_listings() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");
        let item = seed_item(&db, ana, "Black Wallet");

        db.insert_message(item, ben, ana, "still there?").unwrap();
        assert_eq!(db.get_conversations(ana).unwrap().len(), 1);

        assert!(db.delete_item(item, ana).unwrap());
        assert!(db.get_conversations(ana).unwrap().is_empty());
        // The messages themselves survive the deletion
        let key = ConversationKey::new(item, ana, ben);
        assert_eq!(db.get_conversation_messages(&key).unwrap().len(), 1);
    }

    #[test]
    fn mark_conversation_read_is_scoped_and_directional() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");
        let wallet = seed_item(&db, ana, "Black Wallet");
        let keys = seed_item(&db, ana, "House Keys");

        db.insert_message(wallet, ben, ana, "to ana 1").unwrap();
        db.insert_message(wallet, ben, ana, "to ana 2").unwrap();
        db.insert_message(wallet, ana, ben, "to ben").unwrap();
        db.insert_message(keys, ben, ana, "other thread").unwrap();

        // Ana opens the wallet thread
        let marked = db.mark_conversation_read(wallet, ana, ben).unwrap();
        assert_eq!(marked, 2);

        let key = ConversationKey::new(wallet, ana, ben);
        let messages = db.get_conversation_messages(&key).unwrap();
        assert!(messages[0].is_read);
        assert!(messages[1].is_read);
        // Ana's own outgoing message is not touched
        assert!(!messages[2].is_read);

        // The keys thread stays unread
        let other = db.get_conversation_messages(&ConversationKey::new(keys, ana, ben)).unwrap();
        assert!(!other[0].is_read);

        // Marking again is a no-op
        assert_eq!(db.mark_conversation_read(wallet, ana, ben).unwrap(), 0);
    }

    #[test]
    fn claim_item_succeeds_exactly_once() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let item = seed_item(&db, ana, "Black Wallet");

        assert!(db.claim_item(item, ana).unwrap());
        let row = db.get_item(item).unwrap().unwrap();
        assert!(row.is_claimed);
        assert_eq!(row.status, "Recovered");
        assert!(row.claimed_at.is_some());

        // Second claim loses the guard
        assert!(!db.claim_item(item, ana).unwrap());
    }

    #[test]
    fn claim_item_checks_ownership() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");
        let item = seed_item(&db, ana, "Black Wallet");

        assert!(!db.claim_item(item, ben).unwrap());
        assert!(!db.get_item(item).unwrap().unwrap().is_claimed);
    }

    #[test]
    fn chatter_ids_deduplicate_and_exclude() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");
        let cleo = seed_user(&db, "Cleo");
        let item = seed_item(&db, ana, "Black Wallet");

        db.insert_message(item, ben, ana, "a").unwrap();
        db.insert_message(item, ana, ben, "b").unwrap();
        db.insert_message(item, cleo, ana, "c").unwrap();

        let mut chatters = db.get_chatter_ids(item, ana).unwrap();
        chatters.sort_unstable();
        assert_eq!(chatters, vec![ben, cleo]);
    }

    #[test]
    fn notification_counts_track_reads() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");

        for n in 0..3 {
            db.insert_notification(ana, "t", &format!("b{n}"), NotificationKind::Message, None)
                .unwrap();
        }
        db.insert_notification(ben, "t", "b", NotificationKind::Claim, None).unwrap();

        assert_eq!(db.unread_notification_count(ana).unwrap(), 3);
        assert_eq!(db.mark_notifications_read(ana).unwrap(), 3);
        assert_eq!(db.unread_notification_count(ana).unwrap(), 0);
        // Marking again touches nothing
        assert_eq!(db.mark_notifications_read(ana).unwrap(), 0);
        // Ben's notification is untouched
        assert_eq!(db.unread_notification_count(ben).unwrap(), 1);

        // A fresh insert starts the count again
        db.insert_notification(ana, "t", "b3", NotificationKind::NewPost, None).unwrap();
        assert_eq!(db.unread_notification_count(ana).unwrap(), 1);
    }

    #[test]
    fn notifications_list_newest_first_with_listing_names() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let item = seed_item(&db, ana, "Black Wallet");
        let gone = seed_item(&db, ana, "Umbrella");
        assert!(db.delete_item(gone, ana).unwrap());

        db.insert_notification(ana, "first", "b", NotificationKind::NewPost, Some(item)).unwrap();
        db.insert_notification(ana, "second", "b", NotificationKind::Message, Some(gone)).unwrap();
        db.insert_notification(ana, "third", "b", NotificationKind::Claim, None).unwrap();

        let feed = db.get_notifications(ana, 50).unwrap();
        assert_eq!(feed.len(), 3);
        assert_eq!(feed[0].title, "third");
        assert!(feed[0].item_name.is_none());
        // The listing behind "second" was deleted, so no name resolves
        assert_eq!(feed[1].title, "second");
        assert!(feed[1].item_name.is_none());
        assert_eq!(feed[2].title, "first");
        assert_eq!(feed[2].item_name.as_deref(), Some("Black Wallet"));
        assert_eq!(feed[2].kind, "new_post");
    }

    #[test]
    fn list_items_applies_type_owner_and_search_filters() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");
        let wallet = seed_item(&db, ana, "Black Wallet");
        db.insert_item(&NewItem {
            user_id: ben,
            item_type: ItemType::Found,
            item_name: "Blue Umbrella",
            description: "found near the fountain",
            location: "City Park",
            event_date: "2025-06-02",
            category: "Accessories",
            image_url: Some("https://img.example.com/umbrella.jpg"),
        })
        .unwrap();

        let all = db.list_items(&ItemFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        let lost = db
            .list_items(&ItemFilter { item_type: Some(ItemType::Lost), ..Default::default() })
            .unwrap();
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].item_id, wallet);

        let mine = db
            .list_items(&ItemFilter { owner_id: Some(ben), ..Default::default() })
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].item_name, "Blue Umbrella");
        assert_eq!(mine[0].poster_name, "Ben");

        // Search matches name, description and poster name, case-insensitively
        let by_name = db
            .list_items(&ItemFilter { search: Some("umbrella".into()), ..Default::default() })
            .unwrap();
        assert_eq!(by_name.len(), 1);

        let by_description = db
            .list_items(&ItemFilter { search: Some("fountain".into()), ..Default::default() })
            .unwrap();
        assert_eq!(by_description.len(), 1);

        let by_poster = db
            .list_items(&ItemFilter { search: Some("ana".into()), ..Default::default() })
            .unwrap();
        assert_eq!(by_poster.len(), 1);
        assert_eq!(by_poster[0].item_id, wallet);
    }

    #[test]
    fn update_item_keeps_omitted_fields() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let item = seed_item(&db, ana, "Black Wallet");

        let changed = db
            .update_item(&ItemUpdate {
                item_id: item,
                user_id: ana,
                item_type: ItemType::Found,
                item_name: "Black Leather Wallet",
                description: "updated description",
                location: None,
                event_date: None,
                category: Some("Wallets"),
            })
            .unwrap();
        assert!(changed);

        let row = db.get_item(item).unwrap().unwrap();
        assert_eq!(row.item_type, "Found");
        assert_eq!(row.item_name, "Black Leather Wallet");
        assert_eq!(row.location, "Main St station");
        assert_eq!(row.event_date, "2025-06-01");
        assert_eq!(row.category, "Wallets");
    }

    #[test]
    fn update_and_delete_require_ownership() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");
        let item = seed_item(&db, ana, "Black Wallet");

        let changed = db
            .update_item(&ItemUpdate {
                item_id: item,
                user_id: ben,
                item_type: ItemType::Lost,
                item_name: "Hijacked",
                description: "nope",
                location: None,
                event_date: None,
                category: None,
            })
            .unwrap();
        assert!(!changed);

        assert!(!db.delete_item(item, ben).unwrap());
        assert!(db.get_item(item).unwrap().is_some());
    }

    #[test]
    fn touch_notifications_check_records_a_timestamp() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");

        assert!(db.get_user_by_id(ana).unwrap().unwrap().last_notifications_check.is_none());
        db.touch_notifications_check(ana).unwrap();
        assert!(db.get_user_by_id(ana).unwrap().unwrap().last_notifications_check.is_some());
    }

    #[test]
    fn all_user_ids_except_skips_the_actor() {
        let db = test_db();
        let ana = seed_user(&db, "Ana");
        let ben = seed_user(&db, "Ben");
        let cleo = seed_user(&db, "Cleo");

        let mut others = db.all_user_ids_except(ana).unwrap();
        others.sort_unstable();
        assert_eq!(others, vec![ben, cleo]);
    }
}
