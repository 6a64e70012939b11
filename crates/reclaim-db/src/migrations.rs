use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            user_id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name                TEXT NOT NULL,
            email                    TEXT NOT NULL UNIQUE,
            password_hash            TEXT NOT NULL,
            phone_number             TEXT,
            last_notifications_check TEXT,
            created_at               TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS items (
            item_id     INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(user_id),
            item_type   TEXT NOT NULL CHECK (item_type IN ('Lost', 'Found')),
            item_name   TEXT NOT NULL,
            description TEXT NOT NULL,
            location    TEXT NOT NULL,
            event_date  TEXT NOT NULL,
            category    TEXT NOT NULL,
            image_url   TEXT,
            posted_at   TEXT NOT NULL DEFAULT (datetime('now')),
            is_claimed  INTEGER NOT NULL DEFAULT 0,
            status      TEXT NOT NULL DEFAULT 'Active',
            claimed_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_items_owner
            ON items(user_id);

        -- Deliberately no foreign key to items: messages outlive listing
        -- deletion, and the inbox query inner-joins items so dead threads
        -- simply drop out of view.
        CREATE TABLE IF NOT EXISTS messages (
            message_id   INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id      INTEGER NOT NULL,
            sender_id    INTEGER NOT NULL REFERENCES users(user_id),
            receiver_id  INTEGER NOT NULL REFERENCES users(user_id),
            message_text TEXT NOT NULL,
            sent_at      TEXT NOT NULL DEFAULT (datetime('now')),
            is_read      INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_messages_item
            ON messages(item_id);

        CREATE INDEX IF NOT EXISTS idx_messages_receiver
            ON messages(receiver_id, is_read);

        CREATE TABLE IF NOT EXISTS notifications (
            notification_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         INTEGER NOT NULL REFERENCES users(user_id),
            title           TEXT NOT NULL,
            body            TEXT NOT NULL,
            kind            TEXT NOT NULL CHECK (kind IN ('new_post', 'message', 'claim')),
            item_id         INTEGER,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            is_read         INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, is_read);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
