use axum::{
    Json,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, warn};

use reclaim_db::Database;
use reclaim_db::models::NotificationRow;
use reclaim_types::api::{
    Ack, Envelope, GetUnreadCountRequest, GetUserNotificationsRequest,
    MarkNotificationsReadRequest, MarkNotificationsViewedRequest, NotificationListResponse,
    NotificationView, UnreadCountResponse,
};
use reclaim_types::models::{ItemType, NotificationKind, parse_db_timestamp, preview};

use crate::error::{ApiError, join_error};
use crate::state::AppState;

/// How many entries the feed returns at most.
const FEED_LIMIT: u32 = 50;

/// How many characters of a message make it into the notification body.
const PREVIEW_CHARS: usize = 50;

// -- Fan-out (called from inside blocking sections) --

/// Insert one notification row. Failures are logged and swallowed: a
/// notification must never abort the operation that produced it.
pub(crate) fn notify(
    db: &Database,
    user_id: i64,
    title: &str,
    body: &str,
    kind: NotificationKind,
    item_id: Option<i64>,
) -> bool {
    match db.insert_notification(user_id, title, body, kind, item_id) {
        Ok(_) => true,
        Err(e) => {
            error!("Failed to notify user {}: {:#}", user_id, e);
            false
        }
    }
}

/// Notify the receiver of a direct message with a short preview.
pub(crate) fn notify_new_message(
    db: &Database,
    item_id: i64,
    sender_id: i64,
    receiver_id: i64,
    message_text: &str,
) {
    let title = match db.get_item_brief(item_id) {
        Ok(Some(brief)) => format!("New Message about: {}", brief.item_name),
        Ok(None) => format!("New Message about: Item ID {item_id}"),
        Err(e) => {
            warn!("Item lookup failed for message notification: {:#}", e);
            format!("New Message about: Item ID {item_id}")
        }
    };

    let sender_name = display_name_or(db, sender_id, "A user");
    let body = format!("{sender_name}: {}", preview(message_text, PREVIEW_CHARS));

    notify(db, receiver_id, &title, &body, NotificationKind::Message, Some(item_id));
}

/// Tell every other account about a fresh listing.
pub(crate) fn fan_out_new_post(
    db: &Database,
    poster_id: i64,
    item_id: i64,
    item_type: ItemType,
    item_name: &str,
) {
    let recipients = match db.all_user_ids_except(poster_id) {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Could not load recipients for new-post fan-out: {:#}", e);
            return;
        }
    };

    let poster_name = display_name_or(db, poster_id, "A user");
    let title = format!("New {item_type} Item: {item_name}");
    let body = format!("{poster_name} posted a new item!");

    let total = recipients.len();
    let mut delivered = 0usize;
    for user_id in recipients {
        if notify(db, user_id, &title, &body, NotificationKind::NewPost, Some(item_id)) {
            delivered += 1;
        }
    }
    info!("New-post fan-out for item {}: {}/{} notified", item_id, delivered, total);
}

/// Tell everyone who chatted about an item that the owner closed it out.
pub(crate) fn fan_out_claim(db: &Database, owner_id: i64, item_id: i64, item_name: &str) {
    let chatters = match db.get_chatter_ids(item_id, owner_id) {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Could not load chatters for claim fan-out: {:#}", e);
            return;
        }
    };

    let title = format!("Item Claimed: {item_name}");
    let body = "The item you were discussing has been marked as claimed/recovered by the owner.";

    let total = chatters.len();
    let mut delivered = 0usize;
    for user_id in chatters {
        if notify(db, user_id, &title, body, NotificationKind::Claim, Some(item_id)) {
            delivered += 1;
        }
    }
    info!("Claim fan-out for item {}: {}/{} notified", item_id, delivered, total);
}

fn display_name_or(db: &Database, user_id: i64, fallback: &str) -> String {
    match db.get_display_name(user_id) {
        Ok(Some(name)) => name,
        Ok(None) => fallback.to_string(),
        Err(e) => {
            warn!("Name lookup failed for user {}: {:#}", user_id, e);
            fallback.to_string()
        }
    }
}

// -- Handlers --

pub async fn get_unread_count(
    state: AppState,
    req: GetUnreadCountRequest,
) -> Result<Response, ApiError> {
    if req.user_id <= 0 {
        return Err(ApiError::validation("Missing user id."));
    }

    let db = state.clone();
    let user_id = req.user_id;
    let unread_count = tokio::task::spawn_blocking(move || db.db.unread_notification_count(user_id))
        .await
        .map_err(join_error)??;

    Ok(Json(Envelope::success(UnreadCountResponse { unread_count })).into_response())
}

pub async fn get_notifications(
    state: AppState,
    req: GetUserNotificationsRequest,
) -> Result<Response, ApiError> {
    if req.user_id <= 0 {
        return Err(ApiError::validation("Missing user id."));
    }

    let db = state.clone();
    let user_id = req.user_id;
    let rows = tokio::task::spawn_blocking(move || db.db.get_notifications(user_id, FEED_LIMIT))
        .await
        .map_err(join_error)??;

    let notifications: Vec<NotificationView> = rows.into_iter().map(notification_view).collect();
    Ok(Json(Envelope::success(NotificationListResponse { notifications })).into_response())
}

pub async fn mark_read(
    state: AppState,
    req: MarkNotificationsReadRequest,
) -> Result<Response, ApiError> {
    if req.user_id <= 0 {
        return Err(ApiError::validation("Missing user id."));
    }

    let db = state.clone();
    let user_id = req.user_id;
    let marked = tokio::task::spawn_blocking(move || db.db.mark_notifications_read(user_id))
        .await
        .map_err(join_error)??;
    debug!("Marked {} notifications read for user {}", marked, user_id);

    Ok(Json(Envelope::with_message("All notifications marked as read.", Ack {})).into_response())
}

pub async fn mark_viewed(
    state: AppState,
    req: MarkNotificationsViewedRequest,
) -> Result<Response, ApiError> {
    if req.user_id <= 0 {
        return Err(ApiError::validation("Missing user id."));
    }

    let db = state.clone();
    let user_id = req.user_id;
    tokio::task::spawn_blocking(move || db.db.touch_notifications_check(user_id))
        .await
        .map_err(join_error)??;

    Ok(Json(Envelope::with_message("Notifications check recorded.", Ack {})).into_response())
}

fn notification_view(row: NotificationRow) -> NotificationView {
    let kind = NotificationKind::parse(&row.kind).unwrap_or_else(|| {
        warn!("Corrupt notification kind '{}' on notification {}", row.kind, row.notification_id);
        NotificationKind::Message
    });
    let created_at = parse_db_timestamp(&row.created_at);
    NotificationView {
        notification_id: row.notification_id,
        title: row.title,
        body: row.body,
        kind,
        item_id: row.item_id,
        item_name: row.item_name,
        created_at,
        is_read: row.is_read,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn fan_out_falls_back_to_a_neutral_poster_name() {
        let db = test_db();
        let ana = db.create_user("Ana", "ana@example.com", "argon2-hash").unwrap();
        let ben = db.create_user("Ben", "ben@example.com", "argon2-hash").unwrap();

        // Poster account unresolvable mid-flight; recipients still hear
        // about the listing under a neutral name
        fan_out_new_post(&db, 999, 1, ItemType::Lost, "Black Wallet");

        for user_id in [ana, ben] {
            let feed = db.get_notifications(user_id, 50).unwrap();
            assert_eq!(feed.len(), 1);
            assert_eq!(feed[0].title, "New Lost Item: Black Wallet");
            assert_eq!(feed[0].body, "A user posted a new item!");
            assert_eq!(feed[0].kind, "new_post");
        }
    }

    #[test]
    fn message_notification_survives_missing_item_and_sender() {
        let db = test_db();
        let ana = db.create_user("Ana", "ana@example.com", "argon2-hash").unwrap();

        notify_new_message(&db, 42, 999, ana, "Is this yours?");

        let feed = db.get_notifications(ana, 50).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].title, "New Message about: Item ID 42");
        assert_eq!(feed[0].body, "A user: Is this yours?");
        assert_eq!(feed[0].kind, "message");
    }
}
