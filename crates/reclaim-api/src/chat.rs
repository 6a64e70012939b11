use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use reclaim_db::models::{ConversationRow, MessageRow};
use reclaim_types::api::{
    ConversationListResponse, ConversationView, Envelope, FetchMessagesRequest,
    GetUserConversationsRequest, MessageListResponse, MessageView, SendMessageRequest,
    SendMessageResponse,
};
use reclaim_types::models::{ConversationKey, parse_db_timestamp};

use crate::error::{ApiError, join_error};
use crate::items::parse_item_type;
use crate::notifications;
use crate::state::AppState;

pub async fn send_message(state: AppState, req: SendMessageRequest) -> Result<Response, ApiError> {
    if req.sender_id <= 0 || req.receiver_id <= 0 || req.item_id <= 0 {
        return Err(ApiError::validation("Missing chat participants or item."));
    }
    if req.sender_id == req.receiver_id {
        return Err(ApiError::validation("You cannot message yourself."));
    }
    let message_text = req.message_text.trim().to_string();
    if message_text.is_empty() {
        return Err(ApiError::validation("Message text cannot be empty."));
    }

    let db = state.clone();
    let message_id = tokio::task::spawn_blocking(move || -> Result<i64, ApiError> {
        if db.db.get_user_by_id(req.receiver_id)?.is_none() {
            return Err(ApiError::not_found("Recipient not found."));
        }

        let message_id =
            db.db
                .insert_message(req.item_id, req.sender_id, req.receiver_id, &message_text)?;

        // Best effort: the message is already stored at this point
        notifications::notify_new_message(
            &db.db,
            req.item_id,
            req.sender_id,
            req.receiver_id,
            &message_text,
        );

        Ok(message_id)
    })
    .await
    .map_err(join_error)??;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(
            "Message sent.",
            SendMessageResponse { message_id },
        )),
    )
        .into_response())
}

pub async fn fetch_messages(
    state: AppState,
    req: FetchMessagesRequest,
) -> Result<Response, ApiError> {
    if req.user_id <= 0 || req.receiver_id <= 0 || req.item_id <= 0 {
        return Err(ApiError::validation("Missing chat session details."));
    }
    if req.user_id == req.receiver_id {
        return Err(ApiError::validation("A conversation needs two different users."));
    }

    let key = ConversationKey::new(req.item_id, req.user_id, req.receiver_id);
    let viewer_id = req.user_id;
    let other_id = req.receiver_id;

    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || -> Result<Vec<MessageRow>, ApiError> {
        // Mark the incoming side read before selecting, so the returned
        // rows already carry the updated flags
        let marked = db.db.mark_conversation_read(key.item_id, viewer_id, other_id)?;
        if marked > 0 {
            debug!("Marked {} messages read in item {} for user {}", marked, key.item_id, viewer_id);
        }

        Ok(db.db.get_conversation_messages(&key)?)
    })
    .await
    .map_err(join_error)??;

    let messages: Vec<MessageView> = rows.into_iter().map(message_view).collect();
    Ok(Json(Envelope::success(MessageListResponse { messages })).into_response())
}

pub async fn get_conversations(
    state: AppState,
    req: GetUserConversationsRequest,
) -> Result<Response, ApiError> {
    if req.user_id <= 0 {
        return Err(ApiError::validation("Missing user id."));
    }

    let db = state.clone();
    let user_id = req.user_id;
    let rows = tokio::task::spawn_blocking(move || db.db.get_conversations(user_id))
        .await
        .map_err(join_error)??;

    let conversations: Vec<ConversationView> = rows.into_iter().map(conversation_view).collect();
    Ok(Json(Envelope::success(ConversationListResponse { conversations })).into_response())
}

fn message_view(row: MessageRow) -> MessageView {
    let sent_at = parse_db_timestamp(&row.sent_at);
    MessageView {
        message_id: row.message_id,
        item_id: row.item_id,
        sender_id: row.sender_id,
        receiver_id: row.receiver_id,
        sender_name: row.sender_name,
        message_text: row.message_text,
        sent_at,
        is_read: row.is_read,
    }
}

fn conversation_view(row: ConversationRow) -> ConversationView {
    let item_type = parse_item_type(&row.item_type, row.item_id);
    let last_message_at = parse_db_timestamp(&row.last_message_at);
    ConversationView {
        item_id: row.item_id,
        item_name: row.item_name,
        item_type,
        image_url: row.image_url,
        other_user_id: row.other_user_id,
        other_user_name: row.other_user_name,
        last_message_text: row.last_message_text,
        last_message_at,
        unread_count: row.unread_count,
    }
}
