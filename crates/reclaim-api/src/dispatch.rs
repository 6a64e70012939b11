use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
    response::Response,
    routing::post,
};
use serde_json::Value;

use reclaim_types::api::ApiRequest;

use crate::auth::{self, require_actor};
use crate::chat;
use crate::error::ApiError;
use crate::items;
use crate::notifications;
use crate::state::AppState;

/// The whole API is one POST endpoint; the `action` field of the JSON
/// body selects the operation.
pub fn router(state: AppState) -> Router {
    Router::new().route("/api", post(handle)).with_state(state)
}

pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(raw) =
        payload.map_err(|e| ApiError::validation(format!("Invalid request body: {e}")))?;

    let request: ApiRequest = serde_json::from_value(raw)
        .map_err(|e| ApiError::validation(format!("Invalid request: {e}")))?;

    // Public actions skip the token check; everything else must prove it
    // acts as the user named in the body.
    if let Some(actor_id) = request.actor_id() {
        require_actor(&headers, &state.jwt_secret, actor_id)?;
    }

    match request {
        ApiRequest::Signup(req) => auth::signup(state, req).await,
        ApiRequest::Signin(req) => auth::signin(state, req).await,
        ApiRequest::UpdateProfile(req) => auth::update_profile(state, req).await,
        ApiRequest::PostItem(req) => items::post_item(state, req).await,
        ApiRequest::FetchItems(req) => items::fetch_items(state, req).await,
        ApiRequest::GetItemDetails(req) => items::get_item_details(state, req).await,
        ApiRequest::UpdateItem(req) => items::update_item(state, req).await,
        ApiRequest::DeleteItem(req) => items::delete_item(state, req).await,
        ApiRequest::ClaimItem(req) => items::claim_item(state, req).await,
        ApiRequest::SendMessage(req) => chat::send_message(state, req).await,
        ApiRequest::FetchMessages(req) => chat::fetch_messages(state, req).await,
        ApiRequest::GetUserConversations(req) => chat::get_conversations(state, req).await,
        ApiRequest::GetUnreadCount(req) => notifications::get_unread_count(state, req).await,
        ApiRequest::GetUserNotifications(req) => notifications::get_notifications(state, req).await,
        ApiRequest::MarkNotificationsRead(req) => notifications::mark_read(state, req).await,
        ApiRequest::MarkNotificationsViewed(req) => notifications::mark_viewed(state, req).await,
    }
}
