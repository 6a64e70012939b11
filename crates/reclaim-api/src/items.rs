use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

use reclaim_db::models::{ItemFilter, ItemRow, ItemUpdate, NewItem};
use reclaim_types::api::{
    Ack, ClaimItemRequest, DeleteItemRequest, Envelope, FetchItemsRequest, GetItemDetailsRequest,
    ItemDetails, ItemDetailsResponse, ItemListResponse, ItemSummary, PostItemRequest,
    PostItemResponse, UpdateItemRequest,
};
use reclaim_types::models::{ItemType, parse_db_timestamp};

use crate::error::{ApiError, join_error};
use crate::notifications;
use crate::state::AppState;

pub async fn post_item(state: AppState, req: PostItemRequest) -> Result<Response, ApiError> {
    if req.user_id <= 0 {
        return Err(ApiError::validation("Missing user id."));
    }
    let item_name = req.item_name.trim().to_string();
    let description = req.description.trim().to_string();
    let location = req.location.trim().to_string();
    let event_date = req.event_date.trim().to_string();
    let category = req.category.trim().to_string();
    if item_name.is_empty()
        || description.is_empty()
        || location.is_empty()
        || event_date.is_empty()
        || category.is_empty()
    {
        return Err(ApiError::validation("All item fields are required."));
    }
    let image_url = req
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(String::from);

    let db = state.clone();
    let poster_id = req.user_id;
    let item_type = req.item_type;
    let item_id = tokio::task::spawn_blocking(move || -> Result<i64, ApiError> {
        if db.db.get_user_by_id(poster_id)?.is_none() {
            return Err(ApiError::not_found("Account not found."));
        }

        let item_id = db.db.insert_item(&NewItem {
            user_id: poster_id,
            item_type,
            item_name: &item_name,
            description: &description,
            location: &location,
            event_date: &event_date,
            category: &category,
            image_url: image_url.as_deref(),
        })?;

        // Best effort: a failed notification never takes the post with it
        notifications::fan_out_new_post(&db.db, poster_id, item_id, item_type, &item_name);

        Ok(item_id)
    })
    .await
    .map_err(join_error)??;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::with_message(
            "Item posted successfully.",
            PostItemResponse { item_id },
        )),
    )
        .into_response())
}

pub async fn fetch_items(state: AppState, req: FetchItemsRequest) -> Result<Response, ApiError> {
    let owner_id = if req.my_posts_only {
        match req.user_id {
            Some(id) if id > 0 => Some(id),
            _ => return Err(ApiError::validation("Missing user id for the my-posts filter.")),
        }
    } else {
        None
    };

    let filter = ItemFilter {
        item_type: req.item_type,
        search: req
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(String::from),
        owner_id,
    };

    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_items(&filter))
        .await
        .map_err(join_error)??;

    let items: Vec<ItemSummary> = rows.into_iter().map(item_summary).collect();
    Ok(Json(Envelope::success(ItemListResponse { items })).into_response())
}

pub async fn get_item_details(
    state: AppState,
    req: GetItemDetailsRequest,
) -> Result<Response, ApiError> {
    if req.item_id <= 0 {
        return Err(ApiError::validation("Missing item id."));
    }

    let db = state.clone();
    let item_id = req.item_id;
    let row = tokio::task::spawn_blocking(move || db.db.get_item(item_id))
        .await
        .map_err(join_error)??
        .ok_or_else(|| ApiError::not_found("Item not found."))?;

    let item_type = parse_item_type(&row.item_type, row.item_id);
    let item = ItemDetails {
        item_id: row.item_id,
        user_id: row.user_id,
        full_name: row.poster_name,
        phone_number: row.poster_phone,
        item_type,
        item_name: row.item_name,
        description: row.description,
        location: row.location,
        event_date: row.event_date,
        category: row.category,
        image_url: row.image_url,
        posted_at: parse_db_timestamp(&row.posted_at),
        is_claimed: row.is_claimed,
        status: row.status,
        claimed_at: row.claimed_at.as_deref().map(parse_db_timestamp),
    };

    Ok(Json(Envelope::success(ItemDetailsResponse { item })).into_response())
}

pub async fn update_item(state: AppState, req: UpdateItemRequest) -> Result<Response, ApiError> {
    if req.user_id <= 0 || req.item_id <= 0 {
        return Err(ApiError::validation("Missing item or user id."));
    }
    let item_name = req.item_name.trim().to_string();
    let description = req.description.trim().to_string();
    if item_name.is_empty() || description.is_empty() {
        return Err(ApiError::validation("Item name and description are required."));
    }

    let db = state.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        let brief = db
            .db
            .get_item_brief(req.item_id)?
            .ok_or_else(|| ApiError::not_found("Item not found."))?;
        if brief.user_id != req.user_id {
            return Err(ApiError::forbidden("Only the owner can edit this item."));
        }

        let changed = db.db.update_item(&ItemUpdate {
            item_id: req.item_id,
            user_id: req.user_id,
            item_type: req.item_type,
            item_name: &item_name,
            description: &description,
            location: req.location.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            event_date: req.event_date.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            category: req.category.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        })?;
        if !changed {
            return Err(ApiError::not_found("Item not found."));
        }
        Ok(())
    })
    .await
    .map_err(join_error)??;

    Ok(Json(Envelope::with_message("Item updated successfully.", Ack {})).into_response())
}

pub async fn delete_item(state: AppState, req: DeleteItemRequest) -> Result<Response, ApiError> {
    if req.user_id <= 0 || req.item_id <= 0 {
        return Err(ApiError::validation("Missing item or user id."));
    }

    let db = state.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        let brief = db
            .db
            .get_item_brief(req.item_id)?
            .ok_or_else(|| ApiError::not_found("Item not found."))?;
        if brief.user_id != req.user_id {
            return Err(ApiError::forbidden("Only the owner can delete this item."));
        }

        db.db.delete_item(req.item_id, req.user_id)?;
        Ok(())
    })
    .await
    .map_err(join_error)??;

    Ok(Json(Envelope::with_message("Item deleted.", Ack {})).into_response())
}

pub async fn claim_item(state: AppState, req: ClaimItemRequest) -> Result<Response, ApiError> {
    if req.user_id <= 0 || req.item_id <= 0 {
        return Err(ApiError::validation("Missing item or user id."));
    }

    let db = state.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        let brief = db
            .db
            .get_item_brief(req.item_id)?
            .ok_or_else(|| ApiError::not_found("Item not found."))?;
        if brief.user_id != req.user_id {
            return Err(ApiError::forbidden("Only the owner can mark this item as claimed."));
        }

        // The guarded UPDATE arbitrates concurrent claims: only one caller
        // ever sees a changed row.
        if !db.db.claim_item(req.item_id, req.user_id)? {
            return Err(ApiError::conflict("This item has already been claimed."));
        }

        notifications::fan_out_claim(&db.db, req.user_id, req.item_id, &brief.item_name);
        Ok(())
    })
    .await
    .map_err(join_error)??;

    Ok(Json(Envelope::with_message("Item marked as claimed.", Ack {})).into_response())
}

fn item_summary(row: ItemRow) -> ItemSummary {
    let item_type = parse_item_type(&row.item_type, row.item_id);
    ItemSummary {
        item_id: row.item_id,
        user_id: row.user_id,
        full_name: row.poster_name,
        item_type,
        item_name: row.item_name,
        description: row.description,
        location: row.location,
        event_date: row.event_date,
        category: row.category,
        image_url: row.image_url,
        posted_at: parse_db_timestamp(&row.posted_at),
        is_claimed: row.is_claimed,
        status: row.status,
    }
}

pub(crate) fn parse_item_type(raw: &str, item_id: i64) -> ItemType {
    ItemType::parse(raw).unwrap_or_else(|| {
        warn!("Corrupt item_type '{}' on item {}", raw, item_id);
        ItemType::Lost
    })
}
