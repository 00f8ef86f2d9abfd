use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    auth_middleware::AuthenticatedUser,
    error::AppError,
    events::MarketEvent,
    models::WishlistEntry,
};

#[derive(Serialize)]
struct WishlistResponse {
    count: usize,
    items: Vec<WishlistEntry>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RemoveParams {
    // `vehicle` when the path id is a vehicle id rather than an entry id
    by: Option<String>,
}

pub async fn get_wishlist(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let items = app_state.api.list_wishlist(&user.session).await?;
    tracing::info!("[HANDLER] /api/wishlist - {} item(s)", items.len());
    Ok(Json(WishlistResponse {
        count: items.len(),
        items,
    }))
}

pub async fn add_to_wishlist(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(vehicle_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] POST /api/wishlist/:id - Adding vehicle {}", vehicle_id);
    app_state.api.add_to_wishlist(&user.session, &vehicle_id).await?;
    app_state.events.publish(MarketEvent::WishlistUpdated {
        vehicle_id: Some(vehicle_id),
    });
    Ok(StatusCode::CREATED)
}

pub async fn remove_from_wishlist(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Query(params): Query<RemoveParams>,
) -> Result<impl IntoResponse, AppError> {
    let vehicle_id = match params.by.as_deref() {
        Some("vehicle") => {
            tracing::info!("[HANDLER] DELETE /api/wishlist/:id - Removing vehicle {}", id);
            app_state
                .api
                .remove_vehicle_from_wishlist(&user.session, &id)
                .await?;
            Some(id)
        }
        None | Some("entry") => {
            tracing::info!("[HANDLER] DELETE /api/wishlist/:id - Removing entry {}", id);
            app_state.api.remove_from_wishlist(&user.session, &id).await?;
            None
        }
        Some(other) => {
            return Err(AppError::BadRequest(format!("unknown wishlist key '{}'", other)));
        }
    };
    app_state.events.publish(MarketEvent::WishlistUpdated { vehicle_id });
    Ok(StatusCode::NO_CONTENT)
}
