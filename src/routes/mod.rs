// Route definitions

use axum::{
    Json, Router,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::AppState;

mod auth;
mod dealer;
mod listings;
mod profile;
mod wishlist;

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(health))
        // Buyer views
        .route("/vehicles", get(listings::browse_vehicles))
        .route("/vehicles/:id", get(listings::vehicle_details))
        .route("/wishlist", get(wishlist::get_wishlist))
        // POST takes a vehicle id; DELETE takes an entry id, or a vehicle id with `?by=vehicle`
        .route("/wishlist/:id", post(wishlist::add_to_wishlist).delete(wishlist::remove_from_wishlist))
        // Accounts
        .route("/login", post(auth::handle_login))
        .route("/signup", post(auth::handle_signup))
        .route("/logout", post(auth::handle_logout))
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        // Dealer dashboard
        .route("/dealer/overview", get(dealer::overview))
        .route("/dealer/vehicles", get(dealer::list_inventory).post(dealer::create_vehicle))
        .route("/dealer/vehicles/:id", put(dealer::update_vehicle).delete(dealer::delete_vehicle));

    Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
