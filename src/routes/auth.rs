use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use crate::{
    AppState,
    auth_middleware::AuthenticatedUser,
    error::AppError,
    events::{EventBus, MarketEvent},
    models::{LoginRequest, SignupRequest, UserProfile},
};

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    user: UserProfile,
}

// Handler for POST /api/login
pub async fn handle_login(
    State(app_state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("Login attempt for {}", request.email);

    let session = app_state.api.login(&request).await.map_err(|e| {
        tracing::warn!("Login failed for {}: {}", request.email, e);
        e
    })?;

    let user = session.profile().cloned().unwrap_or_default();
    app_state.events.publish(MarketEvent::LoginChanged {
        role: session.role(),
        name: Some(user.name.clone()).filter(|n| !n.is_empty()),
    });

    Ok(Json(LoginResponse {
        token: session.token().to_string(),
        user,
    }))
}

// Handler for POST /api/signup
pub async fn handle_signup(
    State(app_state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("Signup for {} as {}", request.email, request.role.as_str());
    app_state.api.signup(&request).await?;
    Ok(StatusCode::CREATED)
}

// Handler for POST /api/logout. Tokens are held by the client, so logging
// out only notifies subscribers.
pub async fn handle_logout(
    State(events): State<EventBus>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    events.publish(MarketEvent::LoggedOut);
    StatusCode::NO_CONTENT
}
