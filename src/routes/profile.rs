use axum::{
    Json,
    extract::{Multipart, State},
    response::IntoResponse,
};

use crate::{
    AppState,
    auth_middleware::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{ImageUpload, ProfileUpdate},
};

pub async fn get_profile(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    let profile = app_state.api.get_profile(&user.session).await?;
    Ok(Json(profile))
}

// Multipart form: any of name/username/email/password plus an optional `profileimage` file
pub async fn update_profile(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let update = read_profile_form(multipart).await?;
    if update.form_fields().is_empty() && update.image.is_none() {
        return Err(AppError::BadRequest("nothing to update".into()));
    }
    let profile = app_state.api.update_profile(&user.session, update).await?;
    tracing::info!("Profile updated for {}", profile.email);
    Ok(Json(profile))
}

async fn read_profile_form(mut multipart: Multipart) -> AppResult<ProfileUpdate> {
    let mut update = ProfileUpdate::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed form: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "profileimage" {
            let file_name = field.file_name().unwrap_or("profile").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("unreadable image: {}", e)))?;
            // Browsers send an empty part when no file was chosen
            if !bytes.is_empty() {
                update.image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("unreadable field {}: {}", name, e)))?;
        match name.as_str() {
            "name" => update.name = Some(value),
            "username" => update.username = Some(value),
            "email" => update.email = Some(value),
            "password" => update.password = Some(value),
            other => tracing::debug!("Ignoring unknown profile field {}", other),
        }
    }

    Ok(update)
}
