use axum::{
    RequestPartsExt, async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use tracing::warn;

use crate::{error::AppError, models::Role, session::Session};

// Extracted in handlers that need a signed-in user. The token itself is
// validated by the marketplace API; here we only reject what is obviously
// unusable (missing header, empty or expired token).
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub session: Session,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|e| {
                warn!("Failed to extract Authorization header: {}", e);
                AppError::Unauthorized("Missing or invalid Authorization header".into())
            })?;

        let session = Session::from_token(bearer.token());
        session.ensure_active()?;

        Ok(AuthenticatedUser { session })
    }
}

// Dealer dashboard routes. A token whose role claim is anything but
// `dealer` is turned away here; tokens without a role claim are left to the
// upstream check.
#[derive(Debug, Clone)]
pub struct DealerUser {
    pub session: Session,
}

#[async_trait]
impl<S> FromRequestParts<S> for DealerUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser { session } = AuthenticatedUser::from_request_parts(parts, state).await?;
        // Read the raw claim: an unrecognised role must not pass as "no role"
        let claimed = session.claims().and_then(|c| c.role.as_deref());
        match claimed {
            None => Ok(DealerUser { session }),
            Some(role) if role.trim().eq_ignore_ascii_case(Role::Dealer.as_str()) => {
                Ok(DealerUser { session })
            }
            Some(role) => {
                warn!("Rejected '{}' token on dealer route", role);
                Err(AppError::Unauthorized("Dealer account required".into()))
            }
        }
    }
}
