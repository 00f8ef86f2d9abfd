// Client for the external marketplace API (listings, wishlist, accounts, dealer inventory)

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, multipart};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::ApiError;
use crate::models::{
    CreatedEnvelope, DataEnvelope, ImageUpload, ListEnvelope, LoginEnvelope, LoginRequest,
    MessageEnvelope, ProfileEnvelope, ProfileUpdate, SignupRequest, UserProfile, VehicleDraft,
    VehicleRecord, WishlistEntry, WishlistEnvelope,
};
use crate::session::Session;

const ALL_VEHICLES_PATH: &str = "/buyer/viewAllVehicles";
const VEHICLE_PATH: &str = "/buyer/viewVehicles";
const WISHLIST_PATH: &str = "/buyer/viewAllWishlist";
const ADD_WISHLIST_PATH: &str = "/buyer/addWishlist";
const DELETE_WISHLIST_PATH: &str = "/buyer/deleteWishlist";
const LOGIN_PATH: &str = "/auth/login";
const SIGNUP_PATH: &str = "/auth/signup";
const DEALER_VEHICLES_PATH: &str = "/dealers/getAllVehicles";
const CREATE_VEHICLE_PATH: &str = "/dealers/vehicles";
const UPDATE_VEHICLE_PATH: &str = "/dealers/updateVehicle";
const DELETE_VEHICLE_PATH: &str = "/dealers/deleteVehicle";
const PROFILE_PATH: &str = "/user/profile";
const EDIT_PROFILE_PATH: &str = "/user/editProfile";

/// Operations the marketplace API offers. Every call is a single attempt.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    async fn list_vehicles(&self, session: Option<&Session>) -> Result<Vec<VehicleRecord>, ApiError>;

    async fn get_vehicle(&self, session: Option<&Session>, id: &str) -> Result<VehicleRecord, ApiError>;

    async fn list_wishlist(&self, session: &Session) -> Result<Vec<WishlistEntry>, ApiError>;

    async fn add_to_wishlist(&self, session: &Session, vehicle_id: &str) -> Result<(), ApiError>;

    async fn remove_from_wishlist(&self, session: &Session, entry_id: &str) -> Result<(), ApiError>;

    /// Removes the wishlist entry that points at `vehicle_id`. Entries whose
    /// listing was deleted upstream are never matched.
    async fn remove_vehicle_from_wishlist(
        &self,
        session: &Session,
        vehicle_id: &str,
    ) -> Result<(), ApiError> {
        let entries = self.list_wishlist(session).await?;
        let entry = entries
            .iter()
            .find(|entry| entry.vehicle_id() == Some(vehicle_id))
            .ok_or_else(|| ApiError::NotFound(format!("vehicle {} is not in the wishlist", vehicle_id)))?;
        self.remove_from_wishlist(session, &entry.id).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<Session, ApiError>;

    async fn signup(&self, request: &SignupRequest) -> Result<(), ApiError>;

    async fn dealer_vehicles(&self, session: &Session) -> Result<Vec<VehicleRecord>, ApiError>;

    async fn create_vehicle(
        &self,
        session: &Session,
        draft: &VehicleDraft,
        images: Vec<ImageUpload>,
    ) -> Result<Option<VehicleRecord>, ApiError>;

    async fn update_vehicle(&self, session: &Session, id: &str, draft: &VehicleDraft) -> Result<(), ApiError>;

    async fn delete_vehicle(&self, session: &Session, id: &str) -> Result<(), ApiError>;

    async fn get_profile(&self, session: &Session) -> Result<UserProfile, ApiError>;

    async fn update_profile(&self, session: &Session, update: ProfileUpdate) -> Result<UserProfile, ApiError>;
}

/// [`MarketplaceApi`] over HTTP with a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpMarketplaceApi {
    client: Arc<Client>,
    base_url: String,
}

impl HttpMarketplaceApi {
    pub fn new(client: Arc<Client>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn url_with_id(&self, path: &str, id: &str) -> Result<String, ApiError> {
        if id.trim().is_empty() || id.contains('/') {
            return Err(ApiError::Validation(format!("invalid identifier '{}'", id)));
        }
        Ok(format!("{}{}/{}", self.base_url, path, id))
    }

    // Attaches the bearer token after checking the session is still usable
    fn authorized(&self, builder: RequestBuilder, session: &Session) -> Result<RequestBuilder, ApiError> {
        session.ensure_active()?;
        Ok(builder.bearer_auth(session.token()))
    }

    fn maybe_authorized(&self, builder: RequestBuilder, session: Option<&Session>) -> Result<RequestBuilder, ApiError> {
        match session {
            Some(session) => self.authorized(builder, session),
            None => Ok(builder),
        }
    }

    // Sends the request and returns the raw body of a successful response
    async fn send(&self, builder: RequestBuilder) -> Result<String, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<MessageEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.message);
            tracing::warn!("Marketplace API {} returned {}: {:?}", url, status, message);
            return Err(ApiError::from_status(status.as_u16(), message));
        }
        tracing::debug!("Marketplace API {} returned {} ({} bytes)", url, status, body.len());
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(builder).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

fn image_part(image: ImageUpload) -> Result<multipart::Part, ApiError> {
    multipart::Part::bytes(image.bytes)
        .file_name(image.file_name)
        .mime_str(&image.content_type)
        .map_err(|e| ApiError::Validation(format!("invalid image content type: {}", e)))
}

#[async_trait]
impl MarketplaceApi for HttpMarketplaceApi {
    async fn list_vehicles(&self, session: Option<&Session>) -> Result<Vec<VehicleRecord>, ApiError> {
        let request = self.maybe_authorized(self.client.get(self.url(ALL_VEHICLES_PATH)), session)?;
        let envelope: ListEnvelope = self.send_json(request).await?;
        tracing::info!("Fetched {} vehicles from marketplace", envelope.data.len());
        Ok(envelope.data)
    }

    async fn get_vehicle(&self, session: Option<&Session>, id: &str) -> Result<VehicleRecord, ApiError> {
        let request = self.maybe_authorized(self.client.get(self.url_with_id(VEHICLE_PATH, id)?), session)?;
        // The API answers unknown ids with `{"data": null}` as well as 404
        let envelope: DataEnvelope<Option<VehicleRecord>> = self.send_json(request).await?;
        envelope
            .data
            .ok_or_else(|| ApiError::NotFound(format!("vehicle {}", id)))
    }

    async fn list_wishlist(&self, session: &Session) -> Result<Vec<WishlistEntry>, ApiError> {
        let request = self.authorized(self.client.get(self.url(WISHLIST_PATH)), session)?;
        let envelope: WishlistEnvelope = self.send_json(request).await?;
        Ok(envelope.wishlist_items)
    }

    async fn add_to_wishlist(&self, session: &Session, vehicle_id: &str) -> Result<(), ApiError> {
        if vehicle_id.trim().is_empty() {
            return Err(ApiError::Validation("vehicleId is required".into()));
        }
        let request = self.authorized(
            self.client
                .post(self.url(ADD_WISHLIST_PATH))
                .json(&json!({ "vehicleId": vehicle_id })),
            session,
        )?;
        self.send(request).await?;
        tracing::info!("Added vehicle {} to wishlist", vehicle_id);
        Ok(())
    }

    async fn remove_from_wishlist(&self, session: &Session, entry_id: &str) -> Result<(), ApiError> {
        let request = self.authorized(
            self.client.delete(self.url_with_id(DELETE_WISHLIST_PATH, entry_id)?),
            session,
        )?;
        self.send(request).await?;
        tracing::info!("Removed wishlist entry {}", entry_id);
        Ok(())
    }

    async fn login(&self, request: &LoginRequest) -> Result<Session, ApiError> {
        request.validate()?;
        let envelope: LoginEnvelope = self
            .send_json(self.client.post(self.url(LOGIN_PATH)).json(request))
            .await?;

        match (envelope.token, envelope.user) {
            (Some(token), Some(user)) if !token.is_empty() => {
                tracing::info!("Login succeeded for {}", user.email);
                Ok(Session::new(token, user))
            }
            _ => Err(ApiError::Unauthorized(
                envelope.message.unwrap_or_else(|| "Login failed".to_string()),
            )),
        }
    }

    async fn signup(&self, request: &SignupRequest) -> Result<(), ApiError> {
        request.validate()?;
        self.send(self.client.post(self.url(SIGNUP_PATH)).json(request))
            .await?;
        tracing::info!("Signed up {} as {}", request.email, request.role.as_str());
        Ok(())
    }

    async fn dealer_vehicles(&self, session: &Session) -> Result<Vec<VehicleRecord>, ApiError> {
        let request = self.authorized(self.client.get(self.url(DEALER_VEHICLES_PATH)), session)?;
        let envelope: ListEnvelope = self.send_json(request).await?;
        Ok(envelope.data)
    }

    async fn create_vehicle(
        &self,
        session: &Session,
        draft: &VehicleDraft,
        images: Vec<ImageUpload>,
    ) -> Result<Option<VehicleRecord>, ApiError> {
        draft.validate()?;
        let image_count = images.len();
        let mut form = multipart::Form::new();
        for (key, value) in draft.form_fields() {
            form = form.text(key, value);
        }
        for image in images {
            form = form.part("images", image_part(image)?);
        }

        let request = self.authorized(
            self.client.post(self.url(CREATE_VEHICLE_PATH)).multipart(form),
            session,
        )?;
        let envelope: CreatedEnvelope = self.send_json(request).await?;
        tracing::info!(
            "Created vehicle {} {} with {} image(s)",
            draft.brand,
            draft.model,
            image_count
        );
        Ok(envelope.data)
    }

    async fn update_vehicle(&self, session: &Session, id: &str, draft: &VehicleDraft) -> Result<(), ApiError> {
        draft.validate()?;
        let request = self.authorized(
            self.client.put(self.url_with_id(UPDATE_VEHICLE_PATH, id)?).json(draft),
            session,
        )?;
        self.send(request).await?;
        tracing::info!("Updated vehicle {}", id);
        Ok(())
    }

    async fn delete_vehicle(&self, session: &Session, id: &str) -> Result<(), ApiError> {
        let request = self.authorized(
            self.client.delete(self.url_with_id(DELETE_VEHICLE_PATH, id)?),
            session,
        )?;
        self.send(request).await?;
        tracing::info!("Deleted vehicle {}", id);
        Ok(())
    }

    async fn get_profile(&self, session: &Session) -> Result<UserProfile, ApiError> {
        let request = self.authorized(self.client.get(self.url(PROFILE_PATH)), session)?;
        self.send_json(request).await
    }

    async fn update_profile(&self, session: &Session, update: ProfileUpdate) -> Result<UserProfile, ApiError> {
        let mut form = multipart::Form::new();
        for (key, value) in update.form_fields() {
            form = form.text(key, value);
        }
        if let Some(image) = update.image.filter(|image| !image.bytes.is_empty()) {
            form = form.part("profileimage", image_part(image)?);
        }

        let request = self.authorized(self.client.put(self.url(EDIT_PROFILE_PATH)).multipart(form), session)?;
        let envelope: ProfileEnvelope = self.send_json(request).await?;
        Ok(envelope.user)
    }
}
