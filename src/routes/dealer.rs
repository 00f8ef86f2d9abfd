// Dealer dashboard: inventory listing, overview and CRUD

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use crate::{
    AppState,
    auth_middleware::DealerUser,
    error::AppError,
    events::MarketEvent,
    models::{ImageUpload, VehicleDraft, VehicleRecord},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InventoryOverview {
    total_vehicles: usize,
    // Sum of listed prices; records without a usable price are skipped
    listed_value: u64,
    unpriced_vehicles: usize,
}

impl InventoryOverview {
    fn from_records(records: &[VehicleRecord]) -> Self {
        let priced: Vec<u64> = records.iter().filter_map(|r| r.price).collect();
        Self {
            total_vehicles: records.len(),
            listed_value: priced.iter().fold(0u64, |acc, p| acc.saturating_add(*p)),
            unpriced_vehicles: records.len() - priced.len(),
        }
    }
}

pub async fn list_inventory(
    State(app_state): State<AppState>,
    dealer: DealerUser,
) -> Result<impl IntoResponse, AppError> {
    let vehicles = app_state.api.dealer_vehicles(&dealer.session).await?;
    tracing::info!("[HANDLER] /api/dealer/vehicles - {} vehicle(s)", vehicles.len());
    Ok(Json(vehicles))
}

pub async fn overview(
    State(app_state): State<AppState>,
    dealer: DealerUser,
) -> Result<impl IntoResponse, AppError> {
    let vehicles = app_state.api.dealer_vehicles(&dealer.session).await?;
    Ok(Json(InventoryOverview::from_records(&vehicles)))
}

// Accepts the dashboard's multipart form: text fields plus any number of `images` files
pub async fn create_vehicle(
    State(app_state): State<AppState>,
    dealer: DealerUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (draft, images) = read_vehicle_form(multipart).await?;
    tracing::info!(
        "[HANDLER] POST /api/dealer/vehicles - {} {} with {} image(s)",
        draft.brand,
        draft.model,
        images.len()
    );

    let created = app_state
        .api
        .create_vehicle(&dealer.session, &draft, images)
        .await?;
    if let Some(record) = &created {
        app_state.events.publish(MarketEvent::InventoryChanged {
            vehicle_id: record.id.clone(),
        });
    }
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_vehicle(
    State(app_state): State<AppState>,
    dealer: DealerUser,
    Path(id): Path<String>,
    Json(draft): Json<VehicleDraft>,
) -> Result<impl IntoResponse, AppError> {
    app_state.api.update_vehicle(&dealer.session, &id, &draft).await?;
    app_state.events.publish(MarketEvent::InventoryChanged { vehicle_id: id });
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_vehicle(
    State(app_state): State<AppState>,
    dealer: DealerUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    app_state.api.delete_vehicle(&dealer.session, &id).await?;
    app_state.events.publish(MarketEvent::InventoryChanged { vehicle_id: id });
    Ok(StatusCode::NO_CONTENT)
}

async fn read_vehicle_form(mut multipart: Multipart) -> Result<(VehicleDraft, Vec<ImageUpload>), AppError> {
    let mut draft = VehicleDraft::default();
    let mut price: Option<String> = None;
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed form: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "images" {
            let file_name = field.file_name().unwrap_or("image").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("unreadable image: {}", e)))?;
            if !bytes.is_empty() {
                images.push(ImageUpload {
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
            "brand" => draft.brand = value,
            "model" => draft.model = value,
            "price" => price = Some(value),
            "fuelType" => draft.fuel_type = Some(value).filter(|v| !v.is_empty()),
            "transmission" => draft.transmission = Some(value).filter(|v| !v.is_empty()),
            "description" => draft.description = value,
            other => tracing::debug!("Ignoring unknown form field {}", other),
        }
    }

    draft.price = parse_price(price.as_deref())?;
    Ok((draft, images))
}

fn parse_price(raw: Option<&str>) -> Result<u64, AppError> {
    let raw = raw.map(str::trim).filter(|p| !p.is_empty());
    match raw {
        Some(p) => p
            .parse::<u64>()
            .map_err(|_| AppError::BadRequest(format!("price must be a non-negative integer, got '{}'", p))),
        None => Err(AppError::BadRequest("price is required".into())),
    }
}
