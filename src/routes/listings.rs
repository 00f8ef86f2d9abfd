// Buyer listing views: browse with search/filter/sort, and vehicle details

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use futures::future::join;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    auth_middleware::AuthenticatedUser,
    error::AppError,
    models::VehicleRecord,
    query::{self, QuerySpec, SortMode},
};

// Query string of GET /api/vehicles
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListingParams {
    q: Option<String>,
    // Comma-separated category tags
    types: Option<String>,
    price_min: Option<u64>,
    price_max: Option<u64>,
    sort: Option<String>,
}

impl ListingParams {
    fn into_spec(self, default_price_max: u64) -> QuerySpec {
        QuerySpec {
            term: self.q.unwrap_or_default(),
            categories: self
                .types
                .map(|t| t.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            price_min: self.price_min.unwrap_or(0),
            price_max: self.price_max.unwrap_or(default_price_max),
            sort: self.sort.as_deref().map(SortMode::parse).unwrap_or_default(),
        }
        .normalized()
    }
}

#[derive(Serialize)]
struct ListingPage<'a> {
    total: usize,
    count: usize,
    query: QuerySpec,
    vehicles: Vec<&'a VehicleRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VehicleDetails {
    #[serde(flatten)]
    vehicle: VehicleRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_wishlist: Option<bool>,
}

pub async fn browse_vehicles(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Query(params): Query<ListingParams>,
) -> Result<impl IntoResponse, AppError> {
    let spec = params.into_spec(app_state.settings.default_price_max);
    tracing::info!("[HANDLER] /api/vehicles - Request received with {:?}", spec);

    let session = user.as_ref().map(|u| &u.session);
    let records = app_state.api.list_vehicles(session).await.map_err(|e| {
        tracing::error!("[HANDLER] /api/vehicles - Error fetching vehicles: {}", e);
        e
    })?;

    let vehicles = query::apply(&records, &spec);
    tracing::info!(
        "[HANDLER] /api/vehicles - Showing {} of {} vehicles",
        vehicles.len(),
        records.len()
    );

    let page = ListingPage {
        total: records.len(),
        count: vehicles.len(),
        query: spec,
        vehicles,
    };
    // Serialize while `records` is still borrowed
    Ok(Json(serde_json::to_value(&page).map_err(anyhow::Error::from)?))
}

pub async fn vehicle_details(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] /api/vehicles/:id - Request received for vehicle: {}", id);

    let Some(user) = user else {
        let vehicle = app_state.api.get_vehicle(None, &id).await?;
        return Ok(Json(VehicleDetails {
            vehicle,
            in_wishlist: None,
        }));
    };

    // Fetch the listing and the buyer's wishlist side by side
    let (vehicle, wishlist) = join(
        app_state.api.get_vehicle(Some(&user.session), &id),
        app_state.api.list_wishlist(&user.session),
    )
    .await;
    let vehicle = vehicle?;

    // A wishlist failure shouldn't hide the listing itself
    let in_wishlist = match wishlist {
        Ok(entries) => Some(
            entries
                .iter()
                .any(|e| e.vehicle_id() == Some(vehicle.id.as_str())),
        ),
        Err(e) => {
            tracing::warn!("[HANDLER] /api/vehicles/:id - Could not load wishlist: {}", e);
            None
        }
    };

    Ok(Json(VehicleDetails { vehicle, in_wishlist }))
}
