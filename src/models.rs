// Data structures shared by the query engine, the upstream client and the routes.
// Upstream payloads are loosely typed, so most fields are parsed leniently.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// A single vehicle listing as returned by the marketplace API
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    #[serde(rename = "_id", alias = "id", deserialize_with = "de::id")]
    pub id: String,
    #[serde(default, deserialize_with = "de::nullable_string")]
    pub brand: String,
    #[serde(default, alias = "modelName", deserialize_with = "de::nullable_string")]
    pub model: String,
    // None when the upstream value is missing or not a non-negative integer
    #[serde(default, deserialize_with = "de::lenient_price")]
    pub price: Option<u64>,
    #[serde(default, deserialize_with = "de::nullable_string")]
    pub description: String,
    #[serde(default)]
    pub fuel_type: Option<String>,
    #[serde(default)]
    pub transmission: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub range: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "de::nullable_string")]
    pub vehicle_type: String,
    #[serde(default, deserialize_with = "de::image_urls")]
    pub images: Vec<String>,
    // Kept raw; see `created_at()` for the parsed value
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub dealer_name: Option<String>,
    #[serde(default)]
    pub dealer_email: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub dealer_phone: Option<String>,
}

impl VehicleRecord {
    /// Creation timestamp, if present and parseable.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

/// Parses the timestamp formats the marketplace emits: RFC 3339, a naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as UTC) or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// Wishlist entries carry either the populated vehicle or just its id
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum WishlistVehicle {
    Listing(Box<VehicleRecord>),
    Id(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WishlistEntry {
    #[serde(rename = "_id", alias = "id", deserialize_with = "de::id")]
    pub id: String,
    // null once the listing has been deleted upstream
    #[serde(rename = "vehicleId", default)]
    pub vehicle: Option<WishlistVehicle>,
}

impl WishlistEntry {
    pub fn vehicle_id(&self) -> Option<&str> {
        match self.vehicle.as_ref()? {
            WishlistVehicle::Listing(record) => Some(&record.id),
            WishlistVehicle::Id(id) => Some(id),
        }
    }

    pub fn listing(&self) -> Option<&VehicleRecord> {
        match self.vehicle.as_ref()? {
            WishlistVehicle::Listing(record) => Some(record),
            WishlistVehicle::Id(_) => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Dealer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Dealer => "dealer",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" => Ok(Role::Buyer),
            "dealer" => Ok(Role::Dealer),
            other => Err(ApiError::Validation(format!("unknown role '{}'", other))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct UserProfile {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    // Roles this gateway doesn't know are read as None
    #[serde(default, deserialize_with = "de::lenient_role")]
    pub role: Option<Role>,
    #[serde(rename = "profilepic", default)]
    pub profile_pic: Option<String>,
}

// --- Requests sent upstream ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("email", &self.email)?;
        require("password", &self.password)?;
        if self.role.is_none() {
            return Err(ApiError::Validation("role is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SignupRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Buyer
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("name", &self.name)?;
        require("username", &self.username)?;
        require("email", &self.email)?;
        require("password", &self.password)
    }
}

// Fields a dealer supplies when creating or editing a listing
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDraft {
    pub brand: String,
    pub model: String,
    pub price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transmission: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl VehicleDraft {
    pub fn validate(&self) -> Result<(), ApiError> {
        require("brand", &self.brand)?;
        require("model", &self.model)?;
        require("description", &self.description)
    }

    // Text fields as sent in a multipart form, in upstream key order
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("brand", self.brand.clone()),
            ("model", self.model.clone()),
            ("price", self.price.to_string()),
        ];
        if let Some(fuel_type) = &self.fuel_type {
            fields.push(("fuelType", fuel_type.clone()));
        }
        if let Some(transmission) = &self.transmission {
            fields.push(("transmission", transmission.clone()));
        }
        fields.push(("description", self.description.clone()));
        fields
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(skip)]
    pub image: Option<ImageUpload>,
}

impl ProfileUpdate {
    // Only non-empty fields are forwarded
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        [
            ("name", &self.name),
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| (key, v.to_string()))
        })
        .collect()
    }
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::Validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

// --- Response envelopes, one per upstream endpoint shape ---

#[derive(Debug, Deserialize)]
pub struct ListEnvelope {
    #[serde(default)]
    pub data: Vec<VehicleRecord>,
}

#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEnvelope {
    #[serde(default)]
    pub wishlist_items: Vec<WishlistEntry>,
}

#[derive(Debug, Deserialize)]
pub struct LoginEnvelope {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileEnvelope {
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct CreatedEnvelope {
    #[serde(default)]
    pub data: Option<VehicleRecord>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MessageEnvelope {
    pub message: Option<String>,
}

// Lenient field deserializers for upstream JSON
mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "expected string or number id, got {}",
                other
            ))),
        }
    }

    pub fn nullable_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub fn lenient_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn lenient_price<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        })
    }

    pub fn lenient_role<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<super::Role>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(role) => role.parse().ok(),
            _ => None,
        })
    }

    // Accepts ["url", ...] or [{"url": "..."}, ...]; anything else is skipped
    pub fn image_urls<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<String>, D::Error> {
        let value = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
        Ok(value
            .into_iter()
            .filter_map(|item| match item {
                Value::String(url) => Some(url),
                Value::Object(mut map) => match map.remove("url") {
                    Some(Value::String(url)) => Some(url),
                    _ => None,
                },
                _ => None,
            })
            .collect())
    }
}
