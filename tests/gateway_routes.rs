// Exercises the gateway router over an in-memory marketplace

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use evmarket_rust::{
    AppState,
    config::Settings,
    error::ApiError,
    events::MarketEvent,
    marketplace_api::MarketplaceApi,
    models::{
        ImageUpload, LoginRequest, ProfileUpdate, Role, SignupRequest, UserProfile, VehicleDraft,
        VehicleRecord, WishlistEntry, WishlistVehicle,
    },
    routes,
    session::{Claims, Session},
};

const BUYER_TOKEN: &str = "buyer-token";

#[derive(Default)]
struct InMemoryMarketplace {
    vehicles: Vec<VehicleRecord>,
    wishlist: Mutex<Vec<WishlistEntry>>,
    created: Mutex<Vec<(VehicleDraft, usize)>>,
    profile_images: Mutex<Vec<ImageUpload>>,
}

impl InMemoryMarketplace {
    fn check(&self, session: &Session) -> Result<(), ApiError> {
        session.ensure_active()?;
        if session.token() == BUYER_TOKEN || session.token().contains('.') {
            Ok(())
        } else {
            Err(ApiError::Unauthorized("Invalid token".into()))
        }
    }
}

#[async_trait]
impl MarketplaceApi for InMemoryMarketplace {
    async fn list_vehicles(&self, _session: Option<&Session>) -> Result<Vec<VehicleRecord>, ApiError> {
        Ok(self.vehicles.clone())
    }

    async fn get_vehicle(&self, _session: Option<&Session>, id: &str) -> Result<VehicleRecord, ApiError> {
        self.vehicles
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("vehicle {}", id)))
    }

    async fn list_wishlist(&self, session: &Session) -> Result<Vec<WishlistEntry>, ApiError> {
        self.check(session)?;
        Ok(self.wishlist.lock().unwrap().clone())
    }

    async fn add_to_wishlist(&self, session: &Session, vehicle_id: &str) -> Result<(), ApiError> {
        self.check(session)?;
        let mut wishlist = self.wishlist.lock().unwrap();
        let id = format!("w{}", wishlist.len() + 1);
        wishlist.push(WishlistEntry {
            id,
            vehicle: Some(WishlistVehicle::Id(vehicle_id.to_string())),
        });
        Ok(())
    }

    async fn remove_from_wishlist(&self, session: &Session, entry_id: &str) -> Result<(), ApiError> {
        self.check(session)?;
        let mut wishlist = self.wishlist.lock().unwrap();
        let before = wishlist.len();
        wishlist.retain(|e| e.id != entry_id);
        if wishlist.len() == before {
            return Err(ApiError::NotFound(format!("wishlist entry {}", entry_id)));
        }
        Ok(())
    }

    async fn login(&self, request: &LoginRequest) -> Result<Session, ApiError> {
        request.validate()?;
        if request.password != "secret" {
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
        Ok(Session::new(
            BUYER_TOKEN,
            UserProfile {
                id: "u1".into(),
                name: "Asha".into(),
                email: request.email.clone(),
                role: request.role,
                ..Default::default()
            },
        ))
    }

    async fn signup(&self, request: &SignupRequest) -> Result<(), ApiError> {
        request.validate()
    }

    async fn dealer_vehicles(&self, session: &Session) -> Result<Vec<VehicleRecord>, ApiError> {
        self.check(session)?;
        Ok(self.vehicles.clone())
    }

    async fn create_vehicle(
        &self,
        session: &Session,
        draft: &VehicleDraft,
        images: Vec<ImageUpload>,
    ) -> Result<Option<VehicleRecord>, ApiError> {
        self.check(session)?;
        draft.validate()?;
        self.created.lock().unwrap().push((draft.clone(), images.len()));
        Ok(Some(vehicle("new-1", &draft.brand, &draft.model, Some(draft.price))))
    }

    async fn update_vehicle(&self, session: &Session, id: &str, draft: &VehicleDraft) -> Result<(), ApiError> {
        self.check(session)?;
        draft.validate()?;
        self.get_vehicle(None, id).await.map(|_| ())
    }

    async fn delete_vehicle(&self, session: &Session, id: &str) -> Result<(), ApiError> {
        self.check(session)?;
        self.get_vehicle(None, id).await.map(|_| ())
    }

    async fn get_profile(&self, session: &Session) -> Result<UserProfile, ApiError> {
        self.check(session)?;
        Ok(UserProfile {
            id: "u1".into(),
            name: "Asha".into(),
            ..Default::default()
        })
    }

    async fn update_profile(&self, session: &Session, update: ProfileUpdate) -> Result<UserProfile, ApiError> {
        self.check(session)?;
        let profile_pic = update.image.map(|image| {
            let url = format!("https://img/{}", image.file_name);
            self.profile_images.lock().unwrap().push(image);
            url
        });
        Ok(UserProfile {
            id: "u1".into(),
            name: update.name.unwrap_or_default(),
            profile_pic,
            ..Default::default()
        })
    }
}

fn vehicle(id: &str, brand: &str, model: &str, price: Option<u64>) -> VehicleRecord {
    serde_json::from_value(json!({ "_id": id, "brand": brand, "model": model, "price": price })).unwrap()
}

fn marketplace() -> Arc<InMemoryMarketplace> {
    Arc::new(InMemoryMarketplace {
        vehicles: vec![
            vehicle("1", "Hero", "Electric", Some(50_000)),
            vehicle("2", "Ather", "450X", Some(150_000)),
            vehicle("3", "Ola", "S1", Some(100_000)),
        ],
        ..Default::default()
    })
}

fn app_with(settings: Settings, api: Arc<InMemoryMarketplace>) -> (Router, AppState) {
    let state = AppState::new(settings, api);
    (routes::create_router(state.clone()), state)
}

fn app() -> (Router, AppState) {
    app_with(Settings::default(), marketplace())
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn send(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn ids(page: &Value) -> Vec<String> {
    page["vehicles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["_id"].as_str().unwrap().to_string())
        .collect()
}

fn role_token(role: &str) -> String {
    encode(
        &Header::default(),
        &Claims {
            exp: None,
            id: Some("u9".into()),
            role: Some(role.into()),
        },
        &EncodingKey::from_secret(b"k"),
    )
    .unwrap()
}

#[tokio::test]
async fn browse_filters_by_price_and_sorts_ascending() {
    let (app, _) = app();
    let response = app
        .oneshot(get("/api/vehicles?priceMax=120000&sort=price-low", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(ids(&page), vec!["1", "3"]);
    assert_eq!(page["total"], 3);
    assert_eq!(page["count"], 2);
}

#[tokio::test]
async fn browse_searches_case_insensitively() {
    let (app, _) = app();
    let page = json_body(app.oneshot(get("/api/vehicles?q=ATHER", None)).await.unwrap()).await;
    assert_eq!(ids(&page), vec!["2"]);
}

#[tokio::test]
async fn browse_uses_configured_price_ceiling() {
    let settings = Settings {
        default_price_max: 120_000,
        ..Settings::default()
    };
    let (app, _) = app_with(settings, marketplace());
    let page = json_body(app.oneshot(get("/api/vehicles?sort=price-high", None)).await.unwrap()).await;
    assert_eq!(ids(&page), vec!["3", "1"]);
}

#[tokio::test]
async fn browse_rejects_non_numeric_price_bounds() {
    let (app, _) = app();
    let response = app.oneshot(get("/api/vehicles?priceMin=cheap", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wishlist_requires_a_bearer_token() {
    let (app, _) = app();
    let response = app.oneshot(get("/api/wishlist", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("Authorization"));
}

#[tokio::test]
async fn wishlist_add_marks_details_and_notifies() {
    let (app, state) = app();
    let mut events = state.events.subscribe();

    let response = app
        .clone()
        .oneshot(send("POST", "/api/wishlist/2", Some(BUYER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        events.recv().await.unwrap(),
        MarketEvent::WishlistUpdated { vehicle_id: Some("2".into()) }
    );

    let details = json_body(
        app.clone()
            .oneshot(get("/api/vehicles/2", Some(BUYER_TOKEN)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(details["inWishlist"], true);

    let anonymous = json_body(app.oneshot(get("/api/vehicles/2", None)).await.unwrap()).await;
    assert!(anonymous.get("inWishlist").is_none());
    assert_eq!(anonymous["brand"], "Ather");
}

#[tokio::test]
async fn wishlist_remove_by_vehicle_or_entry() {
    let (app, _) = app();
    for id in ["1", "3"] {
        app.clone()
            .oneshot(send("POST", &format!("/api/wishlist/{}", id), Some(BUYER_TOKEN), None))
            .await
            .unwrap();
    }

    let by_vehicle = app
        .clone()
        .oneshot(send("DELETE", "/api/wishlist/3?by=vehicle", Some(BUYER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(by_vehicle.status(), StatusCode::NO_CONTENT);

    let by_entry = app
        .clone()
        .oneshot(send("DELETE", "/api/wishlist/w1", Some(BUYER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(by_entry.status(), StatusCode::NO_CONTENT);

    let gone = app
        .clone()
        .oneshot(send("DELETE", "/api/wishlist/w1", Some(BUYER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let bogus = app
        .clone()
        .oneshot(send("DELETE", "/api/wishlist/1?by=color", Some(BUYER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(bogus.status(), StatusCode::BAD_REQUEST);

    let wishlist = json_body(app.oneshot(get("/api/wishlist", Some(BUYER_TOKEN))).await.unwrap()).await;
    assert_eq!(wishlist["count"], 0);
}

#[tokio::test]
async fn unknown_vehicle_is_not_found() {
    let (app, _) = app();
    let response = app.oneshot(get("/api/vehicles/404", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_returns_token_and_publishes() {
    let (app, state) = app();
    let mut events = state.events.subscribe();

    let response = app
        .clone()
        .oneshot(send(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "asha@example.com", "password": "secret", "role": "dealer" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["token"], BUYER_TOKEN);
    assert_eq!(body["user"]["role"], "dealer");
    assert_eq!(
        events.recv().await.unwrap(),
        MarketEvent::LoginChanged {
            role: Some(Role::Dealer),
            name: Some("Asha".into())
        }
    );

    let logout = app
        .oneshot(send("POST", "/api/logout", Some(BUYER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);
    assert_eq!(events.recv().await.unwrap(), MarketEvent::LoggedOut);
}

#[tokio::test]
async fn login_failures_map_to_status_codes() {
    let (app, _) = app();
    let wrong = app
        .clone()
        .oneshot(send(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "asha@example.com", "password": "nope", "role": "buyer" })),
        ))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let incomplete = app
        .oneshot(send(
            "POST",
            "/api/login",
            None,
            Some(json!({ "email": "asha@example.com", "password": "secret", "role": null })),
        ))
        .await
        .unwrap();
    assert_eq!(incomplete.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dealer_routes_reject_buyer_tokens() {
    let (app, _) = app();
    let buyer = app
        .clone()
        .oneshot(get("/api/dealer/vehicles", Some(&role_token("buyer"))))
        .await
        .unwrap();
    assert_eq!(buyer.status(), StatusCode::UNAUTHORIZED);

    // A role this gateway doesn't recognise is still not a dealer
    for role in ["admin", ""] {
        let other = app
            .clone()
            .oneshot(get("/api/dealer/vehicles", Some(&role_token(role))))
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::UNAUTHORIZED, "role {:?}", role);
    }

    let shouting = app
        .clone()
        .oneshot(get("/api/dealer/vehicles", Some(&role_token("DEALER"))))
        .await
        .unwrap();
    assert_eq!(shouting.status(), StatusCode::OK);

    let overview = app
        .oneshot(get("/api/dealer/overview", Some(&role_token("dealer"))))
        .await
        .unwrap();
    assert_eq!(overview.status(), StatusCode::OK);
    let body = json_body(overview).await;
    assert_eq!(body["totalVehicles"], 3);
    assert_eq!(body["listedValue"], 300_000);
}

#[tokio::test]
async fn dealer_creates_vehicle_from_multipart_form() {
    let api = marketplace();
    let (app, state) = app_with(Settings::default(), api.clone());
    let mut events = state.events.subscribe();

    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"brand\"\r\n\r\nOla\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\nS1 Air\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"price\"\r\n\r\n85000\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\nCity scooter\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"a.jpg\"\r\nContent-Type: image/jpeg\r\n\r\nJPEGDATA\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/dealer/vehicles")
        .header(header::AUTHORIZATION, format!("Bearer {}", role_token("dealer")))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let created = api.created.lock().unwrap().clone();
    assert_eq!(created[0].0.model, "S1 Air");
    assert_eq!(created[0].0.price, 85_000);
    assert_eq!(created[0].1, 1);
    assert_eq!(
        events.recv().await.unwrap(),
        MarketEvent::InventoryChanged { vehicle_id: "new-1".into() }
    );
}

#[tokio::test]
async fn dealer_update_validates_the_draft() {
    let (app, _) = app();
    let token = role_token("dealer");
    let ok = app
        .clone()
        .oneshot(send(
            "PUT",
            "/api/dealer/vehicles/1",
            Some(&token),
            Some(json!({ "brand": "Hero", "model": "Electric", "price": 52000, "description": "Updated" })),
        ))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::NO_CONTENT);

    let missing_brand = app
        .oneshot(send(
            "PUT",
            "/api/dealer/vehicles/1",
            Some(&token),
            Some(json!({ "brand": "", "model": "Electric", "price": 52000, "description": "x" })),
        ))
        .await
        .unwrap();
    assert_eq!(missing_brand.status(), StatusCode::BAD_REQUEST);
}

fn multipart(uri: &str, token: &str, parts: &[&str]) -> Request<Body> {
    let boundary = "PROFILEBOUNDARY";
    let mut body = String::new();
    for part in parts {
        body.push_str(&format!("--{}\r\n{}\r\n", boundary, part));
    }
    body.push_str(&format!("--{}--\r\n", boundary));
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn profile_update_needs_a_field() {
    let (app, _) = app();
    let blank = app
        .clone()
        .oneshot(multipart(
            "/api/profile",
            BUYER_TOKEN,
            &[
                "Content-Disposition: form-data; name=\"name\"\r\n\r\n  ",
                "Content-Disposition: form-data; name=\"profileimage\"; filename=\"\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            ],
        ))
        .await
        .unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let renamed = app
        .oneshot(multipart(
            "/api/profile",
            BUYER_TOKEN,
            &["Content-Disposition: form-data; name=\"name\"\r\n\r\nAsha K"],
        ))
        .await
        .unwrap();
    assert_eq!(renamed.status(), StatusCode::OK);
    let body = json_body(renamed).await;
    assert_eq!(body["name"], "Asha K");
    assert!(body["profilepic"].is_null());
}

#[tokio::test]
async fn profile_picture_reaches_the_marketplace() {
    let api = marketplace();
    let (app, _) = app_with(Settings::default(), api.clone());

    let response = app
        .oneshot(multipart(
            "/api/profile",
            BUYER_TOKEN,
            &["Content-Disposition: form-data; name=\"profileimage\"; filename=\"me.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA"],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["profilepic"], "https://img/me.png");

    let images = api.profile_images.lock().unwrap().clone();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].content_type, "image/png");
    assert_eq!(images[0].bytes, b"PNGDATA".to_vec());
}

#[tokio::test]
async fn profile_update_rejects_json_bodies() {
    let (app, _) = app();
    let response = app
        .oneshot(send("PUT", "/api/profile", Some(BUYER_TOKEN), Some(json!({ "name": "Asha K" }))))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}
