//! Gateway for an electric-vehicle marketplace.
//!
//! Listings, wishlists, accounts and dealer inventory live in an external
//! HTTP API. This crate wraps that API in a typed client
//! ([`marketplace_api`]), filters and sorts loaded listings in-process
//! ([`query`]), and exposes the buyer and dealer views as JSON endpoints
//! ([`routes`]).

use std::sync::Arc;

use axum::extract::FromRef;

pub mod auth_middleware;
pub mod config;
pub mod error;
pub mod events;
pub mod marketplace_api;
pub mod models;
pub mod query;
pub mod routes;
pub mod session;

use crate::{config::Settings, events::EventBus, marketplace_api::MarketplaceApi};

// Shared application state handed to every handler
#[derive(Clone, FromRef)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub api: Arc<dyn MarketplaceApi>,
    pub events: EventBus,
}

impl AppState {
    pub fn new(settings: Settings, api: Arc<dyn MarketplaceApi>) -> Self {
        let events = EventBus::new(settings.event_capacity);
        Self {
            settings: Arc::new(settings),
            api,
            events,
        }
    }
}
