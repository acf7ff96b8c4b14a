//! HTTP surface of the analytics subsystem: ingestion and dashboard
//! endpoints, the request-tracking middleware, and the service wiring that
//! assembles the whole pipeline.

pub mod middleware;
pub mod rest;
pub mod server;
pub mod service;

pub use rest::AppState;
pub use server::ApiServer;
pub use service::AnalyticsService;
