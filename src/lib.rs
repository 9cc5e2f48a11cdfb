pub mod api;
pub mod cache;
pub mod config;
pub mod elevation;
pub mod error;
pub mod flight_processor;
pub mod flight_service;
pub mod geo;
pub mod log_format;
pub mod metrics;
pub mod models;
pub mod rate_limiter;
pub mod route_client;
pub mod session;
pub mod token_manager;
pub mod trajectory;
pub mod upstream;
pub mod ws;
