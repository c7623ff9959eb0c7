// src/infrastructure/mod.rs
// Infrastructure layer module declarations

pub mod analytics;
pub mod http;
pub mod orders;
pub mod realtime;

pub use analytics::AnalyticsHttpRepository;
pub use http::{BasicAuth, HttpJsonClient};
pub use orders::OrderServiceHttpRepository;
pub use realtime::WebSocketConnector;
