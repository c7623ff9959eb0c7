// src/domain/mod.rs
pub mod errors;
pub mod model;
pub mod repository;

// Re-export common types for convenience
pub use errors::{AppError, AppResult, ChannelError, SourceError, SourceResult};
pub use model::{
    HourlyRevenuePoint, OrderEvent, OrderEventType, OrderMetricsSnapshot, OrderStatus,
    RealtimeStats, SourceOutcome,
};
