// src/application/service/mod.rs
// Application services

pub mod aggregator;

pub use aggregator::{DashboardAggregator, DashboardData};
