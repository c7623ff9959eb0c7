// src/adapter/mod.rs
// Adapters wiring the application layer into a running dashboard

pub mod coordinator;

pub use coordinator::{DashboardCoordinator, DashboardView};
