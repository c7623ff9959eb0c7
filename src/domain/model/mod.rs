// src/domain/model/mod.rs
// Core domain models: point-in-time metrics views

pub mod outcome;

pub use outcome::SourceOutcome;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Overall order metrics, either reported by analytics or synthesized from
/// the order service.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderMetricsSnapshot {
    pub total_orders: u64,
    pub total_revenue: Decimal,
    pub avg_order_value: Decimal,
    /// Empty when the snapshot was synthesized without status information
    pub orders_by_status: BTreeMap<String, u64>,
}

impl OrderMetricsSnapshot {
    pub fn new(
        total_orders: u64,
        total_revenue: Decimal,
        orders_by_status: BTreeMap<String, u64>,
    ) -> Self {
        Self {
            total_orders,
            total_revenue,
            avg_order_value: average_order_value(total_revenue, total_orders),
            orders_by_status,
        }
    }

    /// Snapshot built from a raw order count and revenue total.
    pub fn synthesized(total_orders: u64, total_revenue: Decimal) -> Self {
        Self::new(total_orders, total_revenue, BTreeMap::new())
    }
}

/// Revenue divided by order count. With no orders the revenue itself is
/// returned instead of dividing by zero.
pub fn average_order_value(total_revenue: Decimal, total_orders: u64) -> Decimal {
    if total_orders == 0 {
        total_revenue
    } else {
        total_revenue / Decimal::from(total_orders)
    }
}

/// Live throughput figures pushed over the realtime channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RealtimeStats {
    pub orders_per_minute: Decimal,
    pub revenue_per_minute: Option<Decimal>,
    pub active_users: Option<u64>,
    /// Most recent first. Never truncated here.
    pub recent_orders: Vec<OrderEvent>,
}

impl RealtimeStats {
    pub fn recent(&self, window: usize) -> &[OrderEvent] {
        let end = window.min(self.recent_orders.len());
        &self.recent_orders[..end]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub order_id: String,
    /// Only creation events carry an amount
    pub total_amount: Option<Decimal>,
    pub event_type: OrderEventType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEventType {
    Created,
    StatusChanged,
    Cancelled,
    Other(String),
}

impl OrderEventType {
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "ORDER_CREATED" | "CREATED" => OrderEventType::Created,
            "ORDER_STATUS_CHANGED" | "UPDATED" | "STATUS_CHANGED" => OrderEventType::StatusChanged,
            "ORDER_CANCELLED" | "CANCELLED" => OrderEventType::Cancelled,
            _ => OrderEventType::Other(label.to_string()),
        }
    }
}

impl fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderEventType::Created => write!(f, "created"),
            OrderEventType::StatusChanged => write!(f, "updated"),
            OrderEventType::Cancelled => write!(f, "cancelled"),
            OrderEventType::Other(label) => write!(f, "{}", label),
        }
    }
}

/// One bucket of the trailing hourly revenue series (oldest first).
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRevenuePoint {
    pub hour_label: String,
    pub revenue: Decimal,
    pub order_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
