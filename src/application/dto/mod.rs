// src/application/dto/mod.rs
// Wire shapes of the order service, the analytics service and the realtime stream

pub mod parser;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::errors::SourceError;
use crate::domain::model::{
    HourlyRevenuePoint, OrderEvent, OrderEventType, OrderMetricsSnapshot, OrderStatus,
    RealtimeStats,
};

// ---- analytics service ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderMetricsResponse {
    pub total_orders: u64,
    pub total_revenue: Decimal,
    #[serde(default)]
    pub orders_by_status: BTreeMap<String, u64>,
    #[serde(default)]
    pub avg_order_value: Option<Decimal>,
    #[serde(default)]
    pub orders_per_hour: BTreeMap<String, u64>,
}

impl TryFrom<OrderMetricsResponse> for OrderMetricsSnapshot {
    type Error = SourceError;

    fn try_from(response: OrderMetricsResponse) -> Result<Self, Self::Error> {
        non_negative("total_revenue", response.total_revenue)?;

        // Average is recomputed so the zero-order guard holds for every source
        Ok(OrderMetricsSnapshot::new(
            response.total_orders,
            response.total_revenue,
            response.orders_by_status,
        ))
    }
}

fn non_negative(field: &str, value: Decimal) -> Result<Decimal, SourceError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(SourceError::ParseFailure(format!(
            "{} must not be negative, got {}",
            field, value
        )));
    }
    Ok(value)
}

/// Body of `GET /metrics/realtime` and of every frame on the realtime socket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeFrame {
    pub current_orders_per_minute: Decimal,
    #[serde(default)]
    pub revenue_per_minute: Option<Decimal>,
    #[serde(default)]
    pub active_users: Option<u64>,
    pub recent_orders: Vec<RecentOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentOrder {
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "totalAmount", default)]
    pub total_amount: Option<Decimal>,
    #[serde(rename = "eventType", default)]
    pub event_type: Option<String>,
}

impl TryFrom<RealtimeFrame> for RealtimeStats {
    type Error = SourceError;

    fn try_from(frame: RealtimeFrame) -> Result<Self, Self::Error> {
        Ok(RealtimeStats {
            orders_per_minute: non_negative(
                "current_orders_per_minute",
                frame.current_orders_per_minute,
            )?,
            revenue_per_minute: frame
                .revenue_per_minute
                .map(|rate| non_negative("revenue_per_minute", rate))
                .transpose()?,
            active_users: frame.active_users,
            recent_orders: frame.recent_orders.into_iter().map(OrderEvent::from).collect(),
        })
    }
}

impl From<RecentOrder> for OrderEvent {
    fn from(order: RecentOrder) -> Self {
        OrderEvent {
            order_id: order.order_id,
            total_amount: order.total_amount,
            event_type: order
                .event_type
                .as_deref()
                .map(OrderEventType::from_label)
                .unwrap_or_else(|| OrderEventType::Other("unknown".to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyRevenueResponse {
    pub data: Vec<HourlyRevenueRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyRevenueRow {
    pub hour: String,
    pub orders: u64,
    pub revenue: Decimal,
}

impl From<HourlyRevenueRow> for HourlyRevenuePoint {
    fn from(row: HourlyRevenueRow) -> Self {
        HourlyRevenuePoint {
            hour_label: row.hour,
            revenue: row.revenue,
            order_count: row.orders,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopProductsResponse {
    pub products: Vec<ProductMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMetrics {
    pub product_id: String,
    pub product_name: String,
    pub total_quantity_sold: u64,
    pub total_revenue: Decimal,
    pub order_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub services: BTreeMap<String, bool>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

// ---- order service ----

/// `GET /orders/analytics/revenue` has been served both as a bare number and
/// wrapped in an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RevenueResponse {
    Bare(Decimal),
    Wrapped {
        #[serde(rename = "totalRevenue")]
        total_revenue: Decimal,
    },
}

impl RevenueResponse {
    pub fn amount(&self) -> Decimal {
        match self {
            RevenueResponse::Bare(amount) => *amount,
            RevenueResponse::Wrapped { total_revenue } => *total_revenue,
        }
    }
}

/// One page of a paged order-service listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}

pub type OrderPage = Page<OrderSummary>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: String,
    pub order_number: String,
    pub user_id: String,
    #[serde(default)]
    pub user_full_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    #[serde(default)]
    pub tax_amount: Option<Decimal>,
    #[serde(default)]
    pub shipping_amount: Option<Decimal>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default)]
    pub shipping_address: Option<serde_json::Value>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub total_items: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<CreateOrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<serde_json::Value>,
    pub tax_amount: Decimal,
    pub shipping_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderItem {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub sku: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}
