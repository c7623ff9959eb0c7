// src/infrastructure/analytics/mod.rs
// Analytics service repository implementation

use std::time::Duration;

use async_trait::async_trait;

use crate::application::dto::{
    HealthStatus, HourlyRevenueResponse, OrderMetricsResponse, ProductMetrics, RealtimeFrame,
    TopProductsResponse,
};
use crate::domain::errors::SourceResult;
use crate::domain::model::{HourlyRevenuePoint, OrderMetricsSnapshot, RealtimeStats};
use crate::domain::repository::MetricsSource;
use crate::infrastructure::http::HttpJsonClient;

pub struct AnalyticsHttpRepository {
    http: HttpJsonClient,
}

impl AnalyticsHttpRepository {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            http: HttpJsonClient::new(base_url, timeout),
        }
    }

    pub async fn top_products(&self, limit: u32) -> SourceResult<Vec<ProductMetrics>> {
        let response: TopProductsResponse = self
            .http
            .get(&format!("/metrics/products/top?limit={}", limit))
            .await?;
        Ok(response.products)
    }

    pub async fn health(&self) -> SourceResult<HealthStatus> {
        self.http.get("/health").await
    }
}

#[async_trait]
impl MetricsSource for AnalyticsHttpRepository {
    async fn order_metrics(&self) -> SourceResult<OrderMetricsSnapshot> {
        let response: OrderMetricsResponse = self.http.get("/metrics/orders").await?;
        response.try_into()
    }

    async fn realtime_stats(&self) -> SourceResult<RealtimeStats> {
        let frame: RealtimeFrame = self.http.get("/metrics/realtime").await?;
        frame.try_into()
    }

    async fn hourly_revenue(&self, hours: u32) -> SourceResult<Vec<HourlyRevenuePoint>> {
        let response: HourlyRevenueResponse = self
            .http
            .get(&format!("/metrics/revenue/hourly?hours={}", hours))
            .await?;
        Ok(response.data.into_iter().map(HourlyRevenuePoint::from).collect())
    }
}
