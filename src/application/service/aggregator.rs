// src/application/service/aggregator.rs
// Fan-out/fan-in over the analytics and order services

use std::sync::Arc;

use crate::domain::model::{
    HourlyRevenuePoint, OrderMetricsSnapshot, RealtimeStats, SourceOutcome,
};
use crate::domain::repository::{MetricsSource, OrderLedger};

pub const DEFAULT_HOURLY_WINDOW: u32 = 24;
pub const DEFAULT_FALLBACK_PAGE_SIZE: u32 = 100;

/// Best-effort dashboard snapshot. A field is `None` exactly when every
/// source able to provide it failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardData {
    pub metrics: Option<OrderMetricsSnapshot>,
    pub realtime_stats: Option<RealtimeStats>,
    pub hourly_revenue: Option<Vec<HourlyRevenuePoint>>,
}

pub struct DashboardAggregator {
    analytics: Arc<dyn MetricsSource>,
    orders: Arc<dyn OrderLedger>,
    hourly_window: u32,
    fallback_page_size: u32,
}

impl DashboardAggregator {
    pub fn new(analytics: Arc<dyn MetricsSource>, orders: Arc<dyn OrderLedger>) -> Self {
        Self {
            analytics,
            orders,
            hourly_window: DEFAULT_HOURLY_WINDOW,
            fallback_page_size: DEFAULT_FALLBACK_PAGE_SIZE,
        }
    }

    pub fn with_hourly_window(mut self, hours: u32) -> Self {
        self.hourly_window = hours;
        self
    }

    pub fn with_fallback_page_size(mut self, size: u32) -> Self {
        self.fallback_page_size = size;
        self
    }

    /// Query every source concurrently and merge whatever succeeded.
    /// Never fails as a whole.
    pub async fn fetch_dashboard_data(&self) -> DashboardData {
        let (metrics, realtime_stats, hourly_revenue) = tokio::join!(
            self.fetch_metrics(),
            self.fetch_outcome("realtime stats", self.analytics.realtime_stats()),
            self.fetch_outcome(
                "hourly revenue",
                self.analytics.hourly_revenue(self.hourly_window)
            ),
        );

        DashboardData {
            metrics,
            realtime_stats: realtime_stats.into_option(),
            hourly_revenue: hourly_revenue.into_option(),
        }
    }

    async fn fetch_outcome<T>(
        &self,
        label: &str,
        call: impl std::future::Future<Output = crate::domain::SourceResult<T>>,
    ) -> SourceOutcome<T> {
        let outcome = SourceOutcome::from(call.await);
        if let Some(reason) = outcome.failure() {
            log::warn!("Analytics {} unavailable: {}", label, reason);
        }
        outcome
    }

    /// Analytics metrics, or a snapshot rebuilt from the order service when
    /// analytics cannot answer. Starts the fallback as soon as the primary
    /// call fails, while the other primary calls may still be running.
    async fn fetch_metrics(&self) -> Option<OrderMetricsSnapshot> {
        match self
            .fetch_outcome("order metrics", self.analytics.order_metrics())
            .await
        {
            SourceOutcome::Success(metrics) => Some(metrics),
            SourceOutcome::Failure(_) => {
                log::info!("Falling back to order service for order metrics");
                self.synthesize_metrics().await
            }
        }
    }

    async fn synthesize_metrics(&self) -> Option<OrderMetricsSnapshot> {
        let (revenue, count) = tokio::join!(
            self.orders.total_revenue(),
            self.orders.total_order_count(self.fallback_page_size),
        );

        match (SourceOutcome::from(revenue), SourceOutcome::from(count)) {
            (SourceOutcome::Success(revenue), SourceOutcome::Success(count)) => {
                let snapshot = OrderMetricsSnapshot::synthesized(count, revenue);
                log::debug!(
                    "Synthesized metrics: {} orders, revenue {}, average {}",
                    snapshot.total_orders,
                    snapshot.total_revenue,
                    snapshot.avg_order_value
                );
                Some(snapshot)
            }
            (revenue, count) => {
                for reason in revenue.failure().into_iter().chain(count.failure()) {
                    log::error!("Error loading fallback metrics: {}", reason);
                }
                None
            }
        }
    }
}
