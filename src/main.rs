// src/main.rs
use order_dashboard::adapter::DashboardCoordinator;
use order_dashboard::application::realtime::RealtimeChannel;
use order_dashboard::application::service::DashboardAggregator;
use order_dashboard::config::Config;
use order_dashboard::domain::errors::AppResult;
use order_dashboard::infrastructure::{
    AnalyticsHttpRepository, OrderServiceHttpRepository, WebSocketConnector,
};

use std::sync::Arc;
use tokio::signal::ctrl_c;
use tokio::time::Duration;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting order-dashboard v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Order service at {}", config.order_service.base_url);
    log::info!("Analytics service at {}", config.analytics.base_url);

    // Create service clients
    let analytics = Arc::new(AnalyticsHttpRepository::new(
        &config.analytics.base_url,
        Duration::from_secs(config.analytics.timeout_secs),
    ));
    let orders = Arc::new(OrderServiceHttpRepository::new(
        &config.order_service.base_url,
        &config.order_service_auth(),
        Duration::from_secs(config.order_service.timeout_secs),
    ));

    match analytics.health().await {
        Ok(health) if health.is_healthy() => log::info!("Analytics service is healthy"),
        Ok(health) => log::warn!("Analytics service reports {}", health.status),
        Err(e) => log::warn!("Analytics health check failed: {}", e),
    }

    let aggregator = DashboardAggregator::new(analytics, orders)
        .with_hourly_window(config.dashboard.hourly_window)
        .with_fallback_page_size(config.dashboard.fallback_page_size);

    // Realtime stream
    let connector = Arc::new(
        WebSocketConnector::new(config.realtime_url()?)
            .with_handshake_timeout(config.handshake_timeout()),
    );
    let channel = RealtimeChannel::new(connector, config.retry_policy()?);

    let mut coordinator = DashboardCoordinator::new(aggregator, channel)
        .with_refresh_interval(Duration::from_secs(config.dashboard.refresh_secs))
        .with_recent_orders(config.dashboard.recent_orders);

    log::info!("Starting dashboard...");
    coordinator.start().await?;

    let mut view = coordinator.watch_view();
    loop {
        tokio::select! {
            _ = ctrl_c() => {
                log::info!("Received shutdown signal");
                break;
            }
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                if let Some(metrics) = &current.metrics {
                    log::info!(
                        "Orders: {} | Revenue: {} | Avg order: {}",
                        metrics.total_orders,
                        metrics.total_revenue,
                        metrics.avg_order_value
                    );
                }
                if let Some(stats) = &current.realtime_stats {
                    log::info!("Orders/min: {}", stats.orders_per_minute);
                }
                for order in coordinator.recent_orders() {
                    log::debug!("  {} {}", order.event_type, order.order_id);
                }
            }
        }
    }

    coordinator.stop().await?;
    log::info!("Shutdown complete");

    Ok(())
}
