// src/domain/repository/mod.rs
// Ports for the backend sources and the streaming transport

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::domain::errors::SourceResult;
use crate::domain::model::{HourlyRevenuePoint, OrderMetricsSnapshot, RealtimeStats};

/// Read side of the analytics service used to build a dashboard snapshot
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn order_metrics(&self) -> SourceResult<OrderMetricsSnapshot>;
    async fn realtime_stats(&self) -> SourceResult<RealtimeStats>;
    async fn hourly_revenue(&self, hours: u32) -> SourceResult<Vec<HourlyRevenuePoint>>;
}

/// Raw order-service figures used when analytics cannot report metrics
#[async_trait]
pub trait OrderLedger: Send + Sync {
    async fn total_revenue(&self) -> SourceResult<rust_decimal::Decimal>;

    /// Total number of orders, read from the count field of a page of at
    /// most `page_size` orders.
    async fn total_order_count(&self, page_size: u32) -> SourceResult<u64>;
}

/// Everything a streaming transport can report, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Frame(Vec<u8>),
    Closed,
    Error(String),
}

/// Opens streaming transports. Opening never blocks: the outcome of the
/// connection attempt arrives as the first event on the returned handle.
pub trait RealtimeConnector: Send + Sync {
    fn open(&self) -> TransportHandle;
}

/// One open (or opening) transport
#[derive(Debug)]
pub struct TransportHandle {
    events: mpsc::Receiver<TransportEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TransportHandle {
    pub fn new(events: mpsc::Receiver<TransportEvent>, shutdown: oneshot::Sender<()>) -> Self {
        Self {
            events,
            shutdown: Some(shutdown),
        }
    }

    /// Next event; a transport whose event stream ended counts as closed.
    pub async fn next_event(&mut self) -> TransportEvent {
        self.events.recv().await.unwrap_or(TransportEvent::Closed)
    }

    pub fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The transport task may already be gone
            let _ = shutdown.send(());
        }
    }
}
