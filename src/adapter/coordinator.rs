// src/adapter/coordinator.rs
// Dashboard coordinator: periodic snapshots plus the live realtime stream

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::application::realtime::{ChannelState, ChannelStatus, ChannelUpdate, RealtimeChannel};
use crate::application::service::{DashboardAggregator, DashboardData};
use crate::domain::errors::{AppResult, ChannelError};
use crate::domain::model::{HourlyRevenuePoint, OrderEvent, OrderMetricsSnapshot, RealtimeStats};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RECENT_ORDERS: usize = 5;

/// Last known value of every dashboard field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardView {
    pub metrics: Option<OrderMetricsSnapshot>,
    pub realtime_stats: Option<RealtimeStats>,
    pub hourly_revenue: Option<Vec<HourlyRevenuePoint>>,
}

impl DashboardView {
    /// Fields missing from `data` keep their previous value. While the
    /// stream is live, polled realtime stats only fill an empty slot and
    /// never replace streamed ones.
    pub fn merge(&mut self, data: DashboardData, stream_live: bool) {
        if let Some(metrics) = data.metrics {
            self.metrics = Some(metrics);
        }
        if let Some(stats) = data.realtime_stats {
            if !(stream_live && self.realtime_stats.is_some()) {
                self.realtime_stats = Some(stats);
            }
        }
        if let Some(hourly) = data.hourly_revenue {
            self.hourly_revenue = Some(hourly);
        }
    }

    pub fn apply_stats(&mut self, stats: RealtimeStats) {
        self.realtime_stats = Some(stats);
    }

    pub fn recent_orders(&self, window: usize) -> Vec<OrderEvent> {
        self.realtime_stats
            .as_ref()
            .map(|stats| stats.recent(window).to_vec())
            .unwrap_or_default()
    }
}

pub struct DashboardCoordinator {
    aggregator: Arc<DashboardAggregator>,
    channel: RealtimeChannel,
    view: Arc<watch::Sender<DashboardView>>,
    refresh_interval: Duration,
    recent_window: usize,
    tasks: Vec<JoinHandle<()>>,
    running: bool,
}

impl DashboardCoordinator {
    pub fn new(aggregator: DashboardAggregator, channel: RealtimeChannel) -> Self {
        let (view, _) = watch::channel(DashboardView::default());

        Self {
            aggregator: Arc::new(aggregator),
            channel,
            view: Arc::new(view),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            recent_window: DEFAULT_RECENT_ORDERS,
            tasks: Vec::new(),
            running: false,
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_recent_orders(mut self, window: usize) -> Self {
        self.recent_window = window;
        self
    }

    pub async fn start(&mut self) -> AppResult<()> {
        if self.running {
            return Ok(());
        }

        // Initial snapshot before the stream starts overriding it
        self.refresh().await;

        let updates = self.channel.updates();
        self.channel.connect();

        self.spawn_refresher();
        self.spawn_update_processor(updates);

        self.running = true;
        log::info!("Dashboard coordinator started");

        Ok(())
    }

    pub async fn stop(&mut self) -> AppResult<()> {
        if !self.running {
            return Ok(());
        }

        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.channel.disconnect();

        self.running = false;
        log::info!("Dashboard coordinator stopped");

        Ok(())
    }

    /// Fetch a new snapshot and merge it into the view.
    pub async fn refresh(&self) -> DashboardData {
        let status = self.channel.watch_status();
        refresh_view(&self.aggregator, &self.view, &status).await
    }

    /// Retry the realtime connection, typically after it gave up.
    pub fn reconnect(&self) {
        log::info!("Reconnecting realtime channel");
        self.channel.connect();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    /// Receiver notified whenever the view changes
    pub fn watch_view(&self) -> watch::Receiver<DashboardView> {
        self.view.subscribe()
    }

    pub fn recent_orders(&self) -> Vec<OrderEvent> {
        self.view.borrow().recent_orders(self.recent_window)
    }

    pub fn channel_status(&self) -> ChannelStatus {
        self.channel.status()
    }

    fn spawn_refresher(&mut self) {
        let aggregator = self.aggregator.clone();
        let view = self.view.clone();
        let status = self.channel.watch_status();
        let period = self.refresh_interval;

        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately and start() already fetched
            ticker.tick().await;

            loop {
                ticker.tick().await;
                refresh_view(&aggregator, &view, &status).await;
            }
        }));
    }

    fn spawn_update_processor(&mut self, mut updates: mpsc::UnboundedReceiver<ChannelUpdate>) {
        let view = self.view.clone();

        self.tasks.push(tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                match update {
                    ChannelUpdate::Stats(stats) => {
                        view.send_modify(|current| current.apply_stats(stats));
                    }
                    ChannelUpdate::Error(ChannelError::Exhausted { attempts }) => {
                        log::warn!(
                            "Realtime updates stopped after {} failed attempts; showing last known values",
                            attempts
                        );
                    }
                    ChannelUpdate::Error(error) => {
                        log::error!("Realtime channel error: {}", error);
                    }
                }
            }

            log::info!("Realtime update processor stopped");
        }));
    }
}

impl Drop for DashboardCoordinator {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn refresh_view(
    aggregator: &DashboardAggregator,
    view: &watch::Sender<DashboardView>,
    channel_status: &watch::Receiver<ChannelStatus>,
) -> DashboardData {
    let data = aggregator.fetch_dashboard_data().await;
    if data.metrics.is_none() && data.realtime_stats.is_none() && data.hourly_revenue.is_none() {
        log::warn!("Dashboard refresh returned no data, keeping last known values");
    }
    let stream_live = channel_status.borrow().state == ChannelState::Connected;
    view.send_modify(|current| current.merge(data.clone(), stream_live));
    data
}
