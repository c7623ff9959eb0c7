// src/application/realtime/channel.rs
// Owning driver for one realtime connection

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};

use super::machine::{ChannelAction, ChannelInput, ChannelMachine, ChannelState, RetryPolicy};
use crate::domain::errors::ChannelError;
use crate::domain::model::RealtimeStats;
use crate::domain::repository::{RealtimeConnector, TransportEvent, TransportHandle};

/// Receives everything the channel pushes to its consumer
#[async_trait]
pub trait RealtimeHandler: Send {
    async fn on_stats(&mut self, stats: RealtimeStats);
    async fn on_error(&mut self, error: ChannelError);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelUpdate {
    Stats(RealtimeStats),
    Error(ChannelError),
}

#[async_trait]
impl RealtimeHandler for mpsc::UnboundedSender<ChannelUpdate> {
    async fn on_stats(&mut self, stats: RealtimeStats) {
        if self.send(ChannelUpdate::Stats(stats)).is_err() {
            log::debug!("Realtime subscriber dropped, discarding update");
        }
    }

    async fn on_error(&mut self, error: ChannelError) {
        if self.send(ChannelUpdate::Error(error)).is_err() {
            log::debug!("Realtime subscriber dropped, discarding error");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStatus {
    pub state: ChannelState,
    pub consecutive_failures: u32,
}

enum Command {
    Input(ChannelInput),
    Subscribe(Box<dyn RealtimeHandler>),
}

/// A persistent streaming connection that reconnects on its own within the
/// bounds of its [`RetryPolicy`].
///
/// All transitions run on one task owned by the channel. `connect` and
/// `disconnect` only enqueue a request and return immediately; progress is
/// observable through [`RealtimeChannel::watch_status`] and the subscriber.
/// Dropping the channel tears the connection down.
pub struct RealtimeChannel {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ChannelStatus>,
    task: JoinHandle<()>,
}

impl RealtimeChannel {
    /// Must be called from within a tokio runtime.
    pub fn new(connector: Arc<dyn RealtimeConnector>, policy: RetryPolicy) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let machine = ChannelMachine::new(policy);
        let (status_tx, status) = watch::channel(ChannelStatus {
            state: machine.state(),
            consecutive_failures: machine.consecutive_failures(),
        });

        let driver = ChannelDriver {
            machine,
            connector,
            commands: command_rx,
            status: status_tx,
            transport: None,
            retry_timer: None,
            handler: None,
        };
        let task = tokio::spawn(driver.run());

        Self {
            commands,
            status,
            task,
        }
    }

    /// Replace the active handler. Only one handler is active at a time.
    pub fn subscribe(&self, handler: Box<dyn RealtimeHandler>) {
        self.send(Command::Subscribe(handler));
    }

    /// Subscribe with a queue instead of a handler.
    pub fn updates(&self) -> mpsc::UnboundedReceiver<ChannelUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(Box::new(tx));
        rx
    }

    pub fn connect(&self) {
        self.send(Command::Input(ChannelInput::Connect));
    }

    pub fn disconnect(&self) {
        self.send(Command::Input(ChannelInput::Disconnect));
    }

    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> ChannelState {
        self.status().state
    }

    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            log::error!("Realtime channel task is no longer running");
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ChannelDriver {
    machine: ChannelMachine,
    connector: Arc<dyn RealtimeConnector>,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<ChannelStatus>,
    transport: Option<TransportHandle>,
    retry_timer: Option<Pin<Box<Sleep>>>,
    handler: Option<Box<dyn RealtimeHandler>>,
}

impl ChannelDriver {
    async fn run(mut self) {
        loop {
            let input = tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Input(input)) => input,
                    Some(Command::Subscribe(handler)) => {
                        self.handler = Some(handler);
                        continue;
                    }
                    None => break,
                },
                event = next_transport_event(&mut self.transport) => ChannelInput::Transport(event),
                _ = retry_elapsed(&mut self.retry_timer) => {
                    self.retry_timer = None;
                    ChannelInput::RetryTimerFired
                }
            };

            for action in self.machine.handle(input) {
                self.perform(action).await;
            }
            self.publish_status();
        }

        self.retry_timer = None;
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
    }

    async fn perform(&mut self, action: ChannelAction) {
        match action {
            ChannelAction::OpenTransport => {
                if let Some(stale) = self.transport.take() {
                    stale.close();
                }
                self.transport = Some(self.connector.open());
            }
            ChannelAction::CloseTransport => {
                if let Some(transport) = self.transport.take() {
                    transport.close();
                }
            }
            ChannelAction::ScheduleRetry(delay) => {
                log::info!("Scheduling realtime reconnect in {:?}", delay);
                self.retry_timer = Some(Box::pin(sleep(delay)));
            }
            ChannelAction::CancelRetry => {
                self.retry_timer = None;
            }
            ChannelAction::Deliver(stats) => match self.handler.as_mut() {
                Some(handler) => handler.on_stats(stats).await,
                None => log::debug!("No realtime subscriber, dropping update"),
            },
            ChannelAction::Notify(error) => match self.handler.as_mut() {
                Some(handler) => handler.on_error(error).await,
                None => log::warn!("Realtime channel error with no subscriber: {}", error),
            },
        }
    }

    fn publish_status(&self) {
        self.status.send_replace(ChannelStatus {
            state: self.machine.state(),
            consecutive_failures: self.machine.consecutive_failures(),
        });
    }
}

async fn next_transport_event(
    transport: &mut Option<TransportHandle>,
) -> TransportEvent {
    match transport {
        Some(transport) => transport.next_event().await,
        None => pending().await,
    }
}

async fn retry_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Connector whose first `failures` opens are refused; later opens
    /// succeed and stay open so tests can push frames into them.
    struct FakeConnector {
        failures: usize,
        opens: AtomicUsize,
        live: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    }

    impl FakeConnector {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                opens: AtomicUsize::new(0),
                live: Mutex::new(None),
            })
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        async fn push(&self, event: TransportEvent) {
            let sender = self.live.lock().unwrap().clone().expect("no live transport");
            sender.send(event).await.unwrap();
        }
    }

    impl RealtimeConnector for FakeConnector {
        fn open(&self) -> TransportHandle {
            let attempt = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
            let (tx, rx) = mpsc::channel(16);
            let (shutdown, _) = oneshot::channel();

            if attempt <= self.failures {
                tx.try_send(TransportEvent::Error("connection refused".into())).unwrap();
            } else {
                tx.try_send(TransportEvent::Opened).unwrap();
                *self.live.lock().unwrap() = Some(tx);
            }
            TransportHandle::new(rx, shutdown)
        }
    }

    fn frame(orders_per_minute: u32) -> TransportEvent {
        TransportEvent::Frame(
            format!(
                r#"{{"current_orders_per_minute": {}, "recent_orders": [{{"orderId": "o-{}", "totalAmount": 10, "eventType": "created"}}]}}"#,
                orders_per_minute, orders_per_minute
            )
            .into_bytes(),
        )
    }

    async fn wait_for_state(channel: &RealtimeChannel, state: ChannelState) {
        let mut status = channel.watch_status();
        status
            .wait_for(|status| status.state == state)
            .await
            .unwrap();
    }

    async fn next_stats(updates: &mut mpsc::UnboundedReceiver<ChannelUpdate>) -> RealtimeStats {
        match updates.recv().await {
            Some(ChannelUpdate::Stats(stats)) => stats,
            other => panic!("expected stats, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn frames_reach_subscriber_in_arrival_order() {
        let connector = FakeConnector::new(0);
        let channel = RealtimeChannel::new(connector.clone(), RetryPolicy::default());
        let mut updates = channel.updates();

        channel.connect();
        wait_for_state(&channel, ChannelState::Connected).await;

        for n in [1, 2, 3] {
            connector.push(frame(n)).await;
        }

        assert_eq!(next_stats(&mut updates).await.orders_per_minute, dec!(1));
        assert_eq!(next_stats(&mut updates).await.orders_per_minute, dec!(2));
        assert_eq!(next_stats(&mut updates).await.orders_per_minute, dec!(3));
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_without_disconnecting() {
        let connector = FakeConnector::new(0);
        let channel = RealtimeChannel::new(connector.clone(), RetryPolicy::default());
        let mut updates = channel.updates();

        channel.connect();
        wait_for_state(&channel, ChannelState::Connected).await;

        connector.push(frame(1)).await;
        connector.push(TransportEvent::Frame(b"{\"oops\": true}".to_vec())).await;
        connector.push(frame(2)).await;

        assert_eq!(next_stats(&mut updates).await.orders_per_minute, dec!(1));
        assert_eq!(next_stats(&mut updates).await.orders_per_minute, dec!(2));
        assert_eq!(channel.state(), ChannelState::Connected);
        assert_eq!(connector.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_five_failures_until_connect_is_called() {
        let connector = FakeConnector::new(5);
        let channel = RealtimeChannel::new(connector.clone(), RetryPolicy::default());
        let mut updates = channel.updates();

        channel.connect();
        wait_for_state(&channel, ChannelState::Exhausted).await;
        assert_eq!(connector.opens(), 5);
        assert_eq!(channel.status().consecutive_failures, 5);

        // No sixth attempt on its own
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.opens(), 5);
        assert_eq!(channel.state(), ChannelState::Exhausted);

        let mut errors = Vec::new();
        while let Ok(update) = updates.try_recv() {
            errors.push(update);
        }
        assert_eq!(errors.len(), 6);
        assert_eq!(
            errors.last(),
            Some(&ChannelUpdate::Error(ChannelError::Exhausted { attempts: 5 }))
        );

        channel.connect();
        wait_for_state(&channel, ChannelState::Connected).await;
        assert_eq!(connector.opens(), 6);
        assert_eq!(channel.status().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_wait_for_the_configured_delay() {
        let connector = FakeConnector::new(1);
        let channel = RealtimeChannel::new(connector.clone(), RetryPolicy::default());

        channel.connect();
        wait_for_state(&channel, ChannelState::Reconnecting).await;
        let waiting_since = tokio::time::Instant::now();

        wait_for_state(&channel, ChannelState::Connected).await;
        assert!(waiting_since.elapsed() >= Duration::from_secs(5));
        assert_eq!(connector.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let connector = FakeConnector::new(1);
        let channel = RealtimeChannel::new(connector.clone(), RetryPolicy::default());

        channel.connect();
        wait_for_state(&channel, ChannelState::Reconnecting).await;

        channel.disconnect();
        wait_for_state(&channel, ChannelState::Closed).await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.opens(), 1);
        assert_eq!(channel.state(), ChannelState::Closed);

        channel.disconnect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(channel.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn channels_are_independent() {
        let first_connector = FakeConnector::new(0);
        let second_connector = FakeConnector::new(0);
        let first = RealtimeChannel::new(first_connector.clone(), RetryPolicy::default());
        let second = RealtimeChannel::new(second_connector.clone(), RetryPolicy::default());

        first.connect();
        wait_for_state(&first, ChannelState::Connected).await;
        first.disconnect();
        wait_for_state(&first, ChannelState::Closed).await;

        assert_eq!(second.state(), ChannelState::Idle);
        assert_eq!(second_connector.opens(), 0);
    }

    #[tokio::test]
    async fn new_subscriber_replaces_previous_one() {
        let connector = FakeConnector::new(0);
        let channel = RealtimeChannel::new(connector.clone(), RetryPolicy::default());
        let mut first = channel.updates();
        let mut second = channel.updates();

        channel.connect();
        wait_for_state(&channel, ChannelState::Connected).await;
        connector.push(frame(4)).await;

        assert_eq!(next_stats(&mut second).await.orders_per_minute, dec!(4));
        assert!(first.try_recv().is_err());
    }
}
