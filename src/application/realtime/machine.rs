// src/application/realtime/machine.rs
// Connection lifecycle of the realtime channel as a pure transition function

use std::time::Duration;

use crate::application::dto::parser::parse_realtime_frame;
use crate::domain::errors::ChannelError;
use crate::domain::model::RealtimeStats;
use crate::domain::repository::TransportEvent;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Exhausted,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// Doubles the delay after each failure, capped at `max`
    Exponential { max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows the `failures`-th consecutive failure
    pub fn delay_for(&self, failures: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { max } => {
                let exponent = failures.saturating_sub(1).min(16);
                self.delay.saturating_mul(1u32 << exponent).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelInput {
    Connect,
    Disconnect,
    Transport(TransportEvent),
    RetryTimerFired,
}

/// Side effects requested by a transition, performed in order by the driver
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelAction {
    OpenTransport,
    CloseTransport,
    ScheduleRetry(Duration),
    CancelRetry,
    Deliver(RealtimeStats),
    Notify(ChannelError),
}

#[derive(Debug, Clone)]
pub struct ChannelMachine {
    state: ChannelState,
    consecutive_failures: u32,
    policy: RetryPolicy,
}

impl ChannelMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: ChannelState::Idle,
            consecutive_failures: 0,
            policy,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn handle(&mut self, input: ChannelInput) -> Vec<ChannelAction> {
        use ChannelState::*;

        match (self.state, input) {
            (Idle | Exhausted | Closed, ChannelInput::Connect) => {
                self.state = Connecting;
                vec![ChannelAction::OpenTransport]
            }
            (_, ChannelInput::Connect) => {
                log::debug!("Ignoring connect while {:?}", self.state);
                Vec::new()
            }

            (Closed, ChannelInput::Disconnect) => Vec::new(),
            (_, ChannelInput::Disconnect) => {
                self.state = Closed;
                // Timer first, so a pending retry can never reopen a torn-down channel
                vec![ChannelAction::CancelRetry, ChannelAction::CloseTransport]
            }

            (Reconnecting, ChannelInput::RetryTimerFired) => {
                log::info!(
                    "Attempting to reconnect... ({}/{})",
                    self.consecutive_failures,
                    self.policy.max_attempts
                );
                self.state = Connecting;
                vec![ChannelAction::OpenTransport]
            }
            (_, ChannelInput::RetryTimerFired) => Vec::new(),

            (Connecting, ChannelInput::Transport(TransportEvent::Opened)) => {
                log::info!("Realtime channel connected");
                self.state = Connected;
                self.consecutive_failures = 0;
                Vec::new()
            }

            (Connected, ChannelInput::Transport(TransportEvent::Frame(frame))) => {
                match parse_realtime_frame(&frame) {
                    Ok(stats) => vec![ChannelAction::Deliver(stats)],
                    Err(e) => {
                        log::error!("Error parsing realtime frame, dropping it: {}", e);
                        Vec::new()
                    }
                }
            }

            (Connecting | Connected, ChannelInput::Transport(TransportEvent::Closed)) => {
                log::info!("Realtime channel disconnected");
                self.transport_failed(None)
            }
            (Connecting | Connected, ChannelInput::Transport(TransportEvent::Error(reason))) => {
                log::error!("Realtime transport error: {}", reason);
                self.transport_failed(Some(ChannelError::Transport(reason)))
            }

            (state, ChannelInput::Transport(event)) => {
                log::debug!("Ignoring transport event {:?} while {:?}", event, state);
                Vec::new()
            }
        }
    }

    fn transport_failed(&mut self, error: Option<ChannelError>) -> Vec<ChannelAction> {
        self.consecutive_failures += 1;

        let mut actions = vec![ChannelAction::CloseTransport];
        actions.extend(error.map(ChannelAction::Notify));

        if self.consecutive_failures < self.policy.max_attempts {
            self.state = ChannelState::Reconnecting;
            actions.push(ChannelAction::ScheduleRetry(
                self.policy.delay_for(self.consecutive_failures),
            ));
        } else {
            log::warn!(
                "Realtime channel giving up after {} consecutive failures",
                self.consecutive_failures
            );
            self.state = ChannelState::Exhausted;
            actions.push(ChannelAction::Notify(ChannelError::Exhausted {
                attempts: self.consecutive_failures,
            }));
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn frame(orders_per_minute: u32) -> TransportEvent {
        TransportEvent::Frame(
            format!(
                r#"{{"current_orders_per_minute": {}, "recent_orders": []}}"#,
                orders_per_minute
            )
            .into_bytes(),
        )
    }

    fn connected() -> ChannelMachine {
        let mut machine = ChannelMachine::new(RetryPolicy::default());
        machine.handle(ChannelInput::Connect);
        machine.handle(ChannelInput::Transport(TransportEvent::Opened));
        machine
    }

    #[test]
    fn connect_then_open_reaches_connected() {
        let mut machine = ChannelMachine::new(RetryPolicy::default());
        assert_eq!(machine.state(), ChannelState::Idle);

        assert_eq!(machine.handle(ChannelInput::Connect), vec![ChannelAction::OpenTransport]);
        assert_eq!(machine.state(), ChannelState::Connecting);

        assert!(machine.handle(ChannelInput::Transport(TransportEvent::Opened)).is_empty());
        assert_eq!(machine.state(), ChannelState::Connected);
    }

    #[test]
    fn connect_is_ignored_while_active() {
        let mut machine = connected();
        assert!(machine.handle(ChannelInput::Connect).is_empty());
        assert_eq!(machine.state(), ChannelState::Connected);
    }

    #[test]
    fn frames_are_delivered_and_malformed_ones_dropped() {
        let mut machine = connected();

        let actions = machine.handle(ChannelInput::Transport(frame(7)));
        match actions.as_slice() {
            [ChannelAction::Deliver(stats)] => assert_eq!(stats.orders_per_minute, dec!(7)),
            other => panic!("unexpected actions {:?}", other),
        }

        let actions = machine.handle(ChannelInput::Transport(TransportEvent::Frame(
            b"{broken".to_vec(),
        )));
        assert!(actions.is_empty());
        assert_eq!(machine.state(), ChannelState::Connected);
        assert_eq!(machine.consecutive_failures(), 0);
    }

    #[test]
    fn failures_schedule_retries_until_exhausted() {
        let mut machine = ChannelMachine::new(RetryPolicy::default());
        machine.handle(ChannelInput::Connect);

        for attempt in 1..DEFAULT_MAX_ATTEMPTS {
            let actions = machine.handle(ChannelInput::Transport(TransportEvent::Closed));
            assert_eq!(
                actions,
                vec![
                    ChannelAction::CloseTransport,
                    ChannelAction::ScheduleRetry(DEFAULT_RETRY_DELAY)
                ]
            );
            assert_eq!(machine.state(), ChannelState::Reconnecting);
            assert_eq!(machine.consecutive_failures(), attempt);

            assert_eq!(
                machine.handle(ChannelInput::RetryTimerFired),
                vec![ChannelAction::OpenTransport]
            );
        }

        let actions = machine.handle(ChannelInput::Transport(TransportEvent::Error(
            "refused".into(),
        )));
        assert_eq!(
            actions,
            vec![
                ChannelAction::CloseTransport,
                ChannelAction::Notify(ChannelError::Transport("refused".into())),
                ChannelAction::Notify(ChannelError::Exhausted { attempts: 5 }),
            ]
        );
        assert_eq!(machine.state(), ChannelState::Exhausted);

        // Nothing further happens on its own
        assert!(machine.handle(ChannelInput::RetryTimerFired).is_empty());
        assert!(machine.handle(ChannelInput::Transport(TransportEvent::Closed)).is_empty());
    }

    #[test]
    fn reconnect_after_exhaustion_resets_counter_on_open() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let mut machine = ChannelMachine::new(policy);
        machine.handle(ChannelInput::Connect);
        machine.handle(ChannelInput::Transport(TransportEvent::Closed));
        assert_eq!(machine.state(), ChannelState::Exhausted);

        assert_eq!(machine.handle(ChannelInput::Connect), vec![ChannelAction::OpenTransport]);
        assert_eq!(machine.consecutive_failures(), 1);
        machine.handle(ChannelInput::Transport(TransportEvent::Opened));
        assert_eq!(machine.consecutive_failures(), 0);
        assert_eq!(machine.state(), ChannelState::Connected);
    }

    #[test]
    fn disconnect_cancels_timer_before_closing_and_is_idempotent() {
        let mut machine = ChannelMachine::new(RetryPolicy::default());
        machine.handle(ChannelInput::Connect);
        machine.handle(ChannelInput::Transport(TransportEvent::Closed));
        assert_eq!(machine.state(), ChannelState::Reconnecting);

        assert_eq!(
            machine.handle(ChannelInput::Disconnect),
            vec![ChannelAction::CancelRetry, ChannelAction::CloseTransport]
        );
        assert_eq!(machine.state(), ChannelState::Closed);

        assert!(machine.handle(ChannelInput::Disconnect).is_empty());
        assert!(machine.handle(ChannelInput::RetryTimerFired).is_empty());
        assert_eq!(machine.state(), ChannelState::Closed);

        assert_eq!(machine.handle(ChannelInput::Connect), vec![ChannelAction::OpenTransport]);
    }

    #[test]
    fn exponential_backoff_doubles_up_to_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            delay: Duration::from_secs(5),
            backoff: Backoff::Exponential {
                max: Duration::from_secs(30),
            },
        };

        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(20));
        assert_eq!(policy.delay_for(4), Duration::from_secs(30));
        assert_eq!(RetryPolicy::default().delay_for(4), Duration::from_secs(5));
    }
}
