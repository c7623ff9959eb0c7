// src/application/realtime/mod.rs
// Self-healing realtime update channel

pub mod channel;
pub mod machine;

pub use channel::{ChannelStatus, ChannelUpdate, RealtimeChannel, RealtimeHandler};
pub use machine::{Backoff, ChannelState, RetryPolicy};
