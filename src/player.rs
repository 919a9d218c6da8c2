//! Playback module
//!
//! This module provides the playback state machine and its transports:
//! - `PlaybackState`: Single source of truth for current track, queue, and flags
//! - `QueueNavigator`: Wraparound traversal over the queue
//! - `transport`: Local acknowledgment and remote device control backends
//! - `StateChange`: Event-driven notifications (replaces polling)

pub mod queue;
pub mod state;
pub mod transport;

pub use queue::{QueueNavigator, position_of};
pub use state::{
    PlaybackSnapshot, PlaybackState, StateChange, StateChangeReceiver, StateChangeSender,
    state_change_channel,
};
pub use transport::{LocalTransport, RemoteTransport, Transport};
