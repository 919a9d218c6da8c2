//! Queue navigation - single source of truth for index calculations
//!
//! All code that needs to determine which track comes next or previous
//! goes through this module. Traversal is ordered wraparound; the shuffle
//! flag never changes it (shuffle is forwarded to the remote transport,
//! and local next-then-previous must return to the starting track).

use crate::api::Track;
use crate::features::RepeatMode;

/// Locate a track in the queue by id
pub fn position_of(queue: &[Track], id: &str) -> Option<usize> {
    queue.iter().position(|t| t.id == id)
}

/// Computes next/prev indices over a queue snapshot
pub struct QueueNavigator {
    queue_len: usize,
    current_idx: usize,
}

impl QueueNavigator {
    pub fn new(queue_len: usize, current_idx: Option<usize>) -> Self {
        Self {
            queue_len,
            current_idx: current_idx.unwrap_or(0),
        }
    }

    /// Next track index with wraparound
    pub fn next_index(&self) -> Option<usize> {
        if self.queue_len == 0 {
            return None;
        }
        Some((self.current_idx + 1) % self.queue_len)
    }

    /// Previous track index with wraparound
    pub fn prev_index(&self) -> Option<usize> {
        if self.queue_len == 0 {
            return None;
        }
        Some((self.current_idx + self.queue_len - 1) % self.queue_len)
    }

    /// Index to play when the current track finishes on its own.
    /// Repeat-one replays the same index; manual skips never come here.
    pub fn ended_index(&self, repeat: RepeatMode) -> Option<usize> {
        if self.queue_len == 0 {
            return None;
        }
        match repeat {
            RepeatMode::One => Some(self.current_idx),
            RepeatMode::Off | RepeatMode::All => self.next_index(),
        }
    }
}
