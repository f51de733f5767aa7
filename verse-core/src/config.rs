//! Core tuning: delivery policy and content sizing. Hosts fill these from their own config.

use std::time::Duration;

use crate::chunk::{DEFAULT_PACKET_LENGTH, DEFAULT_VERSE_BATCH};
use crate::verse::DEFAULT_CACHE_CHAPTERS;

/// Default attempts per packet before its queue is abandoned.
pub const DEFAULT_MAX_TRIES: u32 = 3;
/// Default pause between consecutive packets of one queue.
pub const DEFAULT_INTER_MESSAGE_DELAY: Duration = Duration::from_millis(100);
/// Default pause before retrying a failed packet.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(3000);

/// Retry and pacing rules for delivery queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Total attempts per packet, first attempt included.
    pub max_tries: u32,
    pub inter_message_delay: Duration,
    pub retry_delay: Duration,
    /// Queue a best-effort error packet for the token when a queue is abandoned.
    pub notify_on_exhaustion: bool,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            inter_message_delay: DEFAULT_INTER_MESSAGE_DELAY,
            retry_delay: DEFAULT_RETRY_DELAY,
            notify_on_exhaustion: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub delivery: DeliveryPolicy,
    /// Characters per viewer packet.
    pub packet_length: usize,
    /// Verses per batch name.
    pub verse_batch: u32,
    /// Chapters kept in the verse cache.
    pub cache_chapters: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delivery: DeliveryPolicy::default(),
            packet_length: DEFAULT_PACKET_LENGTH,
            verse_batch: DEFAULT_VERSE_BATCH,
            cache_chapters: DEFAULT_CACHE_CHAPTERS,
        }
    }
}
