//! Shared constants for the delivery engine

use std::time::Duration;

/// Connect attempts made for a client stream before it is abandoned
pub const DEFAULT_RECONNECT_ATTEMPTS: u8 = 3;

/// Delay before the first reconnect attempt; doubles per failure
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(250);

/// Upper bound on the reconnect delay, as a multiple of the base delay
pub const MAX_BACKOFF_FACTOR: u32 = 8;

/// How long shutdown waits for streams to flush queued lines
pub const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// Widest section in display columns; larger width rules are clamped
pub const MAX_SECTION_WIDTH: i64 = u16::MAX as i64;

/// Weight given to sections absent from the configured order
pub const UNLISTED_WEIGHT: usize = usize::MAX;
