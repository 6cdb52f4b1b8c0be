/// Shortest interval the dispatcher accepts, in milliseconds.
pub const MIN_INTERVAL_MS: u16 = 1;

/// Interval actually used for a request; zero becomes [`MIN_INTERVAL_MS`].
pub const fn effective_interval_ms(interval_ms: u16) -> u16 {
    if interval_ms < MIN_INTERVAL_MS {
        MIN_INTERVAL_MS
    } else {
        interval_ms
    }
}

/// Overflow frequency in Hz for an interval in milliseconds.
pub fn interval_to_frequency(interval_ms: u16) -> f32 {
    1000.0 / effective_interval_ms(interval_ms) as f32
}
