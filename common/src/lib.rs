pub mod config;
pub mod util;

/// fio reports latency in nanoseconds, the history is read in microseconds
pub const NS_PER_US: f64 = 1000.0;
