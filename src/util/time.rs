//! Time utilities for game simulation

use std::time::Instant;

/// Server start time, the origin of the monotonic game clock
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

fn server_start() -> Instant {
    *SERVER_START.get_or_init(Instant::now)
}

/// Monotonic server time in seconds. All simulation timestamps use this clock.
pub fn server_secs() -> f64 {
    server_start().elapsed().as_secs_f64()
}

/// Convert a simulation timestamp (seconds) to the millisecond wire stamp
pub fn secs_to_millis(secs: f64) -> u64 {
    if secs <= 0.0 || !secs.is_finite() {
        0
    } else {
        (secs * 1000.0) as u64
    }
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 30; // 30 ticks per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SIMULATION_TPS as u64;

/// Calculate delta time for physics (in seconds)
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}
