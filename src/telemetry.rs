//! Telemetry utilities for command timing and span construction.

use std::time::Instant;

/// Records command latency when dropped.
pub struct CommandTimer {
    command: &'static str,
    start: Instant,
}

impl CommandTimer {
    pub fn new(command: &'static str) -> Self {
        Self {
            command,
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(self.command, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for a dispatched services command.
    pub fn command(name: &str, source: &str, target: &str) -> Span {
        info_span!("command", name = %name, source = %source, target = %target)
    }

    /// Span for one authentication round-trip.
    pub fn auth(alias: &str) -> Span {
        info_span!("auth", alias = %alias)
    }
}
