//! Worker idle backoff

use std::time::Duration;

use crate::config::BackoffConfig;

/// Sleep length for consecutive empty polls
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current: u64,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current: config.initial,
            config,
        }
    }

    /// Current step in units
    pub fn current(&self) -> u64 {
        self.current
    }

    /// Back to the initial step after a message was processed
    pub fn reset(&mut self) {
        self.current = self.config.initial;
    }

    /// Sleep for the current step, then grow it
    pub fn wait(&mut self) {
        std::thread::sleep(self.next_delay());
    }

    /// Current delay; advances the step for the next call
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.config.unit * u32::try_from(self.current).unwrap_or(u32::MAX);
        if self.current < self.config.max {
            self.current = (self.current + self.config.step).min(self.config.max);
        }
        delay
    }
}
