//! Operator console with repeat suppression.
//!
//! Notable link transitions are reported through an optional sink (e.g. a GUI
//! console pane) and mirrored to `tracing`. Identical messages repeated within
//! the suppression window are emitted once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn, Level};

/// Receives every console line that passes the rate limiter
pub type ConsoleSink = Arc<dyn Fn(Level, &str) + Send + Sync>;

/// Default window for suppressing repeated identical messages
pub const DEFAULT_REPEAT_WINDOW: Duration = Duration::from_secs(5);

pub struct Console {
    sink: Option<ConsoleSink>,
    window: Duration,
    last_emitted: HashMap<String, Instant>,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("window", &self.window)
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new(None, DEFAULT_REPEAT_WINDOW)
    }
}

impl Console {
    pub fn new(sink: Option<ConsoleSink>, window: Duration) -> Self {
        Self {
            sink,
            window,
            last_emitted: HashMap::new(),
        }
    }

    /// Emit unconditionally
    pub fn log(&mut self, level: Level, message: &str) {
        match level {
            Level::ERROR => error!("{}", message),
            Level::WARN => warn!("{}", message),
            Level::INFO => info!("{}", message),
            _ => debug!("{}", message),
        }
        if let Some(sink) = &self.sink {
            sink(level, message);
        }
    }

    /// Emit unless the same message was emitted within the window
    ///
    /// Returns whether the message was emitted.
    pub fn log_limited(&mut self, level: Level, message: &str) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_emitted.get(message) {
            if now.duration_since(*last) < self.window {
                return false;
            }
        }
        self.last_emitted.insert(message.to_string(), now);
        self.log(level, message);
        true
    }
}
