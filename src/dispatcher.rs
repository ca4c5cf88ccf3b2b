// Dispatcher - the task the shd daemon runs once detached

use crate::daemon::{Shutdown, Task};
use crate::error::{Result, ShdError};
use std::time::Duration;
use tracing::info;

/// Default idle tick
const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Idles on a fixed tick until shutdown is requested
pub struct Dispatcher {
    tick: Duration,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self { tick: DEFAULT_TICK }
    }

    pub fn with_tick(tick: Duration) -> Self {
        Self { tick }
    }

    async fn idle(&self, shutdown: Shutdown) -> u64 {
        let mut interval = tokio::time::interval(self.tick);
        let mut ticks = 0;

        loop {
            interval.tick().await;
            if shutdown.is_requested() {
                return ticks;
            }
            ticks += 1;
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for Dispatcher {
    fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        info!("Starting dispatcher ...");

        // Built here, after detaching, so no runtime exists across fork
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| ShdError::Task(format!("Failed to build runtime: {}", e)))?;

        let ticks = runtime.block_on(self.idle(*shutdown));
        info!("Dispatcher stopped after {} ticks", ticks);

        Ok(())
    }
}
