//! Synthetic upload progress.
//!
//! The value reported here is cosmetic: it climbs on a timer and is not tied
//! to bytes on the wire. It never gates a request or its outcome.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::watch, task::JoinHandle};
use tracing::debug;

pub const DEFAULT_PROGRESS_STEP: u8 = 10;
pub const DEFAULT_PROGRESS_TICK: Duration = Duration::from_millis(200);
const MIN_PROGRESS_TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSettings {
    pub step: u8,
    pub tick: Duration,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            step: DEFAULT_PROGRESS_STEP,
            tick: DEFAULT_PROGRESS_TICK,
        }
    }
}

/// Timer-driven progress value in percent. Always synthetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyntheticProgress {
    pub percent: u8,
    pub complete: bool,
}

pub struct UploadProgressSimulator {
    settings: ProgressSettings,
    tx: watch::Sender<SyntheticProgress>,
    run: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl UploadProgressSimulator {
    pub fn new(settings: ProgressSettings) -> Self {
        let (tx, _) = watch::channel(SyntheticProgress::default());
        Self {
            settings,
            tx,
            run: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    /// Restarts the simulation from zero, cancelling any run still ticking.
    /// Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        self.stop_task();
        let run = self.run.fetch_add(1, Ordering::SeqCst) + 1;
        self.tx.send_replace(SyntheticProgress::default());

        let tx = self.tx.clone();
        let current_run = Arc::clone(&self.run);
        let ProgressSettings { step, tick } = self.settings;
        let step = step.max(1);
        let tick = tick.max(MIN_PROGRESS_TICK);
        debug!(run, "progress: simulation started");

        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            // The first tick of a tokio interval fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut finished = false;
                tx.send_if_modified(|progress| {
                    if current_run.load(Ordering::SeqCst) != run {
                        finished = true;
                        return false;
                    }
                    progress.percent = progress.percent.saturating_add(step).min(100);
                    if progress.percent == 100 {
                        progress.complete = true;
                        finished = true;
                    }
                    true
                });
                if finished {
                    debug!(run, "progress: simulation finished");
                    break;
                }
            }
        }));
    }

    /// Stops ticking and keeps the last reported value.
    pub fn cancel(&mut self) {
        self.run.fetch_add(1, Ordering::SeqCst);
        self.stop_task();
    }

    pub fn current(&self) -> SyntheticProgress {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyntheticProgress> {
        self.tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn stop_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Default for UploadProgressSimulator {
    fn default() -> Self {
        Self::new(ProgressSettings::default())
    }
}

impl Drop for UploadProgressSimulator {
    fn drop(&mut self) {
        self.stop_task();
    }
}

#[cfg(test)]
#[path = "tests/progress_tests.rs"]
mod tests;
