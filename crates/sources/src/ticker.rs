//! Restartable periodic task on the local event loop

use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Default)]
pub(crate) struct Ticker {
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Run `tick` now, then again after each delay it returns.
    ///
    /// Must be called from within a `LocalSet`. Does nothing if already
    /// running.
    pub fn start<F>(&mut self, mut tick: F)
    where
        F: FnMut() -> Duration + 'static,
    {
        if self.task.is_some() {
            return;
        }
        self.task = Some(tokio::task::spawn_local(async move {
            loop {
                let delay = tick();
                tokio::time::sleep(delay).await;
            }
        }));
    }

    /// Run `tick` now and then every `period`
    pub fn every<F>(&mut self, period: Duration, mut tick: F)
    where
        F: FnMut() + 'static,
    {
        self.start(move || {
            tick();
            period
        });
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
