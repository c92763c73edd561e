use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Poll delays in seconds for a watched thread, from most to least eager.
pub const WATCH_TIMEOUTS: [u64; 13] = [10, 15, 20, 30, 60, 90, 120, 180, 240, 300, 600, 1800, 3600];

/// Adaptive poll schedule for a watched thread.
///
/// Every load feeds the resulting post count back in; new posts snap the
/// schedule back to the most eager delay, an unchanged count advances one
/// step towards the slowest.
#[derive(Debug)]
pub struct BackoffSchedule {
    /// Index into [`WATCH_TIMEOUTS`]; -1 until the first load completes.
    tier: i32,
    last_post_count: usize,
}

impl BackoffSchedule {
    pub fn new() -> Self {
        Self {
            tier: -1,
            last_post_count: 0,
        }
    }

    /// Feed the post count of the latest load and get the delay until the
    /// next one, in seconds.
    pub fn next_delay(&mut self, post_count: usize) -> u64 {
        if self.tier < 0 || post_count > self.last_post_count {
            self.tier = 0;
        } else {
            self.tier = (self.tier + 1).min(WATCH_TIMEOUTS.len() as i32 - 1);
        }

        self.last_post_count = post_count;

        WATCH_TIMEOUTS[self.tier as usize]
    }

    /// The delay chosen by the last [`next_delay`](Self::next_delay) call.
    pub fn current_delay(&self) -> Option<u64> {
        (self.tier >= 0).then(|| WATCH_TIMEOUTS[self.tier as usize])
    }

    /// Forget the schedule; the next load starts from the most eager delay.
    pub fn reset(&mut self) {
        self.tier = -1;
        self.last_post_count = 0;
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancelable single-shot timer backed by a parked thread.
pub struct WatchTimer {
    cancel_tx: mpsc::Sender<()>,
}

impl WatchTimer {
    /// Run `on_fire` on the timer thread after `delay`, unless cancelled first.
    pub fn start(delay: Duration, on_fire: impl FnOnce() + Send + 'static) -> Self {
        let (cancel_tx, cancel_rx) = mpsc::channel();

        thread::spawn(move || {
            if let Err(mpsc::RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(delay) {
                on_fire();
            }
        });

        Self { cancel_tx }
    }

    /// Idempotent; cancelling a timer that already fired is a no-op.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(());
    }
}

impl Drop for WatchTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
