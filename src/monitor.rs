// Peak memory sampler.
//
// A background thread polls a probe at a fixed interval and keeps the
// largest value seen in an atomic. Hashing, diffing and restoring never
// touch it; it exists so the CLI can report peak RSS.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background sampler tracking the maximum value returned by a probe.
///
/// Dropping the sampler stops it.
pub struct PeakSampler {
    peak: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeakSampler {
    /// Start sampling `probe` every `interval`. A probe returning `None`
    /// is skipped for that round.
    pub fn start<P>(interval: Duration, mut probe: P) -> Self
    where
        P: FnMut() -> Option<u64> + Send + 'static,
    {
        let peak = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let peak = Arc::clone(&peak);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("peak-sampler".into())
                .spawn(move || {
                    while running.load(Ordering::Relaxed) {
                        if let Some(v) = probe() {
                            peak.fetch_max(v, Ordering::Relaxed);
                        }
                        thread::park_timeout(interval);
                    }
                })
                .ok()
        };
        if handle.is_none() {
            log::warn!("could not start memory sampler thread");
        }

        Self {
            peak,
            running,
            handle,
        }
    }

    /// Largest value observed so far.
    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Relaxed)
    }

    /// Stop the thread and return the final peak.
    pub fn stop(mut self) -> u64 {
        self.shutdown();
        self.peak()
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for PeakSampler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Resident set size of the current process, in bytes.
#[cfg(feature = "rss")]
pub fn rss_probe() -> impl FnMut() -> Option<u64> + Send + 'static {
    use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

    let pid = sysinfo::get_current_pid().ok();
    let mut sys = System::new();
    move || {
        let pid = pid?;
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        sys.process(pid).map(|p| p.memory())
    }
}
