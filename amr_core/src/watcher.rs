//! Hosted stand-in for the encoder interrupt context.
//!
//! An `EdgeWatcher` owns one wheel's `EdgeSource` and that wheel's
//! `QuadratureDecoder` on a dedicated thread: it blocks for the next
//! secondary-channel edge and applies the decoder, nothing else. The first
//! non-timeout error ends the thread and is reported through `take_fault`.
//! A thread that ended any other way (a panicking source) shows up as
//! `is_running() == false` with no fault.
//!
//! Each watcher spawns exactly one thread, signalled and joined on drop.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use amr_traits::EdgeSource;

use crate::encoder::{QuadratureDecoder, WheelSide};
use crate::error::DriveError;
use crate::hw_error::map_boxed;

pub struct EdgeWatcher {
    side: WheelSide,
    edges: Arc<AtomicU64>,
    faults: xch::Receiver<DriveError>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl EdgeWatcher {
    /// `poll_timeout` bounds how long one wait may block, and therefore how
    /// long `Drop` may wait for the thread. Fails with
    /// `DriveError::HardwareFault` if the thread cannot be started.
    pub fn spawn<E: EdgeSource + Send + 'static>(
        mut source: E,
        decoder: QuadratureDecoder,
        poll_timeout: Duration,
    ) -> Result<Self, DriveError> {
        let side = decoder.side();
        let (tx, faults) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let edges = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&edges);

        let join_handle = std::thread::Builder::new()
            .name(format!("edges-{side}"))
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    match source.wait_edge(poll_timeout) {
                        Ok(Some(levels)) => {
                            decoder.on_edge(levels);
                            seen.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(None) => {}
                        Err(e) => match map_boxed(e.as_ref()) {
                            DriveError::Timeout => {}
                            fault => {
                                tracing::warn!(wheel = %side, error = %fault, "edge source failed");
                                // Capacity 1 and this is the only send, so it cannot be full.
                                let _ = tx.try_send(fault);
                                break;
                            }
                        },
                    }
                }
                tracing::trace!(wheel = %side, "edge watcher exiting");
            });

        let join_handle = join_handle.map_err(|e| {
            tracing::error!(wheel = %side, error = %e, "failed to spawn edge watcher");
            DriveError::HardwareFault(format!("{side} edge watcher did not start: {e}"))
        })?;

        Ok(Self {
            side,
            edges,
            faults,
            shutdown,
            join_handle: Some(join_handle),
        })
    }

    pub fn side(&self) -> WheelSide {
        self.side
    }

    /// Edges decoded so far.
    pub fn edges_seen(&self) -> u64 {
        self.edges.load(Ordering::Relaxed)
    }

    /// The fault that stopped the watcher, if any. Returned once.
    pub fn take_fault(&self) -> Option<DriveError> {
        self.faults.try_recv().ok()
    }

    /// `false` once the thread has exited, for whatever reason.
    pub fn is_running(&self) -> bool {
        self.join_handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for EdgeWatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Worst case waits out one `poll_timeout`.
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(wheel = %self.side, ?e, "edge watcher panicked during shutdown");
        }
    }
}
