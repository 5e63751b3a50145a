//! The acquire → detect → publish loop.
//!
//! Runs [`AppContext::run_cycle`] on a fixed interval until cancelled (or once,
//! for `--once`). Failed cycles never touch the published files; the loop
//! just waits and tries again.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::context::{AppContext, CycleError, CycleOutcome};
use crate::config::defaults::PROGRESS_LOG_EVERY;
use crate::config::PollConfig;

/// Counters accumulated over the life of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub cycles: u64,
    pub publishes: u64,
    pub empty_cycles: u64,
    pub faces_seen: u64,
    pub known_seen: u64,
    pub acquisition_failures: u64,
    pub detection_failures: u64,
    pub publish_failures: u64,
}

impl PollStats {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        if outcome.published {
            self.publishes += 1;
        }
        if outcome.faces == 0 {
            self.empty_cycles += 1;
        }
        self.faces_seen += outcome.faces as u64;
        self.known_seen += outcome.known as u64;
    }

    fn record_failure(&mut self, error: &CycleError) {
        self.cycles += 1;
        match error {
            CycleError::Acquisition(_) => self.acquisition_failures += 1,
            CycleError::Detection(_) | CycleError::Record(_) => self.detection_failures += 1,
            CycleError::Publish(_) => self.publish_failures += 1,
        }
    }

    pub fn failures(&self) -> u64 {
        self.acquisition_failures + self.detection_failures + self.publish_failures
    }
}

/// Owns the context for the duration of the run.
pub struct PollLoop {
    context: AppContext,
    interval: Duration,
    retry_delay: Duration,
    cancel: CancellationToken,
    once: bool,
}

impl PollLoop {
    pub fn new(context: AppContext, poll: &PollConfig, cancel: CancellationToken) -> Self {
        Self {
            context,
            interval: Duration::from_millis(poll.interval_ms),
            retry_delay: Duration::from_millis(poll.retry_delay_ms),
            cancel,
            once: false,
        }
    }

    /// Stop after the first cycle, whatever its outcome.
    #[must_use]
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Run until cancelled. The camera is released before returning.
    pub async fn run(mut self) -> PollStats {
        let mut stats = PollStats::default();

        info!(
            camera = self.context.camera_name(),
            detector = self.context.detector_name(),
            known_faces = self.context.gallery().len(),
            "📷 Polling every {} ms",
            self.interval.as_millis()
        );

        while !self.cancel.is_cancelled() {
            let delay = match self.context.run_cycle() {
                Ok(outcome) => {
                    stats.record(&outcome);
                    self.interval
                }
                Err(e) => {
                    stats.record_failure(&e);
                    match e {
                        CycleError::Publish(_) => {
                            warn!(error = %e, "Publish failed; previous output left in place");
                            self.interval
                        }
                        _ => {
                            warn!(error = %e, "Cycle skipped");
                            self.retry_delay
                        }
                    }
                }
            };

            if stats.cycles % PROGRESS_LOG_EVERY == 0 {
                info!(
                    "📈 Progress: {} cycles | Faces: {} ({} known) | Failures: {}",
                    stats.cycles,
                    stats.faces_seen,
                    stats.known_seen,
                    stats.failures()
                );
            }

            if self.once {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.context.release_camera();
        log_final_stats(&stats);
        stats
    }
}

fn log_final_stats(stats: &PollStats) {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("📊 FINAL STATISTICS");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Cycles:               {}", stats.cycles);
    info!("   Envelopes Published:  {}", stats.publishes);
    info!("   Empty Cycles:         {}", stats.empty_cycles);
    info!("   Faces Seen:           {} ({} known)", stats.faces_seen, stats.known_seen);
    info!("   Acquisition Failures: {}", stats.acquisition_failures);
    info!("   Detection Failures:   {}", stats.detection_failures);
    info!("   Publish Failures:     {}", stats.publish_failures);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
