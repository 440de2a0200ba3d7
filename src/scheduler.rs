use crate::detector::{MotionDetector, MotionEdge};
use crate::indicator::{IndicatorController, IndicatorPin, IndicatorTick};
use crate::notify::{DispatchReport, MotionNotifier};
use crate::sensors::AccelerationSource;
use crate::status::{current_timestamp, NodeStatus};
use std::path::PathBuf;
use tokio::time::{sleep, Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub struct LoopTiming {
    pub poll_interval: Duration,
    pub guard_delay: Duration,
    pub status_interval: Duration,
}

/// What happened during one pass of the loop
#[derive(Debug)]
pub struct TickReport {
    /// Node uptime read at the start of the pass
    pub now: Duration,
    /// None when the sensor read failed
    pub magnitude: Option<f64>,
    pub edge: MotionEdge,
    pub dispatch: Option<DispatchReport>,
    pub indicator: IndicatorTick,
}

/// Single-threaded cooperative polling loop.
///
/// Owns every piece of mutable node state. Collaborator calls are awaited
/// inline, so a slow request delays the next pass.
pub struct Scheduler<A, P: IndicatorPin, D> {
    source: A,
    detector: MotionDetector,
    indicator: IndicatorController<P>,
    notifier: D,
    timing: LoopTiming,
    started: Instant,
    status: NodeStatus,
    status_file: Option<PathBuf>,
    last_status_save: Option<Instant>,
}

impl<A, P, D> Scheduler<A, P, D>
where
    A: AccelerationSource,
    P: IndicatorPin,
    D: MotionNotifier,
{
    pub fn new(
        source: A,
        detector: MotionDetector,
        indicator: IndicatorController<P>,
        notifier: D,
        timing: LoopTiming,
    ) -> Self {
        let status = NodeStatus::new(detector.profile());
        Self {
            source,
            detector,
            indicator,
            notifier,
            timing,
            started: Instant::now(),
            status,
            status_file: None,
            last_status_save: None,
        }
    }

    pub fn with_status_file(mut self, path: PathBuf) -> Self {
        self.status_file = Some(path);
        self
    }

    /// Record the association result for status snapshots
    pub fn set_link_up(&mut self, up: bool) {
        self.status.link_up = up;
    }

    /// time -> sample -> detector -> (indicator on, dispatch, guard) -> indicator tick
    pub async fn tick(&mut self) -> TickReport {
        let now = self.started.elapsed();

        let magnitude = match self.source.read_magnitude() {
            Ok(m) => {
                self.status.samples += 1;
                Some(m)
            }
            Err(e) => {
                self.status.sensor_errors += 1;
                log::warn!("Sensor read failed, skipping detection this tick: {}", e);
                None
            }
        };

        let edge = match magnitude {
            Some(m) => self.detector.evaluate(m, now),
            None => {
                self.detector.expire(now);
                MotionEdge::None
            }
        };

        let dispatch = if edge == MotionEdge::Rising {
            self.indicator.activate(now);
            let report = self.notifier.on_motion_rising().await;
            self.status.record_dispatch(&report);
            sleep(self.timing.guard_delay).await;
            Some(report)
        } else {
            None
        };

        let indicator = self.indicator.tick(now);

        self.status.episodes = self.detector.episodes();
        self.status.indicator_on = self.indicator.is_on();

        TickReport {
            now,
            magnitude,
            edge,
            dispatch,
            indicator,
        }
    }

    /// Run forever, or until `limit` of uptime has passed
    pub async fn run(&mut self, limit: Option<Duration>) {
        log::info!(
            "Monitoring (poll {} ms, threshold {:.4})",
            self.timing.poll_interval.as_millis(),
            self.detector.profile().threshold
        );

        loop {
            if let Some(limit) = limit {
                if self.started.elapsed() >= limit {
                    log::info!("Run duration reached, stopping");
                    break;
                }
            }

            self.tick().await;
            self.save_status_if_due();
            sleep(self.timing.poll_interval).await;
        }

        self.save_status();
    }

    fn save_status_if_due(&mut self) {
        let due = self
            .last_status_save
            .map(|t| t.elapsed() >= self.timing.status_interval)
            .unwrap_or(true);
        if due {
            self.save_status();
        }
    }

    fn save_status(&mut self) {
        let Some(path) = self.status_file.as_ref() else {
            return;
        };
        self.status.timestamp = current_timestamp();
        self.status.uptime_seconds = self.started.elapsed().as_secs();
        if let Err(e) = self.status.save(path) {
            log::warn!("Failed to write status to {}: {}", path.display(), e);
        }
        self.last_status_save = Some(Instant::now());
    }

    pub fn status(&self) -> &NodeStatus {
        &self.status
    }

    pub fn detector(&self) -> &MotionDetector {
        &self.detector
    }

    pub fn indicator(&self) -> &IndicatorController<P> {
        &self.indicator
    }

    pub fn notifier(&self) -> &D {
        &self.notifier
    }

    pub fn source_mut(&mut self) -> &mut A {
        &mut self.source
    }
}
