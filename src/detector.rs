use crate::calibration::CalibrationProfile;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionEdge {
    None,
    Rising,
}

/// Open episode, if any. `activated_at` is node uptime at the rising edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EpisodeState {
    pub active: bool,
    pub activated_at: Duration,
}

/// Edge-triggered threshold detector.
///
/// A crossing opens an episode and yields exactly one `Rising` edge; the
/// episode stays open for `dwell` regardless of how long or how far the
/// signal stays above threshold.
pub struct MotionDetector {
    profile: CalibrationProfile,
    dwell: Duration,
    episode: EpisodeState,
    episodes: u64,
}

impl MotionDetector {
    pub fn new(profile: CalibrationProfile, dwell: Duration) -> Self {
        Self {
            profile,
            dwell,
            episode: EpisodeState::default(),
            episodes: 0,
        }
    }

    pub fn evaluate(&mut self, magnitude: f64, now: Duration) -> MotionEdge {
        if !self.episode.active {
            if self.profile.exceeds(magnitude) {
                self.episode = EpisodeState {
                    active: true,
                    activated_at: now,
                };
                self.episodes += 1;
                log::info!(
                    "Motion detected (magnitude {:.4} > threshold {:.4})",
                    magnitude,
                    self.profile.threshold
                );
                return MotionEdge::Rising;
            }
        } else {
            self.expire(now);
        }

        MotionEdge::None
    }

    /// Close the open episode once its dwell has elapsed. Called on its own
    /// when a tick has no sample.
    pub fn expire(&mut self, now: Duration) {
        if self.episode.active && now.saturating_sub(self.episode.activated_at) >= self.dwell {
            self.episode.active = false;
            log::debug!("Episode closed after {:?}", now - self.episode.activated_at);
        }
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    pub fn episode(&self) -> EpisodeState {
        self.episode
    }

    /// Episodes opened since startup
    pub fn episodes(&self) -> u64 {
        self.episodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_profile() -> CalibrationProfile {
        CalibrationProfile::from_samples(&[1.0; 100], 5.0).unwrap()
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_single_edge_for_sustained_exceedance() {
        let mut detector = MotionDetector::new(flat_profile(), ms(3000));

        let mut rising = 0;
        for tick in 0..25u64 {
            if detector.evaluate(10.0 + tick as f64, ms(tick * 100)) == MotionEdge::Rising {
                rising += 1;
            }
        }

        assert_eq!(rising, 1);
        assert!(detector.episode().active);
        assert_eq!(detector.episode().activated_at, ms(0));
    }

    #[test]
    fn test_rearms_after_dwell() {
        let mut detector = MotionDetector::new(flat_profile(), ms(3000));

        assert_eq!(detector.evaluate(10.0, ms(0)), MotionEdge::Rising);
        assert_eq!(detector.evaluate(10.0, ms(2900)), MotionEdge::None);
        // Dwell elapses: the episode closes on this tick without an edge
        assert_eq!(detector.evaluate(10.0, ms(3000)), MotionEdge::None);
        assert!(!detector.episode().active);
        assert_eq!(detector.evaluate(10.0, ms(3100)), MotionEdge::Rising);
        assert_eq!(detector.episodes(), 2);
    }

    #[test]
    fn test_sub_threshold_noise_never_triggers() {
        let profile = CalibrationProfile::from_samples(&[0.9, 1.0, 1.1], 5.0).unwrap();
        let mut detector = MotionDetector::new(profile, ms(3000));

        for tick in 0..1000u64 {
            let m = 1.0 + ((tick as f64) * 0.37).sin() * 0.5;
            assert_eq!(detector.evaluate(m, ms(tick * 100)), MotionEdge::None);
        }
        assert_eq!(detector.episodes(), 0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut detector = MotionDetector::new(flat_profile(), ms(3000));
        assert_eq!(detector.evaluate(1.0, ms(0)), MotionEdge::None);
        assert_eq!(detector.evaluate(1.0 + 1e-9, ms(100)), MotionEdge::Rising);
    }

    #[test]
    fn test_quiet_ticks_close_episode() {
        let mut detector = MotionDetector::new(flat_profile(), ms(3000));
        detector.evaluate(10.0, ms(500));
        for t in (600..3500).step_by(100) {
            detector.evaluate(1.0, ms(t));
        }
        assert!(detector.episode().active);
        detector.evaluate(1.0, ms(3500));
        assert!(!detector.episode().active);
    }

    #[test]
    fn test_expire_without_sample() {
        let mut detector = MotionDetector::new(flat_profile(), ms(3000));
        detector.evaluate(10.0, ms(0));

        detector.expire(ms(2999));
        assert!(detector.episode().active);
        detector.expire(ms(3000));
        assert!(!detector.episode().active);

        assert_eq!(detector.evaluate(10.0, ms(3100)), MotionEdge::Rising);
    }
}
