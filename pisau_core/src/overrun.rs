//! Dwell-time accumulators for thermal and RPM overrun.

use crate::config::OverrunCfg;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Temperature,
    Rpm,
}

/// What a single update crossed. Several flags can be set when one large
/// `dt` passes both thresholds at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crossing {
    pub advisory: bool,
    pub throttle: bool,
    /// The metric fell back below threshold after an advisory.
    pub cleared: bool,
}

/// Continuous time a metric has spent at or above its threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrunAccumulator {
    metric: Metric,
    threshold: f64,
    elapsed: Duration,
    advised: bool,
    throttled: bool,
}

impl OverrunAccumulator {
    pub fn new(metric: Metric, threshold: f64) -> Self {
        Self {
            metric,
            threshold,
            elapsed: Duration::ZERO,
            advised: false,
            throttled: false,
        }
    }

    pub fn temperature(cfg: &OverrunCfg) -> Self {
        Self::new(Metric::Temperature, cfg.temp_threshold_c)
    }

    pub fn rpm(cfg: &OverrunCfg) -> Self {
        Self::new(Metric::Rpm, cfg.rpm_threshold)
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Advisory raised and not yet cleared.
    pub fn alerting(&self) -> bool {
        self.advised
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.advised = false;
        self.throttled = false;
    }

    pub fn update(&mut self, value: f64, dt: Duration, cfg: &OverrunCfg) -> Crossing {
        let mut out = Crossing::default();
        if value < self.threshold {
            out.cleared = self.advised;
            self.reset();
            return out;
        }
        self.elapsed += dt;
        if self.elapsed >= cfg.advisory_after && !self.advised {
            self.advised = true;
            out.advisory = true;
        }
        if self.elapsed >= cfg.throttle_after && !self.throttled {
            self.throttled = true;
            out.throttle = true;
        }
        out
    }
}
