use std::time::Duration;

use rand::Rng;

/// Picks one template out of a non-empty set.
pub trait TemplateChooser: Send + Sync {
    /// Returns an index in `0..count`. `count` is never zero.
    fn choose(&self, count: usize) -> usize;
}

/// Uniform random choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomChooser;

impl TemplateChooser for RandomChooser {
    fn choose(&self, count: usize) -> usize {
        rand::rng().random_range(0..count)
    }
}

/// Always the same index, clamped to the set size.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedChooser(pub usize);

impl TemplateChooser for FixedChooser {
    fn choose(&self, count: usize) -> usize {
        self.0.min(count.saturating_sub(1))
    }
}

/// Decides how long a generation request stays pending.
pub trait LatencySimulator: Send + Sync {
    fn delay(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct RandomLatency {
    min: Duration,
    max: Duration,
}

impl RandomLatency {
    pub fn new(min: Duration, max: Duration) -> Self {
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }
}

impl Default for RandomLatency {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000), Duration::from_millis(4000))
    }
}

impl LatencySimulator for RandomLatency {
    fn delay(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::rng().random_range(self.min..=self.max)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoLatency;

impl LatencySimulator for NoLatency {
    fn delay(&self) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_chooser_clamps_to_set() {
        assert_eq!(FixedChooser(0).choose(2), 0);
        assert_eq!(FixedChooser(1).choose(2), 1);
        assert_eq!(FixedChooser(5).choose(1), 0);
    }

    #[test]
    fn random_chooser_stays_in_range() {
        for _ in 0..100 {
            assert!(RandomChooser.choose(3) < 3);
        }
    }

    #[test]
    fn random_latency_stays_in_window() {
        let latency = RandomLatency::new(Duration::from_millis(50), Duration::from_millis(10));
        for _ in 0..100 {
            let delay = latency.delay();
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(50));
        }
    }
}
