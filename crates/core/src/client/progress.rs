//! Synthetic progress for workers that do not report their own.

/// Advances a running worker's progress between events.
///
/// Implementations must never decrease `current` and must not move past
/// their ceiling on their own; only a terminal signal sets 100.
pub trait ProgressEstimator: Send + Sync {
    fn advance(&self, current: u8) -> u8;
}

/// Fixed increment per event, saturating at a ceiling
#[derive(Debug, Clone, Copy)]
pub struct LinearProgress {
    pub step: u8,
    pub ceiling: u8,
}

impl Default for LinearProgress {
    fn default() -> Self {
        Self {
            step: 5,
            ceiling: 90,
        }
    }
}

impl ProgressEstimator for LinearProgress {
    fn advance(&self, current: u8) -> u8 {
        if current >= self.ceiling {
            current
        } else {
            current.saturating_add(self.step).min(self.ceiling)
        }
    }
}

/// Covers a fixed fraction of the remaining distance to the ceiling, so
/// early events move the meter more than late ones
#[derive(Debug, Clone, Copy)]
pub struct EasedProgress {
    pub fraction: f64,
    pub ceiling: u8,
}

impl Default for EasedProgress {
    fn default() -> Self {
        Self {
            fraction: 0.25,
            ceiling: 90,
        }
    }
}

impl ProgressEstimator for EasedProgress {
    fn advance(&self, current: u8) -> u8 {
        if current >= self.ceiling {
            return current;
        }
        let remaining = f64::from(self.ceiling - current);
        let step = (remaining * self.fraction.clamp(0.0, 1.0)).ceil() as u8;
        current.saturating_add(step.max(1)).min(self.ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(estimator: &dyn ProgressEstimator, steps: usize) -> Vec<u8> {
        let mut value = 0;
        (0..steps)
            .map(|_| {
                value = estimator.advance(value);
                value
            })
            .collect()
    }

    #[test]
    fn test_linear_saturates_at_ceiling() {
        let values = walk(&LinearProgress::default(), 30);
        assert_eq!(values[0], 5);
        assert_eq!(*values.last().unwrap(), 90);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(LinearProgress::default().advance(100), 100);
    }

    #[test]
    fn test_eased_is_monotonic_and_capped() {
        let values = walk(&EasedProgress::default(), 40);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*values.last().unwrap(), 90);
        assert!(values[0] > values[1] - values[0]);
    }
}
