use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

use crate::errors::Error;

/// Strategy for adding randomness to delay calculations.
#[derive(Clone, Copy, Debug)]
pub enum JitterStrategy {
    None,
    Full,
    Decorrelated,
}

/// How the delay grows between consecutive attempts.
#[derive(Clone, Copy, Debug)]
pub enum BackoffGrowth {
    /// `step * attempt`
    Linear,
    /// `step * multiplier^(attempt - 1)`
    Exponential(f32),
}

/// Shared retry/backoff configuration for backend-bound HTTP operations.
#[derive(Clone, Debug)]
pub struct RetryPlan {
    pub max_attempts: u8,
    pub step: Duration,
    pub growth: BackoffGrowth,
    pub max_delay: Duration,
    pub jitter: JitterStrategy,
}

impl RetryPlan {
    pub fn new(
        max_attempts: u8,
        step: Duration,
        growth: BackoffGrowth,
        max_delay: Duration,
        jitter: JitterStrategy,
    ) -> Self {
        Self {
            max_attempts,
            step,
            growth,
            max_delay,
            jitter,
        }
    }

    /// Three attempts, waiting `1s * attempt` after each transport failure.
    pub fn health_check() -> Self {
        Self {
            max_attempts: 3,
            step: Duration::from_millis(1_000),
            growth: BackoffGrowth::Linear,
            max_delay: Duration::from_secs(10),
            jitter: JitterStrategy::None,
        }
    }

    pub fn with_max_attempts(&self, max_attempts: u8) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self.clone()
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u8, rng: &mut impl Rng) -> Duration {
        let delay = self.base_delay(attempt.max(1));
        match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => delay.mul_f64(rng.gen_range(0.0..1.0)),
            JitterStrategy::Decorrelated => delay.mul_f64(rng.gen_range(0.5..1.5)),
        }
    }

    /// Upper bound of the total backoff sleeps across a full attempt budget.
    pub fn max_total_backoff(&self) -> Duration {
        let factor = match self.jitter {
            JitterStrategy::Decorrelated => 1.5,
            JitterStrategy::None | JitterStrategy::Full => 1.0,
        };
        (1..self.max_attempts)
            .map(|attempt| self.base_delay(attempt).mul_f64(factor))
            .sum()
    }

    fn base_delay(&self, attempt: u8) -> Duration {
        let base = match self.growth {
            BackoffGrowth::Linear => self.step.saturating_mul(attempt as u32),
            BackoffGrowth::Exponential(multiplier) => {
                let exp = multiplier.powi((attempt as i32) - 1) as f64;
                self.step.mul_f64(exp)
            }
        };
        base.min(self.max_delay)
    }
}

impl Default for RetryPlan {
    fn default() -> Self {
        Self::health_check()
    }
}

impl FromStr for JitterStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(JitterStrategy::None),
            "full" => Ok(JitterStrategy::Full),
            "decorrelated" => Ok(JitterStrategy::Decorrelated),
            other => Err(Error::Config(format!(
                "Unknown jitter strategy '{}'; expected 'none', 'full' or 'decorrelated'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn linear_plan_waits_step_times_attempt() {
        let plan = RetryPlan::health_check();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(plan.delay_for_attempt(1, &mut rng), Duration::from_secs(1));
        assert_eq!(plan.delay_for_attempt(2, &mut rng), Duration::from_secs(2));
        assert_eq!(plan.max_total_backoff(), Duration::from_secs(3));
    }

    #[test]
    fn exponential_plan_respects_cap() {
        let plan = RetryPlan::new(
            5,
            Duration::from_millis(10),
            BackoffGrowth::Exponential(2.0),
            Duration::from_millis(40),
            JitterStrategy::None,
        );
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(plan.delay_for_attempt(2, &mut rng), Duration::from_millis(20));
        assert_eq!(plan.delay_for_attempt(4, &mut rng), Duration::from_millis(40));
    }

    #[test]
    fn unknown_jitter_is_rejected() {
        assert!("sideways".parse::<JitterStrategy>().is_err());
        assert!(matches!(
            "Decorrelated".parse::<JitterStrategy>(),
            Ok(JitterStrategy::Decorrelated)
        ));
    }
}
