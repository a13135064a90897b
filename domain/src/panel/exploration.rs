//! Sampling policy for the reasoning oracle
//!
//! Normal turns run at a low, fixed temperature. When the panel repeats
//! itself, the next turn gets a randomized higher temperature and one
//! persona-emphasis hint.

use super::persona::{PersonaHint, choose_hint};
use rand::Rng;

/// Temperature for ordinary turns
pub const BASE_TEMPERATURE: f64 = 0.1;

/// Width of the randomized band added on top of the base when exploring
pub const EXPLORATION_SPREAD: f64 = 0.4;

/// Upper bound on any exploration temperature
pub const MAX_TEMPERATURE: f64 = 0.6;

/// Temperature and optional hint for one oracle call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingDecision {
    pub temperature: f64,
    pub hint: Option<PersonaHint>,
}

impl SamplingDecision {
    pub fn steady() -> Self {
        Self {
            temperature: BASE_TEMPERATURE,
            hint: None,
        }
    }

    pub fn is_exploring(&self) -> bool {
        self.hint.is_some()
    }
}

impl Default for SamplingDecision {
    fn default() -> Self {
        Self::steady()
    }
}

/// Choose sampling parameters for the next turn.
///
/// The RNG is only consumed when `repetition_detected` is true.
pub fn select<R: Rng + ?Sized>(repetition_detected: bool, rng: &mut R) -> SamplingDecision {
    if !repetition_detected {
        return SamplingDecision::steady();
    }

    let temperature = (BASE_TEMPERATURE + rng.gen_range(0.0..1.0) * EXPLORATION_SPREAD)
        .min(MAX_TEMPERATURE);

    SamplingDecision {
        temperature,
        hint: Some(choose_hint(rng)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_no_repetition_is_steady() {
        let mut rng = StdRng::seed_from_u64(1);
        let decision = select(false, &mut rng);
        assert_eq!(decision, SamplingDecision::steady());
        assert!(!decision.is_exploring());
    }

    #[test]
    fn test_exploration_stays_in_band() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..500 {
            let decision = select(true, &mut rng);
            assert!(decision.temperature >= BASE_TEMPERATURE);
            assert!(decision.temperature <= MAX_TEMPERATURE);
            assert!(decision.hint.is_some());
        }
    }

    #[test]
    fn test_exploration_is_reproducible_for_a_seed() {
        let mut a = StdRng::seed_from_u64(2024);
        let mut b = StdRng::seed_from_u64(2024);
        assert_eq!(select(true, &mut a), select(true, &mut b));
    }
}
