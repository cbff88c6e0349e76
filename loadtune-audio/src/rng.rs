//! Seedable LCG random source for probabilistic embellishments.
//!
//! The engine owns a single `u64` state and threads it into the step
//! planner, so tests can fix the seed and get deterministic rolls.

/// Advance the LCG and return a uniform value in [0, 1).
pub fn next_random(state: &mut u64) -> f32 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    // 31 high bits scaled to [0, 1); thresholds compare against real
    // probabilities, so the full unit interval matters.
    ((*state >> 33) as f32) / (1u64 << 31) as f32
}
