//! 3PL item response functions and ability estimation.
//!
//! P(correct | θ) = c + (1 - c) / (1 + exp(-a(θ - b)))
//!
//! where a = discrimination, b = difficulty, c = guessing. Every function is
//! pure; numerical degeneracy collapses to a safe value instead of an error.

use crate::model::{IrtParams, ABILITY_MAX, ABILITY_MIN};

/// Step size of the proportional-error ability update.
pub const LEARNING_RATE: f64 = 0.3;

/// Standard error reported before any information has been collected.
pub const MAX_STANDARD_ERROR: f64 = 1.0;

/// Probability of a correct response at `ability`. Lies in `[guessing, 1)`.
pub fn probability_correct(ability: f64, params: &IrtParams) -> f64 {
    let c = params.guessing;
    let z = params.discrimination * (ability - params.difficulty);
    c + (1.0 - c) / (1.0 + (-z).exp())
}

/// Fisher information of an item at `ability`.
///
/// I(θ) = a² · (p* q*) / (p q), with p* = (p - c) / (1 - c).
///
/// Returns 0 whenever `p <= c` or `p >= 1`, where the ratio degenerates.
pub fn fisher_information(ability: f64, params: &IrtParams) -> f64 {
    let p = probability_correct(ability, params);
    let c = params.guessing;
    if !p.is_finite() || p <= c || p >= 1.0 {
        return 0.0;
    }

    let p_star = (p - c) / (1.0 - c);
    let q_star = 1.0 - p_star;
    let q = 1.0 - p;
    let a = params.discrimination;

    let info = a * a * p_star * q_star / (p * q);
    if info.is_finite() {
        info
    } else {
        0.0
    }
}

/// One proportional-error step toward the observed response:
///
/// θ' = θ + 0.3 · a · (x - P(θ)), clamped to [-3, 3].
///
/// This is a single O(1) gradient-style step, not an iterated maximum
/// likelihood fit. A non-finite step leaves the ability unchanged.
pub fn update_ability(current: f64, is_correct: bool, params: &IrtParams) -> f64 {
    let p = probability_correct(current, params);
    let observed = if is_correct { 1.0 } else { 0.0 };
    let updated = current + LEARNING_RATE * params.discrimination * (observed - p);
    if updated.is_finite() {
        clamp_ability(updated)
    } else {
        clamp_ability(current)
    }
}

/// Clamp to the reported ability scale. NaN maps to 0 (the population mean).
pub fn clamp_ability(ability: f64) -> f64 {
    if ability.is_nan() {
        0.0
    } else {
        ability.clamp(ABILITY_MIN, ABILITY_MAX)
    }
}

/// Standard error of the ability estimate from the test information
/// accumulated over answered items, each evaluated at the ability reached
/// right after that answer.
///
/// SE = 1 / sqrt(Σ I_j(θ_j)), or 1.0 while no information has accrued.
pub fn standard_error<'a, I>(items: I) -> f64
where
    I: IntoIterator<Item = (f64, &'a IrtParams)>,
{
    let total: f64 = items
        .into_iter()
        .map(|(ability, params)| fisher_information(ability, params))
        .sum();

    if total > 0.0 && total.is_finite() {
        1.0 / total.sqrt()
    } else {
        MAX_STANDARD_ERROR
    }
}
