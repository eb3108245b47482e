// src/exam/schedule.rs

//! Re-verification schedule.
//!
//! Thresholds are remaining-time values on the countdown: a check falls due as soon as the clock
//! reads at or below its threshold. A threshold of 0 never fires because the exam is forced to
//! submit when the clock hits 0.

use rand::Rng;

use crate::config::{FIRST_CHECK_OFFSET_SECS, RECHECK_MAX_SECS, RECHECK_MIN_SECS};

/// Threshold for the first check after the initial verification.
pub fn first_check(remaining_secs: u32) -> u32 {
    remaining_secs.saturating_sub(FIRST_CHECK_OFFSET_SECS)
}

/// Threshold for the check following one that just completed.
pub fn next_check<R: Rng + ?Sized>(remaining_secs: u32, rng: &mut R) -> u32 {
    let gap = rng.gen_range(RECHECK_MIN_SECS..=RECHECK_MAX_SECS);
    remaining_secs.saturating_sub(gap)
}
