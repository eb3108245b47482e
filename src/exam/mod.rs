//! The timed exam engine: countdown, re-verification schedule, scoring, and the registry that
//! keeps live sessions ticking.

pub mod record;
pub mod registry;
pub mod schedule;
pub mod scoring;
pub mod session;
pub mod ticker;
