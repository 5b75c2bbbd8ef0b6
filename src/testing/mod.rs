//! Testing infrastructure for the Ralph loop.
//!
//! This module provides mocks and fixtures for exercising the orchestrator
//! without a real coding agent or terminal.
//!
//! - **Mocks**: [`MockAgent`] with scripted outcomes, delays and activity,
//!   and [`RecordingObserver`] which captures every outward signal
//! - **Fixtures**: sample PRDs and a helper that ticks tasks off the way an
//!   agent would
//!
//! # Example
//!
//! ```rust,ignore
//! use ralph_loop::testing::{MockAgent, MockOutcome, RecordingObserver};
//!
//! let agent = MockAgent::new()
//!     .with_delay(Duration::from_secs(30))
//!     .with_outcomes(vec![MockOutcome::Succeed, MockOutcome::Fail("boom".into())]);
//! let observer = Arc::new(RecordingObserver::new());
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
