//! Loop orchestration.
//!
//! This module contains the core automation loop components:
//!
//! - [`orchestrator`] - The state machine driving agent iterations
//! - [`state`] - Loop status, phases and the session state holder
//! - [`command`] - Commands accepted from front ends
//! - [`observer`] - Outward signals to front ends
//!
//! # Architecture
//!
//! ```text
//! LoopHandle ──commands──> LoopOrchestrator ──signals──> LoopObserver
//!                            │          ^
//!                   invoke / │          │ events (epoch-tagged)
//!                     start  v          │
//!                AgentSession, CountdownTimer, InactivityMonitor
//! ```

pub mod command;
pub mod observer;
pub mod orchestrator;
pub mod state;

// Re-exports for convenience
pub use command::LoopCommand;
pub use observer::{LoopObserver, NullObserver};
pub use orchestrator::{LoopHandle, LoopOrchestrator, LoopSnapshot, OrchestratorConfig};
pub use state::{LoopState, LoopStatus};
