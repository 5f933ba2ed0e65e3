//! Capture process supervision.
//!
//! [`ProcessLifecycleManager`] owns the one capture process a service instance
//! may run: it starts it on an interface, stops it on request or when its
//! timeout expires, and never lets two run at once.
//!
//! Re-exports:
//! - [`ProcessLifecycleManager`], [`validate_interface`]
//! - [`CaptureCommand`], [`CaptureState`], [`CaptureStatus`], [`CaptureProcessHandle`]
//! - [`Termination`], [`terminate_gracefully`]

pub mod process_manager;
pub mod termination;
#[cfg(test)]
pub mod tests;
pub mod types;

pub use process_manager::{validate_interface, ProcessLifecycleManager};
pub use termination::{terminate_gracefully, Termination};
pub use types::{CaptureCommand, CaptureProcessHandle, CaptureState, CaptureStatus};
