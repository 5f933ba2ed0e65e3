//! Composition root and process-level shutdown.

pub mod controller_handler;
pub mod shutdown;

pub use controller_handler::Controller;
pub use shutdown::{wait_for_termination, ShutdownCoordinator, ShutdownSignal};
