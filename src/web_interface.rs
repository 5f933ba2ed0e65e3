// Web Interface module root
pub mod assets;
pub mod routes;
pub mod types;
pub mod web_server;

// Re-export commonly used items
pub use routes::{handle_rejection, routes};
pub use types::ServiceState;
pub use web_server::WebServer;
