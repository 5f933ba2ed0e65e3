pub mod capture;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod line_reader;
pub mod lifecycle;
pub mod lookup;
pub mod network;
pub mod pubsub;
pub mod web_interface;

pub use controller::Controller;
