// Library exports for the simulator binary and integration tests

pub mod cli;
pub mod config;
pub mod detection_feed;
pub mod error;
pub mod events;
pub mod logging;
pub mod notifications;
pub mod shutdown;
pub mod upload_queue;
