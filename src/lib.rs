pub mod assets;
pub mod config;
pub mod hub;
pub mod logging;

pub use config::HubConfig;
