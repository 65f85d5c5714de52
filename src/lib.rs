pub mod config;
pub mod error;

pub mod kafka;
pub mod models;

pub use crate::config::Config;
pub use error::{Error, Result};
pub use kafka::{EventProducer, TopicRegistry};
pub use models::Weather;
