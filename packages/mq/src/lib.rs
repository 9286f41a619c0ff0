pub mod config;
pub mod error;
pub mod models;

pub use config::ConsumeConfig;
pub use error::MqError;
pub use models::{BrokerMessage, BroccoliError, MqBuilder, MqQueue, init_mq, publish_job};

pub type Mq = MqQueue;
