//! Adapters for the Codev core: the HTTP project-service client, an
//! in-process realtime channel, and configuration loading.

pub mod config;
pub mod local_channel;
pub mod project_client;

pub use config::{CodevConfig, ServiceConfig};
pub use local_channel::InProcessChannel;
pub use project_client::HttpProjectService;
