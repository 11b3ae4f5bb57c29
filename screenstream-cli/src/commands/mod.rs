//! CLI command implementations

mod collect;
mod config;
mod info;
mod stream;

pub use collect::{collect, CollectArgs};
pub use config::{config, ConfigArgs};
pub use info::info;
pub use stream::{stream, StreamArgs};
