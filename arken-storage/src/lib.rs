mod codec;
mod error;
mod tree;
mod watcher;

pub use error::{Error, Result};
pub use watcher::EtcdPersistenceDriver;
