pub mod broadcaster;
pub mod buffer;
pub mod driver;
pub mod error;
pub mod event;
pub mod fold;
pub mod model;
pub mod passivation;

pub use broadcaster::Broadcaster;
pub use buffer::EventBuffer;
pub use driver::{BackendDriver, PersistenceDriver};
pub use error::{Error, Result};
pub use event::{EventKind, ModelEvent, ModelKind, ModelPayload, WatchEvent};
pub use fold::fold_backend_info;
pub use model::Model;
pub use passivation::PassivationHandler;
