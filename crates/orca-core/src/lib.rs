pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod location;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{OrcaError, Result};
pub use event::EventBus;
pub use graph::{transform, GraphDocument, GraphModel};
pub use location::{LocationHost, FileLocation, MemoryLocation};
pub use traits::Backend;
pub use types::*;
