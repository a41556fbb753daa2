pub mod messages;
pub mod service;

pub use messages::{ControlMessage, WorkerEvent};
pub use service::{OfflineWorker, WorkerCommand, WorkerHandle};
