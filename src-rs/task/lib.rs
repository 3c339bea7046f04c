pub mod service;
pub mod store;
pub mod types;

pub use service::GenerationService;
pub use store::{TaskRegistry, TransitionError};
pub use types::{Task, TaskStatus};
