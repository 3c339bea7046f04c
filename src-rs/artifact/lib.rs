pub mod extract;
pub mod retention;
pub mod store;
pub mod types;

pub use extract::{ArtifactResolver, Strategy};
pub use store::ArtifactStore;
pub use types::{Artifact, ExtractionError, ImageFormat, SourceKind};
