mod coordinator;
mod manifest;
mod processor;

pub use coordinator::{Coordinator, TickSummary};
pub use manifest::{ArchiveDescriptor, ParsedManifest, parse_manifest};
pub use processor::{ArchiveProcessor, ArchiveResult};
