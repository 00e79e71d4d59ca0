pub mod manager;
pub mod model;

pub use manager::InstanceStore;
pub use model::{InstalledMod, InstanceMetadata, METADATA_FILE};
