pub mod backend;
pub mod error;
mod models;
mod path;
pub mod remote;
pub mod sidecar;

#[cfg(feature = "mock")]
pub use crate::backend::MockInventory;
pub use crate::backend::{Inventory, LocalInventory};
pub use crate::models::{Artifact, DocumentRef, strip_extension};
pub use crate::path::validate as validate_name;
pub use crate::remote::{RemoteIndex, RemoteTitleEntry, same_category};
pub use crate::sidecar::{BookInfo, Defaulted};
use std::sync::Arc;

pub type InventoryHandle = Arc<dyn Inventory + Send + Sync>;
