//! Index store of the active location.

mod index;
mod shared;

pub use index::{EntryPatch, IndexStore};
pub use shared::SharedIndex;
