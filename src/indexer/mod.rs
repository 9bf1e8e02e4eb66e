//! Directory index building.
//!
//! This module provides:
//! - `build_index`, a cancellable depth-first walk over any backend
//! - `PathFilter` for gitignore-style exclusions and platform junk
//! - `IndexPersistence` with the default `MetaFolderIndex` cache

mod builder;
pub mod filter;
mod persistence;

pub use builder::{build_index, BuildOptions, BuildOutcome, BuildStats};
pub use filter::PathFilter;
pub use persistence::{IndexPersistence, MetaFolderIndex};
