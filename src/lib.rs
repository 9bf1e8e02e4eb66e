//! Tagdex Library
//!
//! Location indexing and search core for file tagging applications: builds
//! in-memory indexes of local, object-store and WebDAV locations, keeps them
//! in sync with filesystem changes and evaluates tag and text searches
//! across locations.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod error;
pub mod indexer;
pub mod ledger;
pub mod model;
pub mod search;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
