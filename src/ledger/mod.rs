//! Suppression of watch events caused by our own mutations.

mod guard;
mod ignore_set;

pub use guard::GuardedBackend;
pub use ignore_set::IgnoreLedger;
