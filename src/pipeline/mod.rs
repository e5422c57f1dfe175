//! Pipeline entry points for watcher runs.
//!
//! - `reconcile`: Compare one subscription against a run's observations
//! - `Watcher::run`: Load, fetch, reconcile, notify, and commit

pub mod reconcile;
pub mod run;

pub use reconcile::reconcile;
pub use run::{RunOptions, RunReport, Watcher};
