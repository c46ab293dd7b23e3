//! Adapter and training harness for small dense classifiers.
//!
//! Labeled splits arrive in the upstream convention (feature-dimension-major
//! arrays, 1-based labels). The [`adapter`] turns them into sample-major
//! batches, and the [`harness`] trains a one-hidden-layer network on them and
//! reports `(loss, accuracy, secondary accuracy)`.

pub mod adapter;
pub mod config;
pub mod devices;
pub mod error;
pub mod harness;
pub mod history;
pub mod logging;
pub mod model;
pub mod parsing;

pub use error::{Error, Result};
