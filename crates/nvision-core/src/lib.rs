//! Core types shared by the NV-center detection crates.
//!
//! This crate is intentionally small: an immutable intensity [`Grid`], its
//! boolean [`Mask`] counterpart, fallible buffer allocation, and the stderr
//! logger used by the command-line tools. It knows nothing about detection.

mod grid;
mod logger;

pub use grid::{try_alloc, AllocError, Grid, InputError, Mask};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
