//! Fixed-size pool of worker threads.
//!
//! ## Structure
//!
//! - [`manager`] - [`WorkerPool`], which starts, inspects, and stops workers.
//! - [`worker`] - the per-thread loop and the [`WorkerState`] machine.

mod manager;
mod worker;


pub use manager::*;
pub use worker::WorkerState;
