#![doc = include_str!("../README.md")]

mod channel;
mod coordinator;
mod error;
mod item;
mod pool;
mod processor;
mod queue;

pub use crate::channel::*;
pub use crate::coordinator::*;
pub use crate::error::*;
pub use crate::item::*;
pub use crate::pool::*;
pub use crate::processor::*;
pub use crate::queue::*;
