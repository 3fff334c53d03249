//! Core types for parley.

pub mod message;
pub mod stream;

pub use message::*;
pub use stream::*;
