//! Core types for engram.

mod item;
mod result;

pub use item::*;
pub use result::*;
