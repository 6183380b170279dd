//! HTTP request handlers.

pub mod health;
pub mod mirror;
pub mod objects;

pub use health::*;
pub use mirror::*;
pub use objects::*;
