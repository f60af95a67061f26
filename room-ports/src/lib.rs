//! Network port management library.
//!
//! This library provides the port range type stored on room units and the
//! first-fit allocator that carves per-room ranges out of the ephemeral pool.

pub mod allocator;
pub mod error;
pub mod range;

pub use allocator::allocate;
pub use error::PortError;
pub use range::PortRange;
