//! Service layer: the in-process publish API.

pub mod publisher;

pub use publisher::Publisher;
