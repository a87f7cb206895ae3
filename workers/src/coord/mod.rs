//! Coordination primitives that sit beside the channels.

pub mod wait_group;

pub use wait_group::WaitGroup;
