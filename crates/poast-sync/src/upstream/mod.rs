//! Reference authority used by tests and the demo binary.

pub mod memory;

pub use memory::MemoryUpstream;
