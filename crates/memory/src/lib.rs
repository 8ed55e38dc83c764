//! Agent memory for webpilot: the append-only history of thoughts and
//! turns, and the bounded context rendered from it.

pub mod entry;
pub mod masking;
pub mod memory;

pub use entry::{MemoryEntry, Turn};
pub use masking::mask_observations;
pub use memory::{AgentMemory, DEFAULT_THOUGHT_LIMIT};
