//! Post-commit notifications.
//!
//! A small pub/sub boundary used to tell external collaborators (cache
//! invalidation, search indexing) that committed catalog state changed.

pub mod bus;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
