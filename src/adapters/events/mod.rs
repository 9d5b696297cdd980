//! Notification bus adapters.
//!
//! - `InMemoryEventBus` - In-process capture, used by tests and local runs

mod in_memory;

pub use in_memory::InMemoryEventBus;
