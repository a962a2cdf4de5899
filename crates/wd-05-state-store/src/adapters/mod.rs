pub mod memory;

pub use memory::InMemoryStateStore;
