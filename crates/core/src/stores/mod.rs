pub mod memory;

pub use memory::InMemoryVectorStore;
