//! Paper-trading collaborators: a synthetic candle feed and an in-memory
//! store. Nothing here talks to a real exchange or database.

mod feed;
mod store;

pub use feed::PaperFeed;
pub use store::MemoryStore;
