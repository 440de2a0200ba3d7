// Companion HTTP server that receives and lists motion records.

pub mod server;
pub mod store;

pub use server::{router, SharedStore};
pub use store::{EventStore, LogEntry};
