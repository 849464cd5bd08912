//! Single-connection relay from command submitters to the editor

pub mod server;
pub mod slot;

pub use server::{bind, build_router, serve};
pub use slot::{ConnectionHandle, ConnectionId, ConnectionSlot, Delivery};
