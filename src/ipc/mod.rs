//! IPC module for front-end communication

mod protocol;
mod server;

pub use protocol::ClientStatus;
pub use server::Server;
