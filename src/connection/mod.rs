//! Connection module: the single logical link to the console
//!
//! - `manager`: lifecycle state machine, reconnect policy and send gate
//! - `link`: WebSocket transport running in its own task

pub(crate) mod link;
mod manager;

pub use link::{Connector, LinkEvent, WsConnector};
pub use manager::{ConnectionManager, ConnectionState};
