//! WebSocket transport: wire protocol, codec and connection handler

pub mod codec;
pub mod handler;
pub mod protocol;
