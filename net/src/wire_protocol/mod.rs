pub mod connection;
pub mod framer;
pub mod handshake;
pub mod header;
pub mod messages;
pub mod node;
pub mod raw_message;
