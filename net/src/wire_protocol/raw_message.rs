use crate::wire_protocol::messages::ProtocolMessage;
use crate::wire_protocol::node::Chain;

/// The command names recognized by the schema registry. An on-wire
/// command that doesn't match any of these round-trips as `Command::Raw`
/// with its bytes intact, rather than failing to parse. An unrecognized
/// command is a dispatch miss, not a framing error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Version,
    Verack,
    Ping,
    Pong,
    Inv,
    Addr,
    GetData,
    NotFound,
    Tx,
    Block,
    Headers,
    MemPool,
    GetAddr,
    GetBlocks,
    Raw(Vec<u8>),
}

impl Command {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Command::Version => b"version",
            Command::Verack => b"verack",
            Command::Ping => b"ping",
            Command::Pong => b"pong",
            Command::Inv => b"inv",
            Command::Addr => b"addr",
            Command::GetData => b"getdata",
            Command::NotFound => b"notfound",
            Command::Tx => b"tx",
            Command::Block => b"block",
            Command::Headers => b"headers",
            Command::MemPool => b"mempool",
            Command::GetAddr => b"getaddr",
            Command::GetBlocks => b"getblocks",
            Command::Raw(bytes) => bytes,
        }
    }

    /// Resolves raw header bytes to a known variant, or keeps them as
    /// `Raw` when nothing in the registry matches.
    pub fn resolve(raw: Vec<u8>) -> Command {
        match raw.as_slice() {
            b"version" => Command::Version,
            b"verack" => Command::Verack,
            b"ping" => Command::Ping,
            b"pong" => Command::Pong,
            b"inv" => Command::Inv,
            b"addr" => Command::Addr,
            b"getdata" => Command::GetData,
            b"notfound" => Command::NotFound,
            b"tx" => Command::Tx,
            b"block" => Command::Block,
            b"headers" => Command::Headers,
            b"mempool" => Command::MemPool,
            b"getaddr" => Command::GetAddr,
            b"getblocks" => Command::GetBlocks,
            _ => Command::Raw(raw),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Command::Raw(_))
    }
}

/// A parsed header plus its still-undecoded payload. This is the boundary
/// between the framer, which only knows about bytes, and the typed
/// [`ProtocolMessage`] dispatch.
#[derive(Debug)]
pub struct RawMessage {
    pub chain: Chain,
    pub command: Command,
    pub payload: Vec<u8>,
}

impl RawMessage {
    pub fn new(chain: Chain, message: &ProtocolMessage) -> Self {
        RawMessage {
            chain,
            command: message.command(),
            payload: message.encode_payload(),
        }
    }

    /// Resolves `command` against the schema registry and decodes
    /// `payload` into a typed [`ProtocolMessage`]. Returns `Ok(None)` for
    /// an unrecognized command: the caller logs and moves on rather than
    /// treating a dispatch miss as fatal.
    pub fn to_protocol_message(&self) -> crate::error::PeerResult<Option<ProtocolMessage>> {
        if !self.command.is_known() {
            return Ok(None);
        }
        Ok(Some(ProtocolMessage::decode(&self.command, &self.payload)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_command_resolves_to_raw() {
        let command = Command::resolve(b"alert".to_vec());
        assert_eq!(command, Command::Raw(b"alert".to_vec()));
        assert!(!command.is_known());
    }

    #[test]
    fn known_command_round_trips_through_name_bytes() {
        let command = Command::resolve(b"ping".to_vec());
        assert_eq!(command, Command::Ping);
        assert_eq!(command.as_bytes(), b"ping");
    }
}
