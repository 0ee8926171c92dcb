use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{thread_rng, Rng};

use crate::codec::buffer::{ByteBufferComposer, ByteBufferParser};
use crate::codec::Hash256;
use crate::error::PeerResult;
use crate::wire_protocol::header::sha256d;
use crate::wire_protocol::node::{InventoryType, NodeDesc, NodeServiceSet};
use crate::wire_protocol::raw_message::Command;

/// A decoded payload together with the command that selected its schema,
/// realized as a closed enum with one variant per known command.
#[derive(Debug)]
pub enum ProtocolMessage {
    Version(VersionMessage),
    Verack,
    Ping(PingMessage),
    Pong(PongMessage),
    Inv(Vec<InventoryItem>),
    Addr(Vec<TimestampedAddress>),
    GetData(Vec<InventoryItem>),
    NotFound(Vec<InventoryItem>),
    Tx(Tx),
    Block(Block),
    Headers(Vec<BlockHeader>),
    MemPool,
    GetAddr,
    GetBlocks(GetBlocks),
}

impl ProtocolMessage {
    pub fn command(&self) -> Command {
        match self {
            ProtocolMessage::Version(_) => Command::Version,
            ProtocolMessage::Verack => Command::Verack,
            ProtocolMessage::Ping(_) => Command::Ping,
            ProtocolMessage::Pong(_) => Command::Pong,
            ProtocolMessage::Inv(_) => Command::Inv,
            ProtocolMessage::Addr(_) => Command::Addr,
            ProtocolMessage::GetData(_) => Command::GetData,
            ProtocolMessage::NotFound(_) => Command::NotFound,
            ProtocolMessage::Tx(_) => Command::Tx,
            ProtocolMessage::Block(_) => Command::Block,
            ProtocolMessage::Headers(_) => Command::Headers,
            ProtocolMessage::MemPool => Command::MemPool,
            ProtocolMessage::GetAddr => Command::GetAddr,
            ProtocolMessage::GetBlocks(_) => Command::GetBlocks,
        }
    }

    pub fn encode_payload(&self) -> Vec<u8> {
        let mut c = ByteBufferComposer::new();
        match self {
            ProtocolMessage::Version(m) => m.encode(&mut c),
            ProtocolMessage::Verack | ProtocolMessage::MemPool | ProtocolMessage::GetAddr => {}
            ProtocolMessage::Ping(m) => m.encode(&mut c),
            ProtocolMessage::Pong(m) => m.encode(&mut c),
            ProtocolMessage::Inv(items) | ProtocolMessage::GetData(items) | ProtocolMessage::NotFound(items) => {
                c.write_list(items, |c, item| item.encode(c));
            }
            ProtocolMessage::Addr(addrs) => {
                c.write_list(addrs, |c, a| a.encode(c));
            }
            ProtocolMessage::Tx(tx) => tx.encode(&mut c),
            ProtocolMessage::Block(b) => b.encode(&mut c),
            ProtocolMessage::Headers(headers) => {
                c.write_list(headers, |c, h| h.encode_with_txns_count(c));
            }
            ProtocolMessage::GetBlocks(gb) => gb.encode(&mut c),
        }
        c.result()
    }

    /// Decodes a payload given the command that the header already
    /// resolved. Returns `Ok(None)` only if called with a command that has
    /// no matching variant, which shouldn't happen given how this is wired
    /// up from [`crate::wire_protocol::raw_message::RawMessage`].
    pub fn decode(command: &Command, payload: &[u8]) -> PeerResult<Self> {
        let mut p = ByteBufferParser::new(payload);
        Ok(match command {
            Command::Version => ProtocolMessage::Version(VersionMessage::decode(&mut p)?),
            Command::Verack => ProtocolMessage::Verack,
            Command::Ping => ProtocolMessage::Ping(PingMessage::decode(&mut p)?),
            Command::Pong => ProtocolMessage::Pong(PongMessage::decode(&mut p)?),
            Command::Inv => ProtocolMessage::Inv(decode_inventory_list(&mut p)?),
            Command::Addr => ProtocolMessage::Addr(p.read_list(30, TimestampedAddress::decode)?),
            Command::GetData => ProtocolMessage::GetData(decode_inventory_list(&mut p)?),
            Command::NotFound => ProtocolMessage::NotFound(decode_inventory_list(&mut p)?),
            Command::Tx => ProtocolMessage::Tx(Tx::decode(&mut p)?),
            Command::Block => ProtocolMessage::Block(Block::decode(&mut p)?),
            Command::Headers => ProtocolMessage::Headers(p.read_list(81, BlockHeader::decode_with_txns_count)?),
            Command::MemPool => ProtocolMessage::MemPool,
            Command::GetAddr => ProtocolMessage::GetAddr,
            Command::GetBlocks => ProtocolMessage::GetBlocks(GetBlocks::decode(&mut p)?),
            Command::Raw(name) => {
                return Err(crate::error::PeerError::Protocol(format!(
                    "decode called with unresolved command {:?}",
                    String::from_utf8_lossy(name)
                )))
            }
        })
    }
}

fn decode_inventory_list(p: &mut ByteBufferParser) -> PeerResult<Vec<InventoryItem>> {
    p.read_list(36, InventoryItem::decode)
}

/// https://en.bitcoin.it/wiki/Protocol_documentation#version
///
/// size | field        | type     | description
/// ---  | -----        | ----     | ------------
/// 4    | version      | i32      | Identifies protocol version being used by the node
/// 8    | services     | u64      | bitfield of features to be enabled for this connection
/// 8    | timestamp    | i64      | standard UNIX timestamp in seconds
/// 26   | addr_recv    | net_addr | The network address of the node receiving this message
/// 26   | addr_from    | net_addr | Field can be ignored.
/// 8    | nonce        | u64      | Node random nonce
/// ?    | user_agent   | var_str  | User Agent (0x00 if string is 0 bytes long)
/// 4    | start_height | i32      | The last block received by the emitting node
#[derive(Clone, Debug)]
pub struct VersionMessage {
    pub protocol_version: i32,
    pub services: NodeServiceSet,
    pub timestamp: i64,
    pub addr_recv: SocketAddr,
    pub addr_from: SocketAddr,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
}

impl VersionMessage {
    pub fn new(addr_recv: SocketAddr, addr_from: SocketAddr, me: &NodeDesc) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the unix epoch")
            .as_secs() as i64;

        VersionMessage {
            protocol_version: me.protocol_version,
            services: me.services.clone(),
            timestamp,
            addr_recv,
            addr_from,
            nonce: thread_rng().gen(),
            user_agent: me.sub_ver.clone(),
            start_height: me.start_height,
        }
    }

    fn encode(&self, c: &mut ByteBufferComposer) {
        c.write_i32_le(self.protocol_version);
        c.write_u64_le(self.services.as_bitmask());
        c.write_i64_le(self.timestamp);
        c.write_net_addr(&self.services, &self.addr_recv);
        c.write_net_addr(&self.services, &self.addr_from);
        c.write_u64_le(self.nonce);
        c.write_var_str(self.user_agent.as_bytes());
        c.write_i32_le(self.start_height);
    }

    fn decode(p: &mut ByteBufferParser) -> PeerResult<Self> {
        let protocol_version = p.read_i32_le()?;
        let services = NodeServiceSet::from_bitmask(p.read_u64_le()?);
        let timestamp = p.read_i64_le()?;
        let (_, addr_recv) = p.read_net_addr()?;
        let (_, addr_from) = p.read_net_addr()?;
        let nonce = p.read_u64_le()?;
        let user_agent = String::from_utf8_lossy(&p.read_var_str()?).into_owned();
        let start_height = p.read_i32_le()?;

        Ok(VersionMessage {
            protocol_version,
            services,
            timestamp,
            addr_recv,
            addr_from,
            nonce,
            user_agent,
            start_height,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct PingMessage {
    pub nonce: u64,
}

impl PingMessage {
    pub fn new() -> Self {
        PingMessage { nonce: thread_rng().gen() }
    }

    fn encode(&self, c: &mut ByteBufferComposer) {
        c.write_u64_le(self.nonce);
    }

    fn decode(p: &mut ByteBufferParser) -> PeerResult<Self> {
        Ok(PingMessage { nonce: p.read_u64_le()? })
    }
}

#[derive(Clone, Debug, Default)]
pub struct PongMessage {
    pub nonce: u64,
}

impl PongMessage {
    /// A `pong` replying to the given `ping` nonce.
    pub fn reply_to(ping: &PingMessage) -> Self {
        PongMessage { nonce: ping.nonce }
    }

    fn encode(&self, c: &mut ByteBufferComposer) {
        c.write_u64_le(self.nonce);
    }

    fn decode(p: &mut ByteBufferParser) -> PeerResult<Self> {
        Ok(PongMessage { nonce: p.read_u64_le()? })
    }
}

#[derive(Copy, Clone, Debug)]
pub struct InventoryItem {
    pub inv_type: InventoryType,
    pub hash: Hash256,
}

impl InventoryItem {
    pub fn new(inv_type: InventoryType, hash: Hash256) -> Self {
        InventoryItem { inv_type, hash }
    }

    fn encode(&self, c: &mut ByteBufferComposer) {
        c.write_u32_le(self.inv_type.as_u32());
        c.write_hash256(&self.hash);
    }

    fn decode(p: &mut ByteBufferParser) -> PeerResult<Self> {
        let inv_type = InventoryType::from_u32(p.read_u32_le()?);
        let hash = p.read_hash256()?;
        Ok(InventoryItem { inv_type, hash })
    }
}

/// `NetworkAddress` with a leading timestamp, as used in the `addr`
/// message's address vector.
#[derive(Clone, Debug)]
pub struct TimestampedAddress {
    pub timestamp: u32,
    pub services: NodeServiceSet,
    pub addr: SocketAddr,
}

impl TimestampedAddress {
    fn encode(&self, c: &mut ByteBufferComposer) {
        c.write_timestamped_net_addr(self.timestamp, &self.services, &self.addr);
    }

    fn decode(p: &mut ByteBufferParser) -> PeerResult<Self> {
        let (timestamp, services, addr) = p.read_timestamped_net_addr()?;
        Ok(TimestampedAddress { timestamp, services, addr })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OutPoint {
    pub hash: Hash256,
    pub index: u32,
}

impl OutPoint {
    fn encode(&self, c: &mut ByteBufferComposer) {
        c.write_hash256(&self.hash);
        c.write_u32_le(self.index);
    }

    fn decode(p: &mut ByteBufferParser) -> PeerResult<Self> {
        let hash = p.read_hash256()?;
        let index = p.read_u32_le()?;
        Ok(OutPoint { hash, index })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub signature_script: Vec<u8>,
    pub sequence: u32,
}

/// Default sequence number, `0xFFFFFFFF` ("final").
pub const DEFAULT_SEQUENCE: u32 = 0xFFFF_FFFF;

impl TxIn {
    fn encode(&self, c: &mut ByteBufferComposer) {
        self.previous_output.encode(c);
        c.write_var_str(&self.signature_script);
        c.write_u32_le(self.sequence);
    }

    fn decode(p: &mut ByteBufferParser) -> PeerResult<Self> {
        let previous_output = OutPoint::decode(p)?;
        let signature_script = p.read_var_str()?;
        let sequence = p.read_u32_le()?;
        Ok(TxIn { previous_output, signature_script, sequence })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub value: i64,
    pub pk_script: Vec<u8>,
}

impl TxOut {
    fn encode(&self, c: &mut ByteBufferComposer) {
        c.write_i64_le(self.value);
        c.write_var_str(&self.pk_script);
    }

    fn decode(p: &mut ByteBufferParser) -> PeerResult<Self> {
        let value = p.read_i64_le()?;
        let pk_script = p.read_var_str()?;
        Ok(TxOut { value, pk_script })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tx {
    pub version: u32,
    pub tx_in: Vec<TxIn>,
    pub tx_out: Vec<TxOut>,
    pub lock_time: u32,
}

impl Tx {
    fn encode(&self, c: &mut ByteBufferComposer) {
        c.write_u32_le(self.version);
        c.write_list(&self.tx_in, |c, i| i.encode(c));
        c.write_list(&self.tx_out, |c, o| o.encode(c));
        c.write_u32_le(self.lock_time);
    }

    fn decode(p: &mut ByteBufferParser) -> PeerResult<Self> {
        let version = p.read_u32_le()?;
        let tx_in = p.read_list(41, TxIn::decode)?;
        let tx_out = p.read_list(9, TxOut::decode)?;
        let lock_time = p.read_u32_le()?;
        Ok(Tx { version, tx_in, tx_out, lock_time })
    }

    /// The canonical serialization, identical to what's sent on the wire.
    /// `Tx` has no fields excluded from hashing, unlike `BlockHeader`.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut c = ByteBufferComposer::new();
        self.encode(&mut c);
        c.result()
    }

    /// Transaction hash: reversed double-SHA256 of the canonical
    /// serialization.
    pub fn txid(&self) -> Hash256 {
        let mut digest = sha256d(&self.canonical_bytes());
        digest.reverse();
        digest
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    fn encode_fields(&self, c: &mut ByteBufferComposer) {
        c.write_u32_le(self.version);
        c.write_hash256(&self.prev_block);
        c.write_hash256(&self.merkle_root);
        c.write_u32_le(self.timestamp);
        c.write_u32_le(self.bits);
        c.write_u32_le(self.nonce);
    }

    fn decode_fields(p: &mut ByteBufferParser) -> PeerResult<Self> {
        let version = p.read_u32_le()?;
        let prev_block = p.read_hash256()?;
        let merkle_root = p.read_hash256()?;
        let timestamp = p.read_u32_le()?;
        let bits = p.read_u32_le()?;
        let nonce = p.read_u32_le()?;
        Ok(BlockHeader { version, prev_block, merkle_root, timestamp, bits, nonce })
    }

    /// Encodes with the trailing `txns_count` VarInt fixed at zero, as used
    /// inside a `headers` message's vector of headers.
    fn encode_with_txns_count(&self, c: &mut ByteBufferComposer) {
        self.encode_fields(c);
        c.write_var_int(0);
    }

    fn decode_with_txns_count(p: &mut ByteBufferParser) -> PeerResult<Self> {
        let header = Self::decode_fields(p)?;
        p.read_var_int()?; // always zero on the wire; not carried on the typed value
        Ok(header)
    }

    /// Block hash: reversed double-SHA256 of the six header fields. The
    /// trailing `txns_count`/`txns` are excluded from hashing, same as
    /// a transaction's own hash excludes nothing but a header's excludes
    /// everything after `nonce`.
    pub fn block_hash(&self) -> Hash256 {
        let mut c = ByteBufferComposer::new();
        self.encode_fields(&mut c);
        let mut digest = sha256d(&c.result());
        digest.reverse();
        digest
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub txns: Vec<Tx>,
}

impl Block {
    fn encode(&self, c: &mut ByteBufferComposer) {
        self.header.encode_fields(c);
        c.write_list(&self.txns, |c, tx| tx.encode(c));
    }

    fn decode(p: &mut ByteBufferParser) -> PeerResult<Self> {
        let header = BlockHeader::decode_fields(p)?;
        let txns = p.read_list(10, Tx::decode)?;
        Ok(Block { header, txns })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetBlocks {
    pub version: u32,
    pub block_hashes: Vec<Hash256>,
    pub hash_stop: Hash256,
}

impl GetBlocks {
    pub fn new(version: u32, block_hashes: Vec<Hash256>, hash_stop: Hash256) -> Self {
        GetBlocks { version, block_hashes, hash_stop }
    }

    /// `block_hashes` is a raw concatenation of hashes with no list-length
    /// prefix of its own. Only the sibling `hash_count` VarInt carries the
    /// count.
    fn encode(&self, c: &mut ByteBufferComposer) {
        c.write_u32_le(self.version);
        c.write_var_int(self.block_hashes.len() as u64);
        for hash in &self.block_hashes {
            c.write_hash256(hash);
        }
        c.write_hash256(&self.hash_stop);
    }

    fn decode(p: &mut ByteBufferParser) -> PeerResult<Self> {
        let version = p.read_u32_le()?;
        let hash_count = p.read_var_int()?;
        if hash_count > (p.remaining() / 32) as u64 {
            return Err(crate::error::PeerError::Truncated(format!(
                "getblocks locator of {} hashes can't fit remaining payload",
                hash_count
            )));
        }
        let mut block_hashes = Vec::with_capacity(hash_count.min(4096) as usize);
        for _ in 0..hash_count {
            block_hashes.push(p.read_hash256()?);
        }
        let hash_stop = p.read_hash256()?;
        Ok(GetBlocks { version, block_hashes, hash_stop })
    }
}

#[cfg(test)]
mod test {
    use crate::wire_protocol::node::{NodeService, NodeServiceSet};

    use super::*;

    fn round_trip(message: &ProtocolMessage) -> ProtocolMessage {
        let command = message.command();
        let payload = message.encode_payload();
        ProtocolMessage::decode(&command, &payload).unwrap()
    }

    #[test]
    fn version_message_round_trips() {
        let me = NodeDesc {
            chain: crate::wire_protocol::node::Chain::Bitcoin,
            protocol_version: 60002,
            services: NodeServiceSet(vec![NodeService::NodeNetwork]),
            sub_ver: "/rust-p2p:0.1/".to_string(),
            start_height: 123,
        };
        let addr_recv: SocketAddr = "1.2.3.4:8333".parse().unwrap();
        let addr_from: SocketAddr = "5.6.7.8:8333".parse().unwrap();
        let version = VersionMessage::new(addr_recv, addr_from, &me);

        match round_trip(&ProtocolMessage::Version(version.clone())) {
            ProtocolMessage::Version(decoded) => {
                assert_eq!(decoded.protocol_version, version.protocol_version);
                assert_eq!(decoded.nonce, version.nonce);
                assert_eq!(decoded.user_agent, version.user_agent);
                assert_eq!(decoded.addr_recv, version.addr_recv);
                assert_eq!(decoded.addr_from, version.addr_from);
                assert_eq!(decoded.start_height, version.start_height);
            }
            other => panic!("expected Version, got {:?}", other),
        }
    }

    #[test]
    fn pong_reply_carries_the_pings_nonce() {
        // ping nonce 0x1122334455667788 must produce a pong whose
        // payload is the same nonce, little-endian.
        let ping = PingMessage { nonce: 0x1122334455667788 };
        let pong = PongMessage::reply_to(&ping);
        assert_eq!(pong.nonce, ping.nonce);

        let mut c = ByteBufferComposer::new();
        pong.encode(&mut c);
        assert_eq!(c.result(), vec![0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn empty_payload_messages_round_trip() {
        for message in [ProtocolMessage::Verack, ProtocolMessage::MemPool, ProtocolMessage::GetAddr] {
            let command = message.command();
            assert!(message.encode_payload().is_empty());
            let decoded = ProtocolMessage::decode(&command, &[]).unwrap();
            assert_eq!(decoded.command(), command);
        }
    }

    #[test]
    fn inventory_vector_round_trips() {
        let items = vec![
            InventoryItem::new(InventoryType::Tx, [1u8; 32]),
            InventoryItem::new(InventoryType::Block, [2u8; 32]),
            InventoryItem::new(InventoryType::Unknown(99), [3u8; 32]),
        ];
        let message = ProtocolMessage::Inv(items.clone());
        match round_trip(&message) {
            ProtocolMessage::Inv(decoded) => {
                assert_eq!(decoded.len(), items.len());
                for (d, o) in decoded.iter().zip(items.iter()) {
                    assert_eq!(d.inv_type, o.inv_type);
                    assert_eq!(d.hash, o.hash);
                }
            }
            other => panic!("expected Inv, got {:?}", other),
        }
    }

    #[test]
    fn tx_round_trips_and_hashes_deterministically() {
        let tx = Tx {
            version: 1,
            tx_in: vec![TxIn {
                previous_output: OutPoint { hash: [7u8; 32], index: 0 },
                signature_script: vec![0xAA, 0xBB],
                sequence: DEFAULT_SEQUENCE,
            }],
            tx_out: vec![TxOut { value: 5_000_000_000, pk_script: vec![0x76, 0xA9] }],
            lock_time: 0,
        };

        let message = ProtocolMessage::Tx(tx.clone());
        match round_trip(&message) {
            ProtocolMessage::Tx(decoded) => assert_eq!(decoded, tx),
            other => panic!("expected Tx, got {:?}", other),
        }

        // hashing is pure and deterministic over the canonical serialization
        assert_eq!(tx.txid(), tx.txid());
    }

    #[test]
    fn get_blocks_locator_has_no_own_length_prefix() {
        // block_hashes is a raw concatenation; only hash_count (the VarInt
        // right after `version`) carries the element count.
        let gb = GetBlocks::new(70002, vec![[1u8; 32], [2u8; 32]], [0u8; 32]);
        let mut c = ByteBufferComposer::new();
        gb.encode(&mut c);
        let bytes = c.result();

        // version(4) + hash_count varint(1) + 2*32 hashes + hash_stop(32)
        assert_eq!(bytes.len(), 4 + 1 + 64 + 32);
        assert_eq!(bytes[4], 2); // hash_count

        let decoded = GetBlocks::decode(&mut ByteBufferParser::new(&bytes)).unwrap();
        assert_eq!(decoded, gb);
    }

    #[test]
    fn block_header_hash_excludes_txns_count() {
        let header = BlockHeader {
            version: 1,
            prev_block: [0u8; 32],
            merkle_root: [0u8; 32],
            timestamp: 0,
            bits: 0,
            nonce: 0,
        };
        let mut with_count = ByteBufferComposer::new();
        header.encode_with_txns_count(&mut with_count);
        let mut fields_only = ByteBufferComposer::new();
        header.encode_fields(&mut fields_only);

        // the trailing txns_count byte must not affect the hashed bytes
        assert_eq!(fields_only.result().len() + 1, with_count.result().len());
        assert_eq!(header.block_hash(), header.block_hash());
    }
}
