use std::ops::BitOr;

use strum::{EnumIter, IntoEnumIterator};

use crate::error::PeerError;

/// Everything needed to build a `version` message and to describe the
/// local node to a prospective peer.
#[derive(Clone, Debug)]
pub struct NodeDesc {
    pub chain: Chain,
    pub protocol_version: i32,
    pub services: NodeServiceSet,
    pub sub_ver: String,
    pub start_height: i32,
}

/// The network a connection belongs to, identified on the wire by its
/// 4-byte magic value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter)]
pub enum Chain {
    Bitcoin,
    BitcoinTestnet,
    BitcoinTestnet3,
    Namecoin,
    Litecoin,
    LitecoinTestnet,
}

impl Chain {
    pub fn magic_value(&self) -> u32 {
        match self {
            Chain::Bitcoin => 0xD9B4BEF9,
            Chain::BitcoinTestnet => 0xDAB5BFFA,
            Chain::BitcoinTestnet3 => 0x0709110B,
            Chain::Namecoin => 0xFEB4BEF9,
            Chain::Litecoin => 0xDBB6C0FB,
            Chain::LitecoinTestnet => 0xDCB7C1FC,
        }
    }
}

impl TryFrom<u32> for Chain {
    type Error = PeerError;

    fn try_from(magic_value: u32) -> Result<Self, Self::Error> {
        Self::iter()
            .find(|c| c.magic_value() == magic_value)
            .ok_or(PeerError::UnknownMagic(magic_value))
    }
}

/// A bitmask of advertised node services (`NODE_NETWORK` and friends).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct NodeServiceSet(pub Vec<NodeService>);

impl NodeServiceSet {
    pub fn as_bitmask(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, bit| acc.bitor(bit.as_u64()))
    }

    pub fn from_bitmask(mask: u64) -> Self {
        let services = NodeService::iter().filter(|e| mask & e.as_u64() != 0).collect();
        NodeServiceSet(services)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter)]
#[repr(u64)]
pub enum NodeService {
    NodeNetwork = 0x1,
}

impl NodeService {
    pub fn as_u64(self) -> u64 {
        self as u64
    }
}

/// The type tag of an [`crate::wire_protocol::messages::InventoryItem`].
/// Unknown on-wire values round-trip as `Unknown`, so `inv`/`getdata`/
/// `notfound` decode any payload a peer sends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InventoryType {
    Error,
    Tx,
    Block,
    Unknown(u32),
}

impl InventoryType {
    pub fn as_u32(self) -> u32 {
        match self {
            InventoryType::Error => 0,
            InventoryType::Tx => 1,
            InventoryType::Block => 2,
            InventoryType::Unknown(v) => v,
        }
    }

    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => InventoryType::Error,
            1 => InventoryType::Tx,
            2 => InventoryType::Block,
            other => InventoryType::Unknown(other),
        }
    }
}
