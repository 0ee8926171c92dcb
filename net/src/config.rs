use crate::wire_protocol::framer::DEFAULT_MAX_PAYLOAD;
use crate::wire_protocol::node::{Chain, NodeDesc, NodeService, NodeServiceSet};

/// Everything a [`crate::wire_protocol::connection::NodeConnection`] needs
/// to know about itself and its limits, independent of any one peer.
/// Grouping these as a config struct (rather than scattering constants
/// through `main.rs`, as the teacher's showcase binary does) is the one
/// place this crate departs from the teacher's literal layout, to give
/// callers outside the demo binary a way to configure the client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub chain: Chain,
    pub protocol_version: i32,
    pub services: NodeServiceSet,
    pub user_agent: String,
    pub start_height: i32,
    pub max_payload_bytes: u32,
}

impl ClientConfig {
    pub fn new(chain: Chain) -> Self {
        ClientConfig {
            chain,
            protocol_version: BITCOIN_PROTOCOL_VERSION,
            services: NodeServiceSet(vec![NodeService::NodeNetwork]),
            user_agent: "/p2p_showcase.bitmagier:1.0".to_string(),
            start_height: 0,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD,
        }
    }

    pub fn node_desc(&self) -> NodeDesc {
        NodeDesc {
            chain: self.chain,
            protocol_version: self.protocol_version,
            services: self.services.clone(),
            sub_ver: self.user_agent.clone(),
            start_height: self.start_height,
        }
    }
}

/// Protocol version advertised by this client.
pub const BITCOIN_PROTOCOL_VERSION: i32 = 60002;
