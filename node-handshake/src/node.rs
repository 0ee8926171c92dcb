use std::collections::HashMap;
use std::net::SocketAddr;

use net::config::ClientConfig;
use net::conversation::ConversationTopicHandler;
use net::error::PeerResult;
use net::wire_protocol::connection::NodeConnection;
use net::wire_protocol::handshake::HandshakeInitConversationTopic;
use net::wire_protocol::messages::VersionMessage;

pub struct Node {
    config: ClientConfig,
    remote_nodes: HashMap<SocketAddr, NodeConnection>,
}

impl Node {
    pub fn new(config: ClientConfig) -> Self {
        Node { config, remote_nodes: HashMap::new() }
    }

    pub async fn connect_with(&mut self, remote_addr: SocketAddr) -> PeerResult<VersionMessage> {
        let mut connection =
            NodeConnection::with_max_payload(self.config.chain, remote_addr, self.config.max_payload_bytes).await?;
        let local_addr = connection.local_addr()?;

        let handler = HandshakeInitConversationTopic::new(self.config.node_desc(), local_addr, remote_addr);
        let finished = connection.proceed_conversation(handler).await?;
        let peer_version = finished
            .peer_version()
            .cloned()
            .expect("handshake topic only finishes after receiving a peer version");

        self.remote_nodes.insert(remote_addr, connection);

        Ok(peer_version)
    }

    pub fn close_connection(&mut self, remote: SocketAddr) {
        // connection is closed by tokio when socket is dropped
        self.remote_nodes.remove(&remote);
    }
}
