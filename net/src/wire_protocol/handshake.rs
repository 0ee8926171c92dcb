use std::net::SocketAddr;

use log::{debug, info, warn};

use crate::conversation::{ConversationAction, ConversationTopicHandler};
use crate::error::PeerResult;
use crate::wire_protocol::messages::{PongMessage, ProtocolMessage, VersionMessage};
use crate::wire_protocol::node::NodeDesc;

/// Drives the version/verack handshake and, once it's finished, keeps
/// answering `ping` with a matching `pong` for as long as the connection
/// is handed to it.
pub struct HandshakeInitConversationTopic {
    me: NodeDesc,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    sent_version: bool,
    received_version: Option<VersionMessage>,
    received_verack: bool,
}

impl HandshakeInitConversationTopic {
    pub fn new(me: NodeDesc, local_addr: SocketAddr, remote_addr: SocketAddr) -> Self {
        HandshakeInitConversationTopic {
            me,
            local_addr,
            remote_addr,
            sent_version: false,
            received_version: None,
            received_verack: false,
        }
    }

    pub fn peer_version(&self) -> Option<&VersionMessage> {
        self.received_version.as_ref()
    }

    fn handshake_complete(&self) -> bool {
        self.received_version.is_some() && self.received_verack
    }
}

impl ConversationTopicHandler for HandshakeInitConversationTopic {
    fn initial_action(&mut self) -> ConversationAction {
        let version = VersionMessage::new(self.remote_addr, self.local_addr, &self.me);
        self.sent_version = true;
        info!("sending version to {}: {:?}", self.remote_addr, version);
        ConversationAction::send(ProtocolMessage::Version(version))
    }

    fn on_message(&mut self, message: ProtocolMessage) -> PeerResult<ConversationAction> {
        match message {
            ProtocolMessage::Version(version) => {
                info!("received version from {}: protocol={}, agent={}", self.remote_addr, version.protocol_version, version.user_agent);
                self.received_version = Some(version);
                let action = ConversationAction::send(ProtocolMessage::Verack);
                Ok(if self.handshake_complete() {
                    ConversationAction { topic_finished: true, ..action }
                } else {
                    action
                })
            }
            ProtocolMessage::Verack => {
                debug!("received verack from {}", self.remote_addr);
                self.received_verack = true;
                Ok(if self.handshake_complete() {
                    ConversationAction::finish()
                } else {
                    ConversationAction::none()
                })
            }
            ProtocolMessage::Ping(ping) => {
                debug!("received ping (nonce={}) from {}, replying pong", ping.nonce, self.remote_addr);
                Ok(ConversationAction::send(ProtocolMessage::Pong(PongMessage::reply_to(&ping))))
            }
            ProtocolMessage::Pong(pong) => {
                debug!("received pong (nonce={}) from {}", pong.nonce, self.remote_addr);
                Ok(ConversationAction::none())
            }
            other => {
                warn!("ignoring unexpected message during handshake from {}: {:?}", self.remote_addr, other.command());
                Ok(ConversationAction::none())
            }
        }
    }
}
