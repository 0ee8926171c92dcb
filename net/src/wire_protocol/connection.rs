use std::net::SocketAddr;

use log::{debug, trace, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::conversation::ConversationTopicHandler;
use crate::error::{PeerError, PeerResult};
use crate::wire_protocol::framer::{FrameOutcome, Framer};
use crate::wire_protocol::node::Chain;
use crate::wire_protocol::raw_message::RawMessage;

/// A single connection to a peer, driving a [`ConversationTopicHandler`]
/// over a [`Framer`]-buffered TCP stream.
pub struct NodeConnection {
    chain: Chain,
    socket: TcpStream,
    framer: Framer,
}

impl NodeConnection {
    pub async fn new(chain: Chain, addr: SocketAddr) -> std::io::Result<Self> {
        let socket = TcpStream::connect(addr).await?;
        Ok(NodeConnection { chain, socket, framer: Framer::new() })
    }

    pub async fn with_max_payload(chain: Chain, addr: SocketAddr, max_payload: u32) -> std::io::Result<Self> {
        let socket = TcpStream::connect(addr).await?;
        Ok(NodeConnection { chain, socket, framer: Framer::with_max_payload(max_payload) })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    async fn send(&mut self, raw: RawMessage) -> PeerResult<()> {
        debug!("sending {:?}", raw.command);
        self.socket.write_all(&Framer::encode(&raw)).await?;
        Ok(())
    }

    /// Runs `handler` to completion: sends its initial action, then reads
    /// and dispatches frames until the handler reports the topic finished
    /// or the peer disconnects.
    pub async fn proceed_conversation<H: ConversationTopicHandler>(&mut self, mut handler: H) -> PeerResult<H> {
        let initial_action = handler.initial_action();
        if let Some(message) = initial_action.message {
            self.send(RawMessage::new(self.chain, &message)).await?;
        }
        if initial_action.topic_finished {
            return Ok(handler.outcome());
        }

        let mut read_buf = [0u8; 4096];
        loop {
            loop {
                match self.framer.extract()? {
                    FrameOutcome::NeedMore => break,
                    FrameOutcome::BadChecksum { header } => {
                        warn!("discarding frame with bad checksum for command {:?}", header.command);
                    }
                    FrameOutcome::Frame(raw) => {
                        let Some(message) = raw.to_protocol_message()? else {
                            trace!("ignoring unrecognized command {:?}", raw.command);
                            continue;
                        };
                        let response = handler.on_message(message)?;
                        if let Some(reply) = response.message {
                            self.send(RawMessage::new(self.chain, &reply)).await?;
                        }
                        if response.topic_finished {
                            return Ok(handler.outcome());
                        }
                    }
                }
            }

            let n = self.socket.read(&mut read_buf).await?;
            if n == 0 {
                return Err(PeerError::Disconnected);
            }
            self.framer.ingest(&read_buf[..n]);
        }
    }
}
