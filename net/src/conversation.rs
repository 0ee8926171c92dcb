use crate::wire_protocol::messages::ProtocolMessage;

/// What a [`ConversationTopicHandler`] wants to happen next: optionally
/// send a message, and declare whether the topic considers itself done.
pub struct ConversationAction {
    pub message: Option<ProtocolMessage>,
    pub topic_finished: bool,
}

impl ConversationAction {
    pub fn send(message: ProtocolMessage) -> Self {
        ConversationAction { message: Some(message), topic_finished: false }
    }

    pub fn send_and_finish(message: ProtocolMessage) -> Self {
        ConversationAction { message: Some(message), topic_finished: true }
    }

    pub fn none() -> Self {
        ConversationAction { message: None, topic_finished: false }
    }

    pub fn finish() -> Self {
        ConversationAction { message: None, topic_finished: true }
    }
}

/// A small protocol state machine driven by [`crate::wire_protocol::connection::NodeConnection`].
/// Each incoming message is offered to `on_message`; the handler replies
/// with an action describing what, if anything, to send back and whether
/// the topic (e.g. the handshake) has run its course.
pub trait ConversationTopicHandler {
    /// The first action to take before any message has been received
    /// (e.g. sending the initial `version`).
    fn initial_action(&mut self) -> ConversationAction;

    fn on_message(&mut self, message: ProtocolMessage) -> crate::error::PeerResult<ConversationAction>;

    /// Called once the topic finishes; lets the handler hand back
    /// whatever state it accumulated (e.g. the negotiated peer version).
    fn outcome(self) -> Self
    where
        Self: Sized,
    {
        self
    }
}
