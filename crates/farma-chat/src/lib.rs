//! Conversation engine for FarmaChat.
//!
//! Holds the message history, the pending image attachment, the idle
//! monitor, and the single-flight orchestrator that talks to the remote
//! chat gateway.

pub mod attachment;
pub mod error;
pub mod gateway;
pub mod inactivity;
pub mod orchestrator;
pub mod store;

pub use attachment::{
    AttachmentManager, AttachmentSource, PendingAttachment, PreviewHandle, PreviewRegistry,
};
pub use error::ChatError;
pub use gateway::{
    ChatGateway, ConversationRequest, EncodedImage, GatewayRequest, GatewayResponse,
    HttpChatGateway, MockGateway,
};
pub use inactivity::{InactivityMonitor, InactivityState, Resolution};
pub use orchestrator::{PendingTurn, RejectReason, RequestOrchestrator, TurnOutcome};
pub use store::SessionStore;
