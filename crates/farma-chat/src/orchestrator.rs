//! Request orchestrator: turns user input into a gateway call and folds the
//! result back into the conversation.
//!
//! A turn runs in two phases. [`RequestOrchestrator::prepare`] validates the
//! input, appends the user message and marks the session loading.
//! [`RequestOrchestrator::resolve`] appends the reply (or the fixed failure
//! message) and clears loading. [`RequestOrchestrator::submit`] runs both
//! around the gateway call.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use tracing::{debug, info, warn};

use farma_core::config::SessionConfig;
use farma_core::types::{MessageId, Origin};

use crate::attachment::{AttachmentManager, PendingAttachment};
use crate::error::ChatError;
use crate::gateway::{ChatGateway, ConversationRequest, EncodedImage};
use crate::store::SessionStore;

/// Why a submit did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No text after trimming and no attachment.
    EmptyInput,
    /// A request is already outstanding.
    RequestInFlight,
}

/// What a submit did to the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing was appended.
    Rejected(RejectReason),
    /// The gateway replied; `reply` is the assistant message.
    Answered {
        user: MessageId,
        reply: MessageId,
        image_analyzed: bool,
    },
    /// The gateway failed; `reply` is the fixed failure message.
    Failed { user: MessageId, reply: MessageId },
    /// The session was reset while the request was in flight; the result was
    /// dropped.
    Discarded { turn: u64 },
}

impl TurnOutcome {
    /// Short status line for the UI, if the outcome warrants one.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            TurnOutcome::Answered {
                image_analyzed: true,
                ..
            } => Some("Imagen analizada correctamente"),
            TurnOutcome::Failed { .. } => Some("Error procesando mensaje"),
            _ => None,
        }
    }
}

/// A turn whose user message is appended but whose reply is outstanding.
#[derive(Debug)]
pub struct PendingTurn {
    seq: u64,
    epoch: u64,
    user_message: MessageId,
    request: ConversationRequest,
}

impl PendingTurn {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn user_message(&self) -> MessageId {
        self.user_message
    }

    pub fn request(&self) -> &ConversationRequest {
        &self.request
    }
}

/// Clears the in-flight markers if a submit is abandoned mid-await.
struct TurnGuard<'a> {
    store: &'a mut SessionStore,
    in_flight: &'a mut Option<u64>,
    seq: u64,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if *self.in_flight == Some(self.seq) {
            warn!(turn = self.seq, "Turn abandoned before the gateway replied");
            *self.in_flight = None;
            self.store.set_loading(false);
        }
    }
}

/// Single-flight dispatcher between the session and the gateway.
pub struct RequestOrchestrator<G: ChatGateway> {
    gateway: G,
    image_prompt: String,
    failure_message: String,
    next_seq: u64,
    in_flight: Option<u64>,
}

impl<G: ChatGateway> RequestOrchestrator<G> {
    pub fn new(gateway: G, config: &SessionConfig) -> Self {
        Self {
            gateway,
            image_prompt: config.image_prompt.clone(),
            failure_message: config.failure_message.clone(),
            next_seq: 1,
            in_flight: None,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Validate input and start a turn.
    ///
    /// On success the user message is already in `store`, loading is set and
    /// the attachment has been consumed.
    pub fn prepare(
        &mut self,
        store: &mut SessionStore,
        attachments: &mut AttachmentManager,
        input: &str,
    ) -> Result<PendingTurn, RejectReason> {
        if self.in_flight.is_some() || store.is_loading() {
            debug!("Submit ignored: request already in flight");
            return Err(RejectReason::RequestInFlight);
        }

        let text = input.trim();
        if text.is_empty() && !attachments.has_attachment() {
            debug!("Submit ignored: empty input");
            return Err(RejectReason::EmptyInput);
        }

        let attachment = attachments.consume();
        let user_text = if text.is_empty() {
            self.image_prompt.clone()
        } else {
            text.to_string()
        };

        // Prior entries only; the current turn travels as `user_text`.
        let history = store.history();
        let image = attachment.as_ref().map(encode_attachment);
        let user_message = store.append(
            Origin::User,
            user_text.clone(),
            attachment.as_ref().map(PendingAttachment::image_ref),
        );
        // Sent images are never resent; the preview goes with the attachment.
        drop(attachment);
        store.set_loading(true);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight = Some(seq);

        info!(
            turn = seq,
            message_id = %user_message,
            has_image = image.is_some(),
            history = history.len(),
            "Turn started"
        );

        Ok(PendingTurn {
            seq,
            epoch: store.epoch(),
            user_message,
            request: ConversationRequest {
                user_text,
                history,
                image,
            },
        })
    }

    /// Finish a turn with the gateway's result.
    pub fn resolve(
        &mut self,
        store: &mut SessionStore,
        turn: PendingTurn,
        result: Result<String, ChatError>,
    ) -> TurnOutcome {
        Self::settle(store, &mut self.in_flight, &self.failure_message, turn, result)
    }

    /// Run a full turn: prepare, call the gateway, resolve.
    ///
    /// Never returns an error; gateway failures become a conversation message.
    pub async fn submit(
        &mut self,
        store: &mut SessionStore,
        attachments: &mut AttachmentManager,
        input: &str,
    ) -> TurnOutcome {
        let turn = match self.prepare(store, attachments, input) {
            Ok(turn) => turn,
            Err(reason) => return TurnOutcome::Rejected(reason),
        };

        let guard = TurnGuard {
            store,
            in_flight: &mut self.in_flight,
            seq: turn.seq,
        };
        let result = self.gateway.complete(&turn.request).await;
        Self::settle(
            &mut *guard.store,
            &mut *guard.in_flight,
            &self.failure_message,
            turn,
            result,
        )
    }

    fn settle(
        store: &mut SessionStore,
        in_flight: &mut Option<u64>,
        failure_message: &str,
        turn: PendingTurn,
        result: Result<String, ChatError>,
    ) -> TurnOutcome {
        let current = *in_flight == Some(turn.seq);
        if current {
            *in_flight = None;
        }

        if !current || turn.epoch != store.epoch() {
            warn!(
                turn = turn.seq,
                epoch = turn.epoch,
                current_epoch = store.epoch(),
                "Discarding reply for superseded turn"
            );
            return TurnOutcome::Discarded { turn: turn.seq };
        }

        store.set_loading(false);

        match result {
            Ok(text) => {
                let reply = store.append(Origin::Assistant, text, None);
                info!(turn = turn.seq, message_id = %reply, "Turn answered");
                TurnOutcome::Answered {
                    user: turn.user_message,
                    reply,
                    image_analyzed: turn.request.has_image(),
                }
            }
            Err(e) => {
                warn!(turn = turn.seq, error = %e, "Turn failed");
                let reply = store.append(Origin::Assistant, failure_message, None);
                TurnOutcome::Failed {
                    user: turn.user_message,
                    reply,
                }
            }
        }
    }
}

fn encode_attachment(attachment: &PendingAttachment) -> EncodedImage {
    EncodedImage {
        mime_type: attachment.mime_type().to_string(),
        base64_payload: BASE64_STANDARD.encode(attachment.bytes()),
    }
}
