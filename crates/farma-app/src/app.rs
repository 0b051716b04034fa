//! Interactive session: routes terminal commands to the chat components and
//! renders the transcript.
//!
//! A send only starts a turn. The gateway call is handed out as a
//! [`ReplyFuture`] for the input loop to drive next to stdin, and its result
//! comes back through [`App::finish_turn`]. Input keeps flowing while a reply
//! is outstanding, so a second send is rejected instead of queued.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{info, warn};

use farma_capture::{CameraBackend, MediaCaptureController};
use farma_chat::{
    AttachmentManager, ChatError, ChatGateway, InactivityMonitor, PendingTurn, RejectReason,
    RequestOrchestrator, Resolution, SessionStore,
};
use farma_core::clock::SharedClock;
use farma_core::config::FarmaConfig;
use farma_core::error::FarmaError;
use farma_core::types::{Facing, Message, MessageId, Origin};

use crate::commands::{image_mime_type, Command, HELP};

/// Outstanding gateway call for the current turn.
pub type ReplyFuture = Pin<Box<dyn Future<Output = Result<String, ChatError>> + Send>>;

/// Whether the loop should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App<G: ChatGateway + 'static, B: CameraBackend> {
    store: SessionStore,
    attachments: AttachmentManager,
    camera: MediaCaptureController<B>,
    monitor: InactivityMonitor,
    orchestrator: RequestOrchestrator<Arc<G>>,
    pending_turn: Option<PendingTurn>,
    dispatch: Option<ReplyFuture>,
    default_facing: Facing,
    rendered_up_to: Option<MessageId>,
    output: Vec<String>,
}

impl<G: ChatGateway + 'static, B: CameraBackend> App<G, B> {
    pub fn new(config: &FarmaConfig, gateway: G, backend: B, clock: SharedClock) -> Self {
        Self {
            store: SessionStore::new(config.session.greeting.clone(), clock.clone()),
            attachments: AttachmentManager::default(),
            camera: MediaCaptureController::new(backend, &config.camera),
            monitor: InactivityMonitor::new(clock, &config.inactivity),
            orchestrator: RequestOrchestrator::new(Arc::new(gateway), &config.session),
            pending_turn: None,
            dispatch: None,
            default_facing: config.camera.default_facing,
            rendered_up_to: None,
            output: Vec::new(),
        }
    }

    /// Lines produced since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Gateway call started by the last command, if any. The caller drives it
    /// and passes the result to [`App::finish_turn`].
    pub fn take_dispatch(&mut self) -> Option<ReplyFuture> {
        self.dispatch.take()
    }

    /// Queue any messages not yet shown.
    pub fn render_new_messages(&mut self) {
        let since = self.rendered_up_to;
        let lines: Vec<String> = self
            .store
            .messages()
            .iter()
            .filter(|m| since.map_or(true, |seen| m.id > seen))
            .map(format_message)
            .collect();
        self.output.extend(lines);
        self.rendered_up_to = self.store.last().map(|m| m.id);
    }

    /// Run the idle check. Called on the monitor's poll cadence.
    pub fn tick(&mut self) {
        if self.monitor.poll() {
            self.say(
                "¿Sigues ahí? Escribe /continue para seguir o /end para terminar la conversación.",
            );
        }
    }

    pub async fn handle(&mut self, command: Command) -> Flow {
        if command.is_activity() {
            self.monitor.record_activity();
        }

        match command {
            Command::Send(text) => self.send(&text),
            Command::AttachFile(path) => self.attach_file(&path),
            Command::OpenCamera => self.open_camera().await,
            Command::FlipCamera => self.flip_camera().await,
            Command::Capture => self.capture(),
            Command::CloseCamera => {
                self.camera.close();
                self.say("Cámara cerrada.");
            }
            Command::ClearAttachment => {
                self.attachments.clear();
                self.say("Imagen adjunta eliminada.");
            }
            Command::Reset => {
                self.store.reset();
                self.attachments.clear();
                self.say("Conversación reiniciada");
            }
            Command::Continue => self.monitor.resolve(Resolution::Continue, &mut self.store),
            Command::EndSession => {
                self.monitor.resolve(Resolution::EndSession, &mut self.store);
                self.attachments.clear();
                self.camera.close();
                self.say("Conversación reiniciada");
            }
            Command::Help => self.say(HELP),
            Command::Quit => {
                self.camera.close();
                return Flow::Quit;
            }
            Command::Unknown(name) => self.say(&format!("Comando desconocido: /{name}. Usa /help.")),
        }

        self.render_new_messages();
        Flow::Continue
    }

    /// Fold the gateway result for the outstanding turn into the session.
    pub fn finish_turn(&mut self, result: Result<String, ChatError>) {
        let Some(turn) = self.pending_turn.take() else {
            warn!("Gateway reply arrived with no turn outstanding");
            return;
        };
        let outcome = self.orchestrator.resolve(&mut self.store, turn, result);
        info!(outcome = ?outcome, "Turn finished");
        self.render_new_messages();
        if let Some(notice) = outcome.notice() {
            self.say(notice);
        }
    }

    fn send(&mut self, text: &str) {
        let turn = match self
            .orchestrator
            .prepare(&mut self.store, &mut self.attachments, text)
        {
            Ok(turn) => turn,
            Err(RejectReason::RequestInFlight) => {
                self.say("Espera a que FarmaIA termine de responder.");
                return;
            }
            Err(RejectReason::EmptyInput) => return,
        };

        let gateway = Arc::clone(self.orchestrator.gateway());
        let request = turn.request().clone();
        self.dispatch = Some(Box::pin(async move { gateway.complete(&request).await }));
        self.pending_turn = Some(turn);

        self.render_new_messages();
        self.say("FarmaIA está escribiendo...");
    }

    fn attach_file(&mut self, path: &Path) {
        let Some(mime_type) = image_mime_type(path) else {
            self.say("Solo se pueden adjuntar imágenes.");
            return;
        };
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read image file");
                self.say("No se pudo leer el archivo.");
                return;
            }
        };
        match self.attachments.attach_from_file(bytes, mime_type) {
            Ok(()) => self.say(&format!("Imagen adjunta: {}", path.display())),
            Err(e) => {
                warn!(error = %e, "Attachment rejected");
                self.say("El archivo está vacío.");
            }
        }
    }

    async fn open_camera(&mut self) {
        self.say("Iniciando cámara...");
        match self.camera.open(self.default_facing).await {
            Ok(()) => self.report_camera_ready(),
            Err(e) => self.camera_failed(e),
        }
    }

    async fn flip_camera(&mut self) {
        if !self.camera.is_open() {
            self.say("La cámara no está abierta.");
            return;
        }
        match self.camera.toggle_facing().await {
            Ok(_) => self.report_camera_ready(),
            Err(e) => self.camera_failed(e),
        }
    }

    fn capture(&mut self) {
        match self.camera.capture() {
            Ok(photo) => match self.attachments.attach_from_capture(photo.bytes, photo.mime_type) {
                Ok(()) => self.say(&format!(
                    "Foto capturada ({}x{}). Escribe tu consulta o /send.",
                    photo.width, photo.height
                )),
                Err(e) => warn!(error = %e, "Captured photo rejected"),
            },
            Err(FarmaError::Precondition(reason)) => {
                warn!(%reason, "Capture unavailable");
                self.say("La cámara todavía no está lista.");
            }
            Err(e) => {
                warn!(error = %e, "Capture failed");
                self.say("No se pudo capturar la foto.");
            }
        }
    }

    fn report_camera_ready(&mut self) {
        if self.camera.poll_ready() {
            let facing = match self.camera.facing() {
                Facing::Front => "frontal",
                Facing::Back => "trasera",
            };
            self.say(&format!("Cámara {facing} lista. Capturar Foto: /snap"));
        } else {
            self.say("La cámara todavía no está lista.");
        }
    }

    fn camera_failed(&mut self, error: FarmaError) {
        warn!(error = %error, "Camera unavailable");
        self.camera.close();
        self.say("No se pudo acceder a la cámara.");
    }

    fn say(&mut self, line: &str) {
        self.output.push(format!("* {line}"));
    }
}

fn format_message(message: &Message) -> String {
    let who = match message.origin {
        Origin::User => "Tú",
        Origin::Assistant => "FarmaIA",
    };
    match &message.attached_image {
        Some(image) => format!(
            "{who}: {} [imagen {}, {} bytes]",
            message.text,
            image.mime_type,
            image.len()
        ),
        None => format!("{who}: {}", message.text),
    }
}
