//! Camera view controller: open, toggle, capture, close.
//!
//! The controller holds at most one [`CaptureSession`]. Every exit path
//! (cancel, successful capture, toggle, drop) ends with the session dropped,
//! which stops its stream.

use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use farma_core::config::CameraConfig;
use farma_core::error::FarmaError;
use farma_core::types::Facing;

use crate::encode::{encode_jpeg, JPEG_MIME};
use crate::{CameraBackend, CaptureSession};

/// A still image produced by [`MediaCaptureController::capture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

/// Drives the lifecycle of the live camera view.
pub struct MediaCaptureController<B: CameraBackend> {
    backend: B,
    session: Option<CaptureSession<B::Stream>>,
    facing: Facing,
    jpeg_quality: u8,
    settle_delay: Duration,
}

impl<B: CameraBackend> MediaCaptureController<B> {
    pub fn new(backend: B, config: &CameraConfig) -> Self {
        Self {
            backend,
            session: None,
            facing: config.default_facing,
            jpeg_quality: config.jpeg_quality,
            settle_delay: config.settle_delay(),
        }
    }

    /// Facing direction of the current stream, or of the last one that opened.
    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(CaptureSession::id)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Acquire a stream for `facing`, replacing any open one.
    ///
    /// On `DeviceUnavailable` no session is left open; the caller is expected
    /// to close the camera view. There is no automatic retry.
    pub async fn open(&mut self, facing: Facing) -> Result<(), FarmaError> {
        self.close();

        match self.backend.acquire(facing).await {
            Ok(stream) => {
                self.facing = facing;
                let session = CaptureSession::start(stream, facing);
                info!(session_id = %session.id(), %facing, "Camera opened");
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!(%facing, error = %e, "Camera unavailable");
                Err(match e {
                    FarmaError::DeviceUnavailable(reason) => FarmaError::DeviceUnavailable(reason),
                    other => FarmaError::DeviceUnavailable(other.to_string()),
                })
            }
        }
    }

    /// Switch to the opposite facing direction.
    ///
    /// The current stream is fully stopped, then after the settle delay a new
    /// one is acquired. At no point are two streams live.
    pub async fn toggle_facing(&mut self) -> Result<Facing, FarmaError> {
        let next = self.facing.opposite();
        self.close();
        tokio::time::sleep(self.settle_delay).await;
        self.open(next).await?;
        Ok(next)
    }

    /// Poll the open stream for its first frame.
    pub fn poll_ready(&mut self) -> bool {
        self.session
            .as_mut()
            .map(CaptureSession::poll_ready)
            .unwrap_or(false)
    }

    /// Whether the capture affordance should be enabled.
    pub fn can_capture(&self) -> bool {
        self.session
            .as_ref()
            .map(CaptureSession::is_ready)
            .unwrap_or(false)
    }

    /// Grab the current frame as a JPEG and close the camera.
    ///
    /// Rejected with `FarmaError::Precondition` when no stream is open or the
    /// stream has not produced a frame yet. On encoding failure the camera
    /// stays open so the user can retry or cancel.
    pub fn capture(&mut self) -> Result<CapturedImage, FarmaError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| FarmaError::Precondition("camera is not open".to_string()))?;

        if !session.poll_ready() {
            return Err(FarmaError::Precondition(
                "camera stream is not ready".to_string(),
            ));
        }

        let frame = session.read_frame()?;
        let bytes = encode_jpeg(&frame, self.jpeg_quality)?;
        info!(
            session_id = %session.id(),
            width = frame.width,
            height = frame.height,
            bytes = bytes.len(),
            "Photo captured"
        );

        self.close();

        Ok(CapturedImage {
            bytes,
            mime_type: JPEG_MIME.to_string(),
            width: frame.width,
            height: frame.height,
        })
    }

    /// Release the camera. Safe to call when nothing is open.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            info!(session_id = %session.id(), "Camera closed");
            drop(session);
        }
    }
}

impl<B: CameraBackend> Drop for MediaCaptureController<B> {
    fn drop(&mut self) {
        self.close();
    }
}
