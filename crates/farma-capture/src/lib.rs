//! FarmaChat Capture crate - camera stream lifecycle and still-image capture.
//!
//! Provides the [`CameraBackend`] / [`VideoStream`] traits that abstract over the
//! platform camera, a scoped [`CaptureSession`] that always stops its stream when
//! dropped, the [`MediaCaptureController`] that drives open/toggle/capture/close,
//! and a [`SyntheticCamera`] backend for tests and camera-less hosts.

pub mod controller;
pub mod encode;
pub mod synthetic;

use std::future::Future;

use tracing::debug;
use uuid::Uuid;

use farma_core::error::FarmaError;
use farma_core::types::Facing;

pub use controller::{CapturedImage, MediaCaptureController};
pub use encode::{encode_jpeg, Frame, JPEG_MIME};
pub use synthetic::{SyntheticCamera, SyntheticStream};

/// Source of camera video streams.
///
/// Acquisition may suspend indefinitely while the platform waits for the user
/// to grant permission; there is no way to abort it mid-flight.
pub trait CameraBackend: Send + Sync {
    type Stream: VideoStream;

    /// Acquire a stream for the requested facing direction.
    ///
    /// Fails with `FarmaError::DeviceUnavailable` when permission is denied or
    /// no matching camera exists.
    fn acquire(
        &self,
        facing: Facing,
    ) -> impl Future<Output = Result<Self::Stream, FarmaError>> + Send;
}

/// A live device video stream.
pub trait VideoStream: Send {
    /// Returns `true` once the stream has produced at least one frame.
    fn poll_ready(&mut self) -> bool;

    /// Native resolution as `(width, height)`.
    fn resolution(&self) -> (u32, u32);

    /// Grab the current frame as packed RGB8.
    fn read_frame(&mut self) -> Result<Frame, FarmaError>;

    /// Release the underlying device. Must be idempotent.
    fn stop(&mut self);
}

/// An open camera stream plus its readiness state.
///
/// The session owns the stream exclusively. Dropping the session stops the
/// stream, so every exit path releases the device.
pub struct CaptureSession<S: VideoStream> {
    id: Uuid,
    facing: Facing,
    stream: S,
    ready: bool,
    stopped: bool,
}

impl<S: VideoStream> CaptureSession<S> {
    /// Wrap a freshly acquired stream. The session starts not ready.
    pub fn start(stream: S, facing: Facing) -> Self {
        let id = Uuid::new_v4();
        debug!(session_id = %id, %facing, "Capture session started");
        Self {
            id,
            facing,
            stream,
            ready: false,
            stopped: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    /// Whether a ready frame has been observed. Does not poll the stream.
    pub fn is_ready(&self) -> bool {
        self.ready && !self.stopped
    }

    /// Poll the stream and latch readiness once it reports a frame.
    pub fn poll_ready(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        if !self.ready && self.stream.poll_ready() {
            debug!(session_id = %self.id, "Camera stream ready");
            self.ready = true;
        }
        self.ready
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.stream.resolution()
    }

    /// Read the current frame. Only valid once the session is ready.
    pub fn read_frame(&mut self) -> Result<Frame, FarmaError> {
        if !self.is_ready() {
            return Err(FarmaError::Precondition(
                "camera stream is not ready".to_string(),
            ));
        }
        self.stream.read_frame()
    }

    /// Stop the stream. Safe to call more than once.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stream.stop();
        self.stopped = true;
        self.ready = false;
        debug!(session_id = %self.id, facing = %self.facing, "Capture session stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl<S: VideoStream> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
