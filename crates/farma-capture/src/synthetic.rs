//! In-process camera backend that renders a gradient test pattern.
//!
//! Used by the tests and by the binary on hosts without a platform camera.
//! Live streams are counted so leaked streams are observable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use farma_core::error::FarmaError;
use farma_core::types::Facing;

use crate::encode::Frame;
use crate::{CameraBackend, VideoStream};

/// Synthetic camera with configurable availability and warm-up.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    warmup_polls: u32,
    permission_granted: bool,
    has_front: bool,
    has_back: bool,
    live: Arc<AtomicUsize>,
    acquisitions: Arc<AtomicUsize>,
}

impl SyntheticCamera {
    /// A 640x480 camera with both facings that is ready immediately.
    pub fn new() -> Self {
        Self {
            width: 640,
            height: 480,
            warmup_polls: 0,
            permission_granted: true,
            has_front: true,
            has_back: true,
            live: Arc::new(AtomicUsize::new(0)),
            acquisitions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A camera whose permission prompt is always denied.
    pub fn denied() -> Self {
        Self {
            permission_granted: false,
            ..Self::new()
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Number of `poll_ready` calls that report not-ready before the first frame.
    pub fn with_warmup(mut self, polls: u32) -> Self {
        self.warmup_polls = polls;
        self
    }

    /// Remove the camera for one facing direction.
    pub fn without(mut self, facing: Facing) -> Self {
        match facing {
            Facing::Front => self.has_front = false,
            Facing::Back => self.has_back = false,
        }
        self
    }

    /// Streams acquired and not yet stopped.
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Total successful acquisitions since creation.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    fn has(&self, facing: Facing) -> bool {
        match facing {
            Facing::Front => self.has_front,
            Facing::Back => self.has_back,
        }
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for SyntheticCamera {
    type Stream = SyntheticStream;

    async fn acquire(&self, facing: Facing) -> Result<SyntheticStream, FarmaError> {
        if !self.permission_granted {
            warn!(%facing, "Synthetic camera permission denied");
            return Err(FarmaError::DeviceUnavailable(
                "camera permission denied".to_string(),
            ));
        }
        if !self.has(facing) {
            return Err(FarmaError::DeviceUnavailable(format!(
                "no {} camera",
                facing
            )));
        }

        self.live.fetch_add(1, Ordering::SeqCst);
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        debug!(%facing, live = self.live_streams(), "Synthetic stream acquired");

        Ok(SyntheticStream {
            facing,
            width: self.width,
            height: self.height,
            warmup_remaining: self.warmup_polls,
            frames_read: 0,
            stopped: false,
            live: Arc::clone(&self.live),
        })
    }
}

/// A stream produced by [`SyntheticCamera`].
#[derive(Debug)]
pub struct SyntheticStream {
    facing: Facing,
    width: u32,
    height: u32,
    warmup_remaining: u32,
    frames_read: u64,
    stopped: bool,
    live: Arc<AtomicUsize>,
}

impl SyntheticStream {
    pub fn facing(&self) -> Facing {
        self.facing
    }
}

impl VideoStream for SyntheticStream {
    fn poll_ready(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return false;
        }
        true
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_frame(&mut self) -> Result<Frame, FarmaError> {
        if self.stopped {
            return Err(FarmaError::Precondition("stream was stopped".to_string()));
        }
        let (w, h) = (self.width.max(1), self.height.max(1));
        let tint = (self.frames_read % 256) as u8;
        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                pixels.push((x * 255 / w) as u8);
                pixels.push((y * 255 / h) as u8);
                pixels.push(tint);
            }
        }
        self.frames_read += 1;
        Ok(Frame {
            width: self.width,
            height: self.height,
            pixels,
        })
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_denied_camera() {
        let camera = SyntheticCamera::denied();
        let err = camera.acquire(Facing::Back).await.unwrap_err();
        assert!(matches!(err, FarmaError::DeviceUnavailable(_)));
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_missing_facing() {
        let camera = SyntheticCamera::new().without(Facing::Front);
        let err = camera.acquire(Facing::Front).await.unwrap_err();
        assert_eq!(err.to_string(), "Camera unavailable: no front camera");
        assert!(camera.acquire(Facing::Back).await.is_ok());
    }

    #[tokio::test]
    async fn test_frame_matches_resolution() {
        let camera = SyntheticCamera::new().with_resolution(8, 6);
        let mut stream = camera.acquire(Facing::Back).await.unwrap();
        assert_eq!(stream.resolution(), (8, 6));
        let frame = stream.read_frame().unwrap();
        assert_eq!(frame.pixels.len(), frame.expected_len());
        assert_eq!((frame.width, frame.height), (8, 6));
    }

    #[tokio::test]
    async fn test_live_count_tracks_stop_and_drop() {
        let camera = SyntheticCamera::new();
        let mut a = camera.acquire(Facing::Back).await.unwrap();
        let b = camera.acquire(Facing::Front).await.unwrap();
        assert_eq!(camera.live_streams(), 2);

        a.stop();
        a.stop();
        assert_eq!(camera.live_streams(), 1);
        drop(a);
        assert_eq!(camera.live_streams(), 1);

        drop(b);
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(camera.acquisitions(), 2);
    }

    #[tokio::test]
    async fn test_read_after_stop_fails() {
        let camera = SyntheticCamera::new();
        let mut stream = camera.acquire(Facing::Back).await.unwrap();
        stream.stop();
        assert!(!stream.poll_ready());
        assert!(stream.read_frame().is_err());
    }
}
