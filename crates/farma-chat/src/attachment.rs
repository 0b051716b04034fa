//! The single pending-image slot and its preview handles.
//!
//! A preview handle stands for a display resource (an object URL, a texture)
//! that must be freed. Handles unregister themselves from the
//! [`PreviewRegistry`] when dropped, so replacing, consuming or clearing an
//! attachment always frees its preview.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use uuid::Uuid;

use farma_core::error::FarmaError;
use farma_core::types::ImageRef;

/// Tracks which preview handles are live.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<Mutex<HashSet<Uuid>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new preview handle.
    pub fn create(&self) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.live
            .lock()
            .expect("preview registry mutex poisoned")
            .insert(id);
        debug!(preview_id = %id, "Preview created");
        PreviewHandle {
            id,
            registry: self.clone(),
        }
    }

    pub fn live_count(&self) -> usize {
        self.live
            .lock()
            .expect("preview registry mutex poisoned")
            .len()
    }

    pub fn is_live(&self, id: Uuid) -> bool {
        self.live
            .lock()
            .expect("preview registry mutex poisoned")
            .contains(&id)
    }

    fn release(&self, id: Uuid) {
        let removed = self
            .live
            .lock()
            .expect("preview registry mutex poisoned")
            .remove(&id);
        if removed {
            debug!(preview_id = %id, "Preview released");
        }
    }
}

/// A live preview. Released on drop.
pub struct PreviewHandle {
    id: Uuid,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle").field("id", &self.id).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

/// Where an attachment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentSource {
    File,
    Capture,
}

impl fmt::Display for AttachmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentSource::File => write!(f, "file"),
            AttachmentSource::Capture => write!(f, "capture"),
        }
    }
}

/// An image waiting to be sent.
#[derive(Debug)]
pub struct PendingAttachment {
    bytes: Arc<[u8]>,
    mime_type: String,
    source: AttachmentSource,
    preview: PreviewHandle,
}

impl PendingAttachment {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn source(&self) -> AttachmentSource {
        self.source
    }

    pub fn preview_id(&self) -> Uuid {
        self.preview.id()
    }

    /// Shared reference to the image for display in a sent message.
    pub fn image_ref(&self) -> ImageRef {
        ImageRef::new(self.mime_type.clone(), Arc::clone(&self.bytes))
    }
}

/// Owns at most one pending attachment.
#[derive(Debug, Default)]
pub struct AttachmentManager {
    registry: PreviewRegistry,
    pending: Option<PendingAttachment>,
}

impl AttachmentManager {
    pub fn new(registry: PreviewRegistry) -> Self {
        Self {
            registry,
            pending: None,
        }
    }

    /// Attach an image picked from storage. Replaces any pending attachment.
    pub fn attach_from_file(
        &mut self,
        bytes: impl Into<Arc<[u8]>>,
        mime_type: impl Into<String>,
    ) -> Result<(), FarmaError> {
        self.attach(bytes.into(), mime_type.into(), AttachmentSource::File)
    }

    /// Attach a photo taken with the camera. Replaces any pending attachment.
    pub fn attach_from_capture(
        &mut self,
        bytes: impl Into<Arc<[u8]>>,
        mime_type: impl Into<String>,
    ) -> Result<(), FarmaError> {
        self.attach(bytes.into(), mime_type.into(), AttachmentSource::Capture)
    }

    /// Drop the pending attachment, if any.
    pub fn clear(&mut self) {
        if let Some(previous) = self.pending.take() {
            debug!(preview_id = %previous.preview_id(), "Attachment cleared");
        }
    }

    /// Take the pending attachment, leaving the slot empty.
    pub fn consume(&mut self) -> Option<PendingAttachment> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<&PendingAttachment> {
        self.pending.as_ref()
    }

    pub fn has_attachment(&self) -> bool {
        self.pending.is_some()
    }

    pub fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }

    fn attach(
        &mut self,
        bytes: Arc<[u8]>,
        mime_type: String,
        source: AttachmentSource,
    ) -> Result<(), FarmaError> {
        if bytes.is_empty() {
            return Err(FarmaError::Precondition(
                "attached image has no data".to_string(),
            ));
        }

        // Free the old preview before allocating the new one.
        self.clear();
        let preview = self.registry.create();
        info!(
            %source,
            mime_type = %mime_type,
            bytes = bytes.len(),
            preview_id = %preview.id(),
            "Image attached"
        );
        self.pending = Some(PendingAttachment {
            bytes,
            mime_type,
            source,
            preview,
        });
        Ok(())
    }
}
