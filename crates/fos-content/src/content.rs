//! Content entries
//!
//! A `Content` wraps one resource: its raw bytes, the handler decoding
//! them and the lifecycle status. Every handler call goes through here so
//! the state machine is enforced in one place:
//!
//! ```text
//! Empty --create--> Fetching --process_data--> Fetching
//!                   Fetching --convert--> Ready | Error
//!                   Ready --reformat/revive/redraw--> Ready
//! any --destroy--> Destroyed
//! ```

use std::cell::RefCell;
use std::fmt;

use fos_render::Plotter;

use crate::handler::{Extent, Handler, HandlerDescriptor, RedrawParams};
use crate::registry::{normalize_mime, HandlerRegistry};
use crate::{ContentError, ResourceId, Result};

/// Lifecycle status of a content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Created, no bytes accepted yet
    Empty,
    /// Accepting bytes
    Fetching,
    /// Converted and presentable
    Ready,
    /// Conversion failed
    Error,
    /// Resources released; unusable
    Destroyed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty",
            Self::Fetching => "fetching",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Destroyed => "destroyed",
        })
    }
}

/// Lifecycle operation, used in state errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    ProcessData,
    Convert,
    Revive,
    Reformat,
    Redraw,
    Destroy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::ProcessData => "process data for",
            Self::Convert => "convert",
            Self::Revive => "revive",
            Self::Reformat => "reformat",
            Self::Redraw => "redraw",
            Self::Destroy => "destroy",
        })
    }
}

/// Notification broadcast to content listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentEvent {
    /// Bytes are about to arrive
    Loading,
    /// Conversion succeeded; the content can be presented
    Ready,
    /// Loading finished
    Done,
    /// Conversion failed
    Error(String),
    /// Layout changed; carries the new intrinsic size
    Reformat { width: u32, height: u32 },
    /// Content needs repainting
    Redraw,
    /// Content was destroyed
    Destroyed,
}

/// Registration token returned by `add_listener`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&ContentEvent)>;

/// A resource and its decoded state
pub struct Content {
    id: ResourceId,
    mime_type: String,
    descriptor: &'static HandlerDescriptor,
    handler: Option<Box<dyn Handler>>,
    source: Vec<u8>,
    status: Status,
    status_message: String,
    extent: Extent,
    available: (u32, u32),
    failure: Option<ContentError>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    pending: Vec<ContentEvent>,
    dispatching: bool,
    removed: Vec<ListenerId>,
}

impl Content {
    /// Create an empty content bound to the handler registered for
    /// `mime_type`
    pub fn new(id: impl Into<ResourceId>, mime_type: &str, registry: &HandlerRegistry) -> Result<Self> {
        let id = id.into();
        let mime_type = normalize_mime(mime_type);
        let descriptor = registry
            .lookup(&mime_type)
            .ok_or_else(|| ContentError::UnsupportedType(mime_type.clone()))?;
        let handler = registry.instantiate(descriptor);
        tracing::debug!("New {} content for {} ({})", descriptor.name, id, mime_type);

        Ok(Self {
            id,
            mime_type,
            descriptor,
            handler: Some(handler),
            source: Vec::new(),
            status: Status::Empty,
            status_message: String::new(),
            extent: Extent::default(),
            available: (0, 0),
            failure: None,
            listeners: Vec::new(),
            next_listener: 0,
            pending: Vec::new(),
            dispatching: false,
            removed: Vec::new(),
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Prepare to receive bytes
    pub fn create(&mut self) -> Result<()> {
        self.require(Operation::Create, Status::Empty)?;
        let created = self.handler_mut()?.create();
        if let Err(err) = created {
            return Err(self.fail(err));
        }
        self.status = Status::Fetching;
        self.status_message = "Loading".into();
        self.pending.push(ContentEvent::Loading);
        Ok(())
    }

    /// Append a chunk and advance decoding
    pub fn process_data(&mut self, chunk: &[u8]) -> Result<()> {
        self.require(Operation::ProcessData, Status::Fetching)?;
        self.source.extend_from_slice(chunk);
        let processed = self.handler_mut()?.process_data(chunk);
        if let Err(err) = processed {
            return Err(self.fail(err));
        }
        Ok(())
    }

    /// Finish decoding for a `width` x `height` viewport.
    ///
    /// Converting again is a no-op that returns the first outcome.
    pub fn convert(&mut self, width: u32, height: u32) -> Result<()> {
        match self.status {
            Status::Fetching => {}
            Status::Ready => return Ok(()),
            Status::Error => {
                return Err(self
                    .failure
                    .clone()
                    .unwrap_or_else(|| ContentError::ConversionFailed(self.status_message.clone())));
            }
            Status::Destroyed => return Err(ContentError::Destroyed),
            status => return Err(ContentError::InvalidState { op: Operation::Convert, status }),
        }

        self.status_message = "Processing".into();
        self.available = (width, height);
        let Some(handler) = self.handler.as_deref_mut() else {
            return Err(ContentError::Destroyed);
        };

        match handler.convert(&self.source, width, height) {
            Ok(extent) => {
                self.extent = extent;
                self.status = Status::Ready;
                self.status_message = "Done".into();
                self.pending.push(ContentEvent::Ready);
                self.pending.push(ContentEvent::Done);
                tracing::info!(
                    "Converted {} ({} bytes) to {}x{}",
                    self.id,
                    self.source.len(),
                    extent.width,
                    extent.height
                );
                Ok(())
            }
            Err(err) => {
                let err = match err {
                    failed @ ContentError::ConversionFailed(_) => failed,
                    other => ContentError::ConversionFailed(other.to_string()),
                };
                Err(self.fail(err))
            }
        }
    }

    /// Re-derive presentation for a new size after reuse from the cache
    pub fn revive(&mut self, width: u32, height: u32) -> Result<()> {
        self.require(Operation::Revive, Status::Ready)?;
        self.available = (width, height);
        self.extent = self.handler_mut()?.revive(width, height)?;
        self.push_reformat();
        Ok(())
    }

    /// Lay out again for a new size
    pub fn reformat(&mut self, width: u32, height: u32) -> Result<()> {
        self.require(Operation::Reformat, Status::Ready)?;
        self.available = (width, height);
        if self.descriptor.can_reformat {
            self.extent = self.handler_mut()?.reformat(width, height)?;
        }
        self.push_reformat();
        Ok(())
    }

    /// Paint into `plotter`
    pub fn redraw(&self, plotter: &mut dyn Plotter, params: &RedrawParams) -> Result<()> {
        self.require(Operation::Redraw, Status::Ready)?;
        self.handler
            .as_deref()
            .ok_or(ContentError::Destroyed)?
            .redraw(plotter, params)
    }

    /// Release the handler and buffered bytes. Safe in any state.
    pub fn destroy(&mut self) {
        if self.status == Status::Destroyed {
            return;
        }
        if let Some(mut handler) = self.handler.take() {
            handler.destroy();
        }
        self.source = Vec::new();
        self.status = Status::Destroyed;
        self.status_message.clear();
        self.pending.push(ContentEvent::Destroyed);
        tracing::debug!("Destroyed {}", self.id);
    }

    /// Advance animations; returns true when a redraw was requested
    pub fn tick(&mut self, elapsed_ms: u32) -> bool {
        if self.status != Status::Ready {
            return false;
        }
        let redraw = self
            .handler
            .as_deref_mut()
            .is_some_and(|handler| handler.tick(elapsed_ms));
        if redraw {
            self.pending.push(ContentEvent::Redraw);
        }
        redraw
    }

    fn require(&self, op: Operation, expected: Status) -> Result<()> {
        match self.status {
            status if status == expected => Ok(()),
            Status::Destroyed => Err(ContentError::Destroyed),
            status => Err(ContentError::InvalidState { op, status }),
        }
    }

    fn handler_mut(&mut self) -> Result<&mut (dyn Handler + 'static)> {
        self.handler.as_deref_mut().ok_or(ContentError::Destroyed)
    }

    fn fail(&mut self, err: ContentError) -> ContentError {
        tracing::warn!("{} failed: {}", self.id, err);
        self.status = Status::Error;
        self.status_message = format!("Error: {}", err);
        self.failure = Some(err.clone());
        self.pending.push(ContentEvent::Error(err.to_string()));
        err
    }

    fn push_reformat(&mut self) {
        self.pending.push(ContentEvent::Reformat {
            width: self.extent.width,
            height: self.extent.height,
        });
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a callback for lifecycle events
    pub fn add_listener(&mut self, listener: impl FnMut(&ContentEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a callback; returns false if it was not registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        if let Some(pos) = self.listeners.iter().position(|(l, _)| *l == id) {
            drop(self.listeners.remove(pos));
            return true;
        }
        if self.dispatching && id.0 < self.next_listener {
            self.removed.push(id);
            return true;
        }
        false
    }

    /// Deliver queued events to listeners
    pub fn flush_events(&mut self) {
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            for (_, listener) in self.listeners.iter_mut() {
                listener(event);
            }
        }
    }

    /// Events not yet delivered
    pub fn pending_events(&self) -> &[ContentEvent] {
        &self.pending
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Name of the handler serving this content
    pub fn handler_name(&self) -> &'static str {
        self.descriptor.name
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Human readable progress message
    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Raw bytes received so far
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Intrinsic size; zero until converted
    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn width(&self) -> u32 {
        self.extent.width
    }

    pub fn height(&self) -> u32 {
        self.extent.height
    }

    /// Size most recently passed to convert, reformat or revive
    pub fn available_size(&self) -> (u32, u32) {
        self.available
    }

    pub fn title(&self) -> Option<&str> {
        self.handler.as_deref().and_then(|h| h.title())
    }

    pub fn can_reformat(&self) -> bool {
        self.descriptor.can_reformat
    }

    /// Error recorded by a failed conversion
    pub fn error(&self) -> Option<&ContentError> {
        self.failure.as_ref()
    }

    /// Raw bytes plus the handler's decoded size
    pub fn size_estimate(&self) -> usize {
        self.source.len() + self.handler.as_deref().map_or(0, |h| h.size_estimate())
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content")
            .field("id", &self.id)
            .field("mime_type", &self.mime_type)
            .field("handler", &self.descriptor.name)
            .field("status", &self.status)
            .field("extent", &self.extent)
            .field("bytes", &self.source.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Deliver queued events with no borrow of the content held, so that
/// listeners may use handles to the same content.
pub(crate) fn dispatch_events(content: &RefCell<Content>) {
    loop {
        let (events, mut listeners) = {
            let Ok(mut inner) = content.try_borrow_mut() else {
                return;
            };
            // Nested dispatch: the outer loop picks the events up
            if inner.dispatching || inner.pending.is_empty() {
                return;
            }
            inner.dispatching = true;
            (std::mem::take(&mut inner.pending), std::mem::take(&mut inner.listeners))
        };

        for event in &events {
            for (_, listener) in listeners.iter_mut() {
                listener(event);
            }
        }

        let mut inner = content.borrow_mut();
        let removed = std::mem::take(&mut inner.removed);
        listeners.retain(|(id, _)| !removed.contains(id));
        listeners.append(&mut inner.listeners);
        inner.dispatching = false;
        if inner.status == Status::Destroyed {
            // Nothing more to report; listeners may hold handles to us
            drop(inner);
            drop(listeners);
            return;
        }
        inner.listeners = listeners;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn registry() -> HandlerRegistry {
        HandlerRegistry::with_defaults(&Default::default()).unwrap()
    }

    fn text(body: &str) -> Content {
        let mut content = Content::new("t.txt", "text/plain", &registry()).unwrap();
        content.create().unwrap();
        content.process_data(body.as_bytes()).unwrap();
        content
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = Content::new("x", "application/x-nothing", &registry()).unwrap_err();
        assert!(matches!(err, ContentError::UnsupportedType(t) if t == "application/x-nothing"));
    }

    #[test]
    fn test_mime_type_normalised() {
        let content = Content::new("x", "Text/HTML; charset=utf-8", &registry()).unwrap();
        assert_eq!(content.mime_type(), "text/html");
        assert_eq!(content.handler_name(), "html");
        assert_eq!(content.status(), Status::Empty);
    }

    #[test]
    fn test_status_messages() {
        let mut content = Content::new("t", "text/plain", &registry()).unwrap();
        content.create().unwrap();
        assert_eq!(content.status_message(), "Loading");
        content.process_data(b"hello").unwrap();
        content.convert(200, 100).unwrap();
        assert_eq!(content.status_message(), "Done");
    }

    #[test]
    fn test_process_data_before_create_fails() {
        let mut content = Content::new("t", "text/plain", &registry()).unwrap();
        let err = content.process_data(b"x").unwrap_err();
        assert!(matches!(
            err,
            ContentError::InvalidState { op: Operation::ProcessData, status: Status::Empty }
        ));
        assert!(content.source().is_empty());
    }

    #[test]
    fn test_create_twice_fails() {
        let mut content = text("a");
        assert!(matches!(
            content.create(),
            Err(ContentError::InvalidState { op: Operation::Create, status: Status::Fetching })
        ));
    }

    #[test]
    fn test_process_data_after_convert_fails() {
        let mut content = text("a");
        content.convert(100, 100).unwrap();
        assert!(matches!(
            content.process_data(b"b"),
            Err(ContentError::InvalidState { status: Status::Ready, .. })
        ));
    }

    #[test]
    fn test_reformat_before_convert_fails() {
        let mut content = text("a");
        assert!(matches!(
            content.reformat(10, 10),
            Err(ContentError::InvalidState { op: Operation::Reformat, status: Status::Fetching })
        ));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut content = text("abc");
        content.destroy();
        content.destroy();
        assert_eq!(content.status(), Status::Destroyed);
        assert!(content.source().is_empty());
        assert_eq!(content.pending_events(), &[ContentEvent::Loading, ContentEvent::Destroyed]);
        assert!(matches!(content.convert(1, 1), Err(ContentError::Destroyed)));
    }

    #[test]
    fn test_listeners_receive_events() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut content = Content::new("t", "text/plain", &registry()).unwrap();
        let sink = Rc::clone(&seen);
        content.add_listener(move |event| sink.borrow_mut().push(event.clone()));

        content.create().unwrap();
        content.process_data(b"x").unwrap();
        content.convert(100, 100).unwrap();
        content.flush_events();

        assert_eq!(
            *seen.borrow(),
            vec![ContentEvent::Loading, ContentEvent::Ready, ContentEvent::Done]
        );
        assert!(content.pending_events().is_empty());
    }

    #[test]
    fn test_remove_listener() {
        let mut content = Content::new("t", "text/plain", &registry()).unwrap();
        let id = content.add_listener(|_| {});
        assert!(content.remove_listener(id));
        assert!(!content.remove_listener(id));
    }

    #[test]
    fn test_dispatch_allows_reentrant_borrow() {
        let cell = Rc::new(RefCell::new(Content::new("t", "text/plain", &registry()).unwrap()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (observer, sink) = (Rc::clone(&cell), Rc::clone(&seen));
        cell.borrow_mut().add_listener(move |_| sink.borrow_mut().push(observer.borrow().status()));

        cell.borrow_mut().create().unwrap();
        dispatch_events(&cell);
        assert_eq!(*seen.borrow(), vec![Status::Fetching]);
        assert_eq!(cell.borrow().listeners.len(), 1);
    }
}
