//! Message transport contract
//!
//! The engine is an opaque sink for one-way [`Message`]s. Hosts plug in a
//! [`Transport`]; the client talks to it through a shared [`MessageSender`]
//! that enforces the readiness discipline:
//! - before the engine signals readiness every message is queued verbatim
//! - readiness flushes the queue as one FIFO batch, exactly once
//! - afterwards messages are forwarded immediately, in call order
//!
//! Reading view state back (`ra`, `dec`, `fov`, `datetime`) is the only
//! blocking operation and honours a configurable timeout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Duration;

use crate::error::{WwtError, WwtResult};

/// One declarative engine message: an event name plus flat fields
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub event: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Message {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field insert
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String field, if present
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Owning entity id, if the message has one
    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event)?;
        if !self.fields.is_empty() {
            write!(f, " {}", Value::Object(self.fields.clone()))?;
        }
        Ok(())
    }
}

/// View state that can be read back from the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewField {
    Ra,
    Dec,
    Fov,
    Datetime,
}

impl ViewField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewField::Ra => "ra",
            ViewField::Dec => "dec",
            ViewField::Fov => "fov",
            ViewField::Datetime => "datetime",
        }
    }
}

/// Host binding to the engine
pub trait Transport {
    /// Deliver one message
    fn send(&mut self, message: &Message) -> WwtResult<()>;

    /// Deliver the pre-ready queue
    fn send_batch(&mut self, messages: &[Message]) -> WwtResult<()> {
        for message in messages {
            self.send(message)?;
        }
        Ok(())
    }

    /// Synchronously read a view field; `None` waits forever
    fn read_view_field(&mut self, field: ViewField, timeout: Option<Duration>) -> WwtResult<Value> {
        let _ = timeout;
        Err(WwtError::Transport(format!(
            "transport cannot read back '{}'",
            field.as_str()
        )))
    }
}

struct Outbox {
    ready: bool,
    pending: Vec<Message>,
    transport: Box<dyn Transport>,
    sent: usize,
}

/// Cloneable handle every entity uses to reach the engine
#[derive(Clone)]
pub struct MessageSender {
    outbox: Rc<RefCell<Outbox>>,
}

impl MessageSender {
    /// Wrap a transport; `ready` skips the pre-ready queue entirely
    pub fn new(transport: Box<dyn Transport>, ready: bool) -> Self {
        Self {
            outbox: Rc::new(RefCell::new(Outbox {
                ready,
                pending: Vec::new(),
                transport,
                sent: 0,
            })),
        }
    }

    /// Queue or forward one message
    pub fn send(&self, message: Message) -> WwtResult<()> {
        let mut outbox = self.outbox.borrow_mut();
        if !outbox.ready {
            tracing::debug!("queued until ready: {}", message);
            outbox.pending.push(message);
            return Ok(());
        }

        tracing::debug!("send: {}", message);
        outbox.transport.send(&message)?;
        outbox.sent += 1;
        Ok(())
    }

    /// Mark the engine ready and flush the queue as one batch
    ///
    /// Later calls are no-ops. If the batch cannot be delivered the sender
    /// stays not-ready with the queue intact, so a retry resends everything.
    pub fn signal_ready(&self) -> WwtResult<()> {
        let mut outbox = self.outbox.borrow_mut();
        if outbox.ready {
            return Ok(());
        }

        let count = outbox.pending.len();
        tracing::info!("engine ready, flushing {} queued message(s)", count);
        if count > 0 {
            let Outbox {
                pending, transport, ..
            } = &mut *outbox;
            if let Err(err) = transport.send_batch(pending.as_slice()) {
                tracing::warn!("flush of {} queued message(s) failed: {}", count, err);
                return Err(err);
            }
            pending.clear();
            outbox.sent += count;
        }
        outbox.ready = true;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.outbox.borrow().ready
    }

    /// Messages waiting for readiness
    pub fn pending(&self) -> usize {
        self.outbox.borrow().pending.len()
    }

    /// Messages handed to the transport so far
    pub fn sent(&self) -> usize {
        self.outbox.borrow().sent
    }

    /// Blocking read-back of a view field
    pub fn read_view_field(&self, field: ViewField, timeout: Option<Duration>) -> WwtResult<Value> {
        let mut outbox = self.outbox.borrow_mut();
        if !outbox.ready {
            return Err(WwtError::Transport(format!(
                "cannot read '{}' before the engine is ready",
                field.as_str()
            )));
        }
        outbox.transport.read_view_field(field, timeout)
    }
}

impl fmt::Debug for MessageSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outbox = self.outbox.borrow();
        f.debug_struct("MessageSender")
            .field("ready", &outbox.ready)
            .field("pending", &outbox.pending.len())
            .field("sent", &outbox.sent)
            .finish()
    }
}

// ===== In-memory recording =====

#[derive(Default)]
struct Recording {
    messages: Vec<Message>,
    batches: Vec<usize>,
    view: HashMap<ViewField, Value>,
}

/// Transport that records every delivered message
///
/// Clones share the same log, so a test can keep one handle and give the
/// other to the client.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    inner: Rc<RefCell<Recording>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canned answer for a read-back
    pub fn with_view_field(self, field: ViewField, value: impl Into<Value>) -> Self {
        self.inner.borrow_mut().view.insert(field, value.into());
        self
    }

    /// Every delivered message, in delivery order
    pub fn messages(&self) -> Vec<Message> {
        self.inner.borrow().messages.clone()
    }

    /// Delivered messages with a given event name
    pub fn events(&self, event: &str) -> Vec<Message> {
        self.inner
            .borrow()
            .messages
            .iter()
            .filter(|m| m.event == event)
            .cloned()
            .collect()
    }

    /// Sizes of the batches delivered through `send_batch`
    pub fn batches(&self) -> Vec<usize> {
        self.inner.borrow().batches.clone()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.messages.clear();
        inner.batches.clear();
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, message: &Message) -> WwtResult<()> {
        self.inner.borrow_mut().messages.push(message.clone());
        Ok(())
    }

    fn send_batch(&mut self, messages: &[Message]) -> WwtResult<()> {
        let mut inner = self.inner.borrow_mut();
        inner.batches.push(messages.len());
        inner.messages.extend_from_slice(messages);
        Ok(())
    }

    fn read_view_field(
        &mut self,
        field: ViewField,
        _timeout: Option<Duration>,
    ) -> WwtResult<Value> {
        self.inner
            .borrow()
            .view
            .get(&field)
            .cloned()
            .ok_or_else(|| {
                WwtError::Transport(format!("no value recorded for '{}'", field.as_str()))
            })
    }
}

// ===== Cross-thread host binding =====

/// Work handed to the host thread
#[derive(Debug)]
pub enum HostRequest {
    /// One message to forward to the engine
    Message(Message),
    /// The pre-ready queue, in order
    Batch(Vec<Message>),
    /// Read a view field and answer on `reply`
    ReadViewField {
        field: ViewField,
        reply: mpsc::Sender<Value>,
    },
}

/// Transport that hands everything to a host thread over a channel
///
/// The client thread is the single writer; the host thread owns the
/// receiving end and talks to the engine.
pub struct ChannelTransport {
    outgoing: mpsc::Sender<HostRequest>,
}

impl ChannelTransport {
    /// Create the transport and the receiving end for the host thread
    pub fn pair() -> (Self, mpsc::Receiver<HostRequest>) {
        let (outgoing, incoming) = mpsc::channel();
        (Self { outgoing }, incoming)
    }

    fn forward(&self, request: HostRequest) -> WwtResult<()> {
        self.outgoing
            .send(request)
            .map_err(|_| WwtError::Transport("host endpoint disconnected".to_string()))
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, message: &Message) -> WwtResult<()> {
        self.forward(HostRequest::Message(message.clone()))
    }

    fn send_batch(&mut self, messages: &[Message]) -> WwtResult<()> {
        self.forward(HostRequest::Batch(messages.to_vec()))
    }

    fn read_view_field(&mut self, field: ViewField, timeout: Option<Duration>) -> WwtResult<Value> {
        let (reply, answer) = mpsc::channel();
        self.forward(HostRequest::ReadViewField { field, reply })?;

        match timeout {
            Some(limit) => answer.recv_timeout(limit).map_err(|e| match e {
                mpsc::RecvTimeoutError::Timeout => WwtError::Timeout {
                    field: field.as_str().to_string(),
                    waited_ms: limit.as_millis() as u64,
                },
                mpsc::RecvTimeoutError::Disconnected => {
                    WwtError::Transport("host dropped the read-back request".to_string())
                }
            }),
            None => answer
                .recv()
                .map_err(|_| WwtError::Transport("host dropped the read-back request".to_string())),
        }
    }
}
