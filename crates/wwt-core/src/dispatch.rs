//! Change-notification dispatcher
//!
//! Turns attribute writes into `<context>_set` messages. Local attributes
//! (no remote name) are absorbed silently.

use serde_json::Value;

use crate::attributes::{AttributeChange, ChangeObserver};
use crate::error::WwtResult;
use crate::transport::{Message, MessageSender};

/// Message family an entity's settings belong to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetContext {
    /// Root widget and solar-system settings
    Setting,
    Annotation,
    TableLayer,
    ImageLayer,
}

impl SetContext {
    /// Event name of a setting change
    pub fn event(&self) -> &'static str {
        match self {
            SetContext::Setting => "setting_set",
            SetContext::Annotation => "annotation_set",
            SetContext::TableLayer => "table_layer_set",
            SetContext::ImageLayer => "image_layer_set",
        }
    }

    /// Build a `<context>_set` message for one setting
    pub fn message(&self, id: Option<&str>, setting: &str, value: Value) -> Message {
        let mut message = Message::new(self.event());
        if let Some(id) = id {
            message = message.with("id", id);
        }
        message.with("setting", setting).with("value", value)
    }
}

/// Observer mirroring remote attributes to the engine
pub struct Dispatcher {
    context: SetContext,
    id: Option<String>,
    sender: MessageSender,
}

impl Dispatcher {
    /// Dispatcher for settings that are not owned by an entity
    pub fn global(context: SetContext, sender: MessageSender) -> Self {
        Self {
            context,
            id: None,
            sender,
        }
    }

    /// Dispatcher for one entity's settings
    pub fn for_entity(context: SetContext, id: impl Into<String>, sender: MessageSender) -> Self {
        Self {
            context,
            id: Some(id.into()),
            sender,
        }
    }
}

impl ChangeObserver for Dispatcher {
    fn attribute_changed(&mut self, change: &AttributeChange<'_>) -> WwtResult<()> {
        let Some(remote_name) = change.spec.remote_name else {
            return Ok(());
        };

        let value = change.spec.encode(change.new);
        self.sender
            .send(self.context.message(self.id.as_deref(), remote_name, value))
    }
}
