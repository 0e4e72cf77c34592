use std::fmt;
use std::sync::Arc;

use crate::dom::document::{Element, Node};
use crate::dom::selector::SelectorList;

/// Callback bound to an event, either as a document listener or as an element handler property.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

/// Handle returned when registering a document-level listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// The object an event was dispatched at.
#[derive(Clone, Debug, PartialEq)]
pub enum EventTarget {
    Document,
    Node(Node),
}

#[derive(Clone, Debug)]
pub struct Event {
    name: String,
    target: EventTarget,
    current_target: Option<Element>,
}

impl Event {
    pub fn new(name: impl Into<String>, target: EventTarget) -> Self {
        Self {
            name: name.into(),
            target,
            current_target: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &EventTarget {
        &self.target
    }

    /// The dispatch target when it is an element; `None` for text nodes and the document.
    pub fn target_element(&self) -> Option<Element> {
        match &self.target {
            EventTarget::Node(node) => node.as_element(),
            EventTarget::Document => None,
        }
    }

    /// The element whose handler is running: the element owning a handler property, or the
    /// ancestor that matched a delegated listener's selector.
    pub fn current_target(&self) -> Option<&Element> {
        self.current_target.as_ref()
    }

    pub(crate) fn with_current_target(&self, element: Element) -> Event {
        Event {
            name: self.name.clone(),
            target: self.target.clone(),
            current_target: Some(element),
        }
    }
}

#[derive(Clone)]
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) event: String,
    pub(crate) kind: ListenerKind,
}

#[derive(Clone)]
pub(crate) enum ListenerKind {
    Direct(EventHandler),
    Delegated {
        selector: SelectorList,
        handler: EventHandler,
    },
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selector = match &self.kind {
            ListenerKind::Direct(_) => None,
            ListenerKind::Delegated { selector, .. } => Some(selector.as_str()),
        };
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("selector", &selector)
            .finish()
    }
}
