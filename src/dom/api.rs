use std::fmt;
use std::sync::Arc;

use crate::dom::document::{Document, Element};
use crate::dom::error::{invalid_call_signature, DomResult};
use crate::dom::events::{Event, EventHandler, ListenerId, ListenerKind};
use crate::dom::selector::SelectorList;

/// Value accepted by [`create_element`] and [`attach_script`].
#[derive(Clone)]
pub enum AttributeValue {
    /// Bound as an event-handler property instead of an attribute.
    Handler(EventHandler),
    /// `true` yields a presence-only attribute with an empty value; `false` omits it.
    Flag(bool),
    Text(String),
    Number(f64),
}

impl AttributeValue {
    pub fn handler<F>(handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        AttributeValue::Handler(Arc::new(handler))
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Handler(_) => f.write_str("Handler(..)"),
            AttributeValue::Flag(value) => write!(f, "Flag({value})"),
            AttributeValue::Text(value) => write!(f, "Text({value:?})"),
            AttributeValue::Number(value) => write!(f, "Number({value})"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Flag(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

/// Arguments of the arity-dispatching [`on`] form.
#[derive(Clone)]
pub enum OnArgument {
    Selector(String),
    Callback(EventHandler),
}

impl OnArgument {
    pub fn callback<F>(callback: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        OnArgument::Callback(Arc::new(callback))
    }
}

impl From<&str> for OnArgument {
    fn from(selector: &str) -> Self {
        OnArgument::Selector(selector.to_string())
    }
}

/// Runs `callback` once the document is interactive. Runs it right away when it already is.
pub fn on_doc_ready<F>(document: &Document, callback: F)
where
    F: FnOnce() + Send + 'static,
{
    document.when_ready(Box::new(callback));
}

/// Runs `callback` once the window has finished loading. Runs it right away when it already has.
pub fn on_win_loaded<F>(document: &Document, callback: F)
where
    F: FnOnce() + Send + 'static,
{
    document.when_loaded(Box::new(callback));
}

/// Registers a document-level listener for `event`.
pub fn on_direct<F>(document: &Document, event: &str, callback: F) -> ListenerId
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    document.add_listener(event, ListenerKind::Direct(Arc::new(callback)))
}

/// Registers a delegated document-level listener.
///
/// On dispatch the target and each of its ancestors up to the document are tested against
/// `selector`; `callback` runs once per match with [`Event::current_target`] set to the
/// matching element. Events targeting non-element nodes are ignored.
pub fn on_delegated<F>(
    document: &Document,
    event: &str,
    selector: &str,
    callback: F,
) -> DomResult<ListenerId>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    let selector = SelectorList::parse(selector)?;
    Ok(document.add_listener(
        event,
        ListenerKind::Delegated {
            selector,
            handler: Arc::new(callback),
        },
    ))
}

/// Arity-dispatching form: `[callback]` registers a direct listener, `[selector, callback]`
/// a delegated one.
pub fn on(document: &Document, event: &str, args: Vec<OnArgument>) -> DomResult<ListenerId> {
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(OnArgument::Callback(callback)), None, None) => {
            Ok(document.add_listener(event, ListenerKind::Direct(callback)))
        }
        (Some(OnArgument::Selector(selector)), Some(OnArgument::Callback(callback)), None) => {
            let selector = SelectorList::parse(&selector)?;
            Ok(document.add_listener(
                event,
                ListenerKind::Delegated {
                    selector,
                    handler: callback,
                },
            ))
        }
        _ => Err(invalid_call_signature(format!(
            "on(`{event}`) expects either (callback) or (selector, callback)"
        ))),
    }
}

pub fn attach_to_head(document: &Document, element: &Element) -> DomResult<()> {
    document.head().append_child(element)
}

pub fn attach_to_body(document: &Document, element: &Element) -> DomResult<()> {
    document.body().append_child(element)
}

/// Appends `<script async src=...>` with the extra `attrs` to the body.
pub fn attach_script<I, K>(document: &Document, src: &str, attrs: I) -> DomResult<Element>
where
    I: IntoIterator<Item = (K, AttributeValue)>,
    K: Into<String>,
{
    let script = create_element(
        document,
        "script",
        [
            ("async".to_string(), AttributeValue::Flag(true)),
            ("src".to_string(), AttributeValue::from(src)),
        ]
        .into_iter()
        .chain(attrs.into_iter().map(|(key, value)| (key.into(), value))),
    );
    attach_to_body(document, &script)?;
    log::debug!("attached script `{src}`");
    Ok(script)
}

/// Builds a detached element from `tag` and `attrs`.
///
/// Handler values are bound as handler properties (`onclick` binds `click`), `true` flags
/// become empty attributes, `false` flags are skipped and text/number values are stringified.
pub fn create_element<I, K>(document: &Document, tag: &str, attrs: I) -> Element
where
    I: IntoIterator<Item = (K, AttributeValue)>,
    K: Into<String>,
{
    let element = document.create_element(tag);
    for (key, value) in attrs {
        let key = key.into();
        match value {
            AttributeValue::Handler(handler) => {
                let lower = key.to_ascii_lowercase();
                let event = lower.strip_prefix("on").unwrap_or(&lower);
                element.set_handler(event, handler);
            }
            AttributeValue::Flag(true) => element.set_attribute(&key, ""),
            AttributeValue::Flag(false) => {}
            AttributeValue::Text(text) => element.set_attribute(&key, text),
            AttributeValue::Number(number) => element.set_attribute(&key, format_number(number)),
        }
    }
    element
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
