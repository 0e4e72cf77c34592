//! In-memory document host.
//!
//! A [`Document`] owns a small element tree (`html > head, body`), the readiness state of the
//! page, document-level listeners and per-element handler properties. Handles ([`Node`],
//! [`Element`]) are cheap clones pointing back into the shared document state. Callbacks are
//! never invoked while the document lock is held, so handlers may freely touch the document.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::dom::error::{hierarchy_request, DomResult};
use crate::dom::events::{Event, EventHandler, EventTarget, Listener, ListenerId, ListenerKind};
use crate::dom::selector::SelectorList;

type LifecycleCallback = Box<dyn FnOnce() + Send + 'static>;

/// Called for every element that becomes connected to the document tree.
pub type ConnectObserver = Arc<dyn Fn(&Element) + Send + Sync>;

/// Loading progress of the document. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadyState::Loading => "loading",
            ReadyState::Interactive => "interactive",
            ReadyState::Complete => "complete",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

#[derive(Clone)]
pub struct Document {
    inner: Arc<Mutex<DocumentState>>,
}

struct DocumentState {
    nodes: Vec<NodeData>,
    document_element: NodeId,
    head: NodeId,
    body: NodeId,
    ready_state: ReadyState,
    window_loaded: bool,
    ready_callbacks: Vec<LifecycleCallback>,
    load_callbacks: Vec<LifecycleCallback>,
    listeners: Vec<Listener>,
    next_listener_id: u64,
    connect_observers: Vec<ConnectObserver>,
}

struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

enum NodeKind {
    Element(ElementData),
    Text(String),
}

struct ElementData {
    local_name: String,
    attributes: Vec<(String, String)>,
    handlers: BTreeMap<String, EventHandler>,
}

impl DocumentState {
    fn push_node(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent,
            children: Vec::new(),
            kind,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    fn push_element(&mut self, parent: Option<NodeId>, tag: &str) -> NodeId {
        self.push_node(
            parent,
            NodeKind::Element(ElementData {
                local_name: tag.to_ascii_lowercase(),
                attributes: Vec::new(),
                handlers: BTreeMap::new(),
            }),
        )
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    fn inclusive_ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        let mut current = self.nodes[id.0].parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.nodes[parent.0].parent;
        }
        chain
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) => {
                for child in &self.nodes[id.0].children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    fn collect_elements(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if self.element(id).is_some() {
            out.push(id);
            for child in &self.nodes[id.0].children {
                self.collect_elements(*child, out);
            }
        }
    }

    fn is_connected(&self, id: NodeId) -> bool {
        self.inclusive_ancestors(id)
            .last()
            .is_some_and(|root| *root == self.document_element)
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }
}

impl Document {
    /// Creates a document in the `loading` state with empty `head` and `body` elements.
    pub fn new() -> Self {
        let mut state = DocumentState {
            nodes: Vec::new(),
            document_element: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            ready_state: ReadyState::Loading,
            window_loaded: false,
            ready_callbacks: Vec::new(),
            load_callbacks: Vec::new(),
            listeners: Vec::new(),
            next_listener_id: 1,
            connect_observers: Vec::new(),
        };
        let html = state.push_element(None, "html");
        state.document_element = html;
        state.head = state.push_element(Some(html), "head");
        state.body = state.push_element(Some(html), "body");
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, DocumentState> {
        self.inner.lock().unwrap()
    }

    fn node(&self, id: NodeId) -> Node {
        Node {
            document: self.clone(),
            id,
        }
    }

    fn element_handle(&self, id: NodeId) -> Element {
        Element { node: self.node(id) }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state().ready_state
    }

    pub fn is_window_loaded(&self) -> bool {
        self.state().window_loaded
    }

    pub fn document_element(&self) -> Element {
        let id = self.state().document_element;
        self.element_handle(id)
    }

    pub fn head(&self) -> Element {
        let id = self.state().head;
        self.element_handle(id)
    }

    pub fn body(&self) -> Element {
        let id = self.state().body;
        self.element_handle(id)
    }

    /// Creates a detached element.
    pub fn create_element(&self, tag: &str) -> Element {
        let id = self.state().push_element(None, tag);
        self.element_handle(id)
    }

    /// Creates a detached text node.
    pub fn create_text_node(&self, text: impl Into<String>) -> Node {
        let id = self.state().push_node(None, NodeKind::Text(text.into()));
        self.node(id)
    }

    /// Moves the document forward to `next`.
    ///
    /// Reaching `interactive` runs the pending content-loaded callbacks; reaching `complete`
    /// also marks the window as loaded and runs the pending load callbacks. Moving backwards
    /// or staying put is a no-op.
    pub fn advance_ready_state(&self, next: ReadyState) {
        let (ready, loaded) = {
            let mut state = self.state();
            if next <= state.ready_state {
                return;
            }
            state.ready_state = next;
            let ready = std::mem::take(&mut state.ready_callbacks);
            let loaded = if next == ReadyState::Complete {
                state.window_loaded = true;
                std::mem::take(&mut state.load_callbacks)
            } else {
                Vec::new()
            };
            (ready, loaded)
        };

        log::debug!("document ready state is now `{}`", next.as_str());
        for callback in ready {
            callback();
        }
        for callback in loaded {
            callback();
        }
    }

    pub(crate) fn when_ready(&self, callback: LifecycleCallback) {
        let mut state = self.state();
        if state.ready_state >= ReadyState::Interactive {
            drop(state);
            callback();
        } else {
            state.ready_callbacks.push(callback);
        }
    }

    pub(crate) fn when_loaded(&self, callback: LifecycleCallback) {
        let mut state = self.state();
        if state.window_loaded {
            drop(state);
            callback();
        } else {
            state.load_callbacks.push(callback);
        }
    }

    pub(crate) fn add_listener(&self, event: &str, kind: ListenerKind) -> ListenerId {
        let mut state = self.state();
        let id = ListenerId(state.next_listener_id);
        state.next_listener_id += 1;
        state.listeners.push(Listener {
            id,
            event: event.to_string(),
            kind,
        });
        id
    }

    /// Removes a document-level listener. Returns `false` when it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state();
        let before = state.listeners.len();
        state.listeners.retain(|listener| listener.id != id);
        state.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    /// Registers `observer` for elements that become connected from now on. Appending a
    /// detached subtree below a connected element reports each of its elements, outermost
    /// first; moving an already connected element reports nothing.
    pub fn observe_connected<F>(&self, observer: F)
    where
        F: Fn(&Element) + Send + Sync + 'static,
    {
        self.state().connect_observers.push(Arc::new(observer));
    }

    /// Dispatches an event at `target`.
    ///
    /// Handler properties run first, bubbling from the target through its ancestors. Document
    /// listeners run afterwards in registration order; delegated listeners test every element
    /// between the target and the document, inclusive of the target.
    pub fn dispatch(&self, name: &str, target: EventTarget) -> Event {
        let event = Event::new(name, target);

        if let EventTarget::Node(node) = event.target() {
            let handlers: Vec<(NodeId, EventHandler)> = {
                let state = self.state();
                state
                    .inclusive_ancestors(node.id)
                    .into_iter()
                    .filter_map(|id| {
                        state
                            .element(id)
                            .and_then(|data| data.handlers.get(name).cloned())
                            .map(|handler| (id, handler))
                    })
                    .collect()
            };
            for (id, handler) in handlers {
                handler(&event.with_current_target(self.element_handle(id)));
            }
        }

        let listeners: Vec<Listener> = self
            .state()
            .listeners
            .iter()
            .filter(|listener| listener.event == name)
            .cloned()
            .collect();

        for listener in listeners {
            match &listener.kind {
                ListenerKind::Direct(handler) => handler(&event),
                ListenerKind::Delegated { selector, handler } => {
                    let Some(element) = event.target_element() else {
                        continue;
                    };
                    for ancestor in element.inclusive_ancestor_elements() {
                        if ancestor.matches_selector(selector) {
                            handler(&event.with_current_target(ancestor));
                        }
                    }
                }
            }
        }

        event
    }

    /// First connected element matching `selector`, in tree order.
    pub fn query_selector(&self, selector: &str) -> DomResult<Option<Element>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn query_selector_all(&self, selector: &str) -> DomResult<Vec<Element>> {
        let selector = SelectorList::parse(selector)?;
        let ids = {
            let state = self.state();
            let mut ids = Vec::new();
            state.collect_elements(state.document_element, &mut ids);
            ids
        };
        Ok(ids
            .into_iter()
            .map(|id| self.element_handle(id))
            .filter(|element| element.matches_selector(&selector))
            .collect())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Document")
            .field("ready_state", &state.ready_state)
            .field("window_loaded", &state.window_loaded)
            .field("nodes", &state.nodes.len())
            .field("listeners", &state.listeners)
            .finish()
    }
}

/// Handle to an element or text node.
#[derive(Clone)]
pub struct Node {
    document: Document,
    id: NodeId,
}

impl Node {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn is_element(&self) -> bool {
        self.document.state().element(self.id).is_some()
    }

    pub fn as_element(&self) -> Option<Element> {
        self.is_element().then(|| Element { node: self.clone() })
    }

    pub fn parent_element(&self) -> Option<Element> {
        let parent = self.document.state().nodes[self.id.0].parent;
        parent.map(|id| self.document.element_handle(id))
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.document.state().collect_text(self.id, &mut out);
        out
    }

    /// Dispatches `name` with this node as the target.
    pub fn dispatch_event(&self, name: &str) -> Event {
        self.document.dispatch(name, EventTarget::Node(self.clone()))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.document == other.document && self.id == other.id
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.document.state();
        match &state.nodes[self.id.0].kind {
            NodeKind::Element(data) => write!(f, "Node(<{}>)", data.local_name),
            NodeKind::Text(text) => write!(f, "Node({text:?})"),
        }
    }
}

impl AsRef<Node> for Node {
    fn as_ref(&self) -> &Node {
        self
    }
}

/// Handle to an element node.
#[derive(Clone, PartialEq)]
pub struct Element {
    node: Node,
}

impl Element {
    pub fn as_node(&self) -> &Node {
        &self.node
    }

    pub fn document(&self) -> &Document {
        &self.node.document
    }

    fn with_data<R>(&self, f: impl FnOnce(&ElementData) -> R) -> R {
        let state = self.node.document.state();
        let data = state
            .element(self.node.id)
            .expect("element handles always point at element nodes");
        f(data)
    }

    fn with_data_mut<R>(&self, f: impl FnOnce(&mut ElementData) -> R) -> R {
        let mut state = self.node.document.state();
        let data = state
            .element_mut(self.node.id)
            .expect("element handles always point at element nodes");
        f(data)
    }

    /// Upper-cased tag name, as reported by `Element.tagName` for HTML documents.
    pub fn tag_name(&self) -> String {
        self.with_data(|data| data.local_name.to_ascii_uppercase())
    }

    pub fn local_name(&self) -> String {
        self.with_data(|data| data.local_name.clone())
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.with_data(|data| {
            data.attributes
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
        })
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        self.with_data_mut(|data| {
            match data.attributes.iter_mut().find(|(key, _)| *key == name) {
                Some(entry) => entry.1 = value,
                None => data.attributes.push((name, value)),
            }
        });
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.with_data_mut(|data| {
            let index = data.attributes.iter().position(|(key, _)| *key == name)?;
            Some(data.attributes.remove(index).1)
        })
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.with_data(|data| data.attributes.clone())
    }

    pub fn id(&self) -> Option<String> {
        self.attribute("id")
    }

    pub fn class_list(&self) -> Vec<String> {
        self.attribute("class")
            .map(|class| class.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Binds `handler` as the `on<event>` handler property, replacing any previous one.
    pub fn set_handler(&self, event: &str, handler: EventHandler) {
        let event = event.to_ascii_lowercase();
        self.with_data_mut(|data| {
            data.handlers.insert(event, handler);
        });
    }

    pub fn handler(&self, event: &str) -> Option<EventHandler> {
        let event = event.to_ascii_lowercase();
        self.with_data(|data| data.handlers.get(&event).cloned())
    }

    /// Appends `child`, detaching it from its previous parent first.
    pub fn append_child(&self, child: impl AsRef<Node>) -> DomResult<()> {
        let child = child.as_ref();
        if child.document != self.node.document {
            return Err(hierarchy_request("cannot append a node owned by another document"));
        }
        let mut state = self.node.document.state();
        if state.inclusive_ancestors(self.node.id).contains(&child.id) {
            return Err(hierarchy_request("cannot append a node to itself or one of its descendants"));
        }
        let newly_connected = !state.is_connected(child.id) && state.is_connected(self.node.id);
        state.detach(child.id);
        state.nodes[child.id.0].parent = Some(self.node.id);
        state.nodes[self.node.id.0].children.push(child.id);

        if !newly_connected || state.connect_observers.is_empty() {
            return Ok(());
        }
        let mut connected = Vec::new();
        state.collect_elements(child.id, &mut connected);
        let observers = state.connect_observers.clone();
        drop(state);

        let document = &self.node.document;
        for id in connected {
            let element = document.element_handle(id);
            for observer in &observers {
                observer(&element);
            }
        }
        Ok(())
    }

    /// Detaches the element from its parent. Its subtree stays intact.
    pub fn remove(&self) {
        self.node.document.state().detach(self.node.id);
    }

    pub fn append_text(&self, text: impl Into<String>) -> Node {
        let mut state = self.node.document.state();
        let id = state.push_node(Some(self.node.id), NodeKind::Text(text.into()));
        drop(state);
        self.node.document.node(id)
    }

    pub fn children(&self) -> Vec<Element> {
        let ids: Vec<NodeId> = {
            let state = self.node.document.state();
            state.nodes[self.node.id.0]
                .children
                .iter()
                .copied()
                .filter(|id| state.element(*id).is_some())
                .collect()
        };
        ids.into_iter()
            .map(|id| self.node.document.element_handle(id))
            .collect()
    }

    pub fn parent_element(&self) -> Option<Element> {
        self.node.parent_element()
    }

    pub fn text_content(&self) -> String {
        self.node.text_content()
    }

    /// Text content with whitespace runs collapsed to single spaces and the ends trimmed.
    pub fn inner_text(&self) -> String {
        self.text_content()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether the element is attached below the document element.
    pub fn is_connected(&self) -> bool {
        self.node.document.state().is_connected(self.node.id)
    }

    pub fn matches(&self, selector: &str) -> DomResult<bool> {
        let selector = SelectorList::parse(selector)?;
        Ok(self.matches_selector(&selector))
    }

    pub(crate) fn matches_selector(&self, selector: &SelectorList) -> bool {
        self.with_data(|data| selector.matches_parts(&data.local_name, &data.attributes))
    }

    pub(crate) fn inclusive_ancestor_elements(&self) -> Vec<Element> {
        let ids = self.node.document.state().inclusive_ancestors(self.node.id);
        ids.into_iter()
            .map(|id| self.node.document.element_handle(id))
            .collect()
    }

    pub fn dispatch_event(&self, name: &str) -> Event {
        self.node.dispatch_event(name)
    }

    pub fn click(&self) -> Event {
        self.dispatch_event("click")
    }
}

impl AsRef<Node> for Element {
    fn as_ref(&self) -> &Node {
        &self.node
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, attributes) =
            self.with_data(|data| (data.local_name.clone(), data.attributes.clone()));
        f.debug_struct("Element")
            .field("tag", &name)
            .field("attributes", &attributes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn new_document_has_head_and_body() {
        let doc = Document::new();
        assert_eq!(doc.ready_state(), ReadyState::Loading);
        assert_eq!(doc.head().tag_name(), "HEAD");
        assert_eq!(doc.body().parent_element(), Some(doc.document_element()));
        assert!(doc.body().is_connected());
        assert!(!doc.create_element("div").is_connected());
    }

    #[test]
    fn inner_text_normalizes_whitespace() {
        let doc = Document::new();
        let button = doc.create_element("button");
        button.append_text("  Buy \n\t now ");
        let span = doc.create_element("span");
        span.append_text(" please ");
        button.append_child(&span).unwrap();
        assert_eq!(button.inner_text(), "Buy now please");
    }

    #[test]
    fn append_child_rejects_cycles_and_moves_nodes() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("p");
        outer.append_child(&inner).unwrap();

        let err = inner.append_child(&outer).unwrap_err();
        assert_eq!(err.code_str(), "dom/hierarchy-request");

        doc.body().append_child(&inner).unwrap();
        assert!(outer.children().is_empty());
        assert_eq!(inner.parent_element(), Some(doc.body()));
    }

    #[test]
    fn ready_state_only_moves_forward() {
        let doc = Document::new();
        doc.advance_ready_state(ReadyState::Complete);
        doc.advance_ready_state(ReadyState::Interactive);
        assert_eq!(doc.ready_state(), ReadyState::Complete);
        assert!(doc.is_window_loaded());
    }

    #[test]
    fn handler_properties_bubble_before_document_listeners() {
        let doc = Document::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let wrapper = doc.create_element("div");
        let link = doc.create_element("a");
        wrapper.append_child(&link).unwrap();
        doc.body().append_child(&wrapper).unwrap();

        let seen = order.clone();
        link.set_handler(
            "click",
            Arc::new(move |_event: &Event| seen.lock().unwrap().push("link")),
        );
        let seen = order.clone();
        wrapper.set_handler(
            "click",
            Arc::new(move |event: &Event| {
                assert_eq!(event.current_target().map(Element::local_name).as_deref(), Some("div"));
                seen.lock().unwrap().push("wrapper")
            }),
        );
        let seen = order.clone();
        doc.add_listener(
            "click",
            ListenerKind::Direct(Arc::new(move |_event: &Event| seen.lock().unwrap().push("document"))),
        );

        link.click();
        assert_eq!(*order.lock().unwrap(), vec!["link", "wrapper", "document"]);
    }

    #[test]
    fn removed_listeners_stop_firing() {
        let doc = Document::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let id = doc.add_listener(
            "click",
            ListenerKind::Direct(Arc::new(move |_event: &Event| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
        doc.body().click();
        assert!(doc.remove_listener(id));
        assert!(!doc.remove_listener(id));
        doc.body().click();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connect_observers_see_each_newly_connected_element() {
        let doc = Document::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        doc.observe_connected(move |element| sink.lock().unwrap().push(element.local_name()));

        let wrapper = doc.create_element("div");
        let script = doc.create_element("script");
        wrapper.append_child(&script).unwrap();
        assert!(seen.lock().unwrap().is_empty());

        doc.body().append_child(&wrapper).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["div", "script"]);

        doc.head().append_child(&script).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);

        wrapper.remove();
        assert!(!wrapper.is_connected());
        assert_eq!(wrapper.parent_element(), None);
        doc.body().append_child(&wrapper).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["div", "script", "div"]);
    }

    #[test]
    fn query_selector_walks_connected_tree() {
        let doc = Document::new();
        let first = doc.create_element("a");
        first.set_attribute("href", "/one");
        let second = doc.create_element("a");
        second.set_attribute("href", "/two");
        doc.body().append_child(&first).unwrap();
        doc.body().append_child(&second).unwrap();
        let _detached = doc.create_element("a");

        let found = doc.query_selector_all("a").unwrap();
        assert_eq!(found, vec![first.clone(), second]);
        assert_eq!(doc.query_selector("a[href='/one']").unwrap(), Some(first));
    }
}
