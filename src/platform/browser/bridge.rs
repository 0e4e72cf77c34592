//! Keeps a [`Document`] in step with the live page.
//!
//! * readiness: `DOMContentLoaded` and the window `load` event advance the model;
//! * scripts: every `<script src>` connected in the model is appended to the real page, and
//!   its real `load` event is dispatched back to the model element;
//! * clicks: a real click is replayed on a copy of the clicked element's ancestor chain
//!   (tag, attributes, text) so document listeners and delegation see the real target.

use std::sync::Arc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

use crate::analytics::error::{internal_error, AnalyticsResult};
use crate::analytics::Tracker;
use crate::dom::{Document, Element, ReadyState};
use crate::platform::browser::web::{page_from_window, WindowGtag};

/// Wires `document` to the live page. Call once per document.
pub fn connect_document(document: &Document) -> AnalyticsResult<()> {
    let window = web_sys::window().ok_or_else(|| internal_error("no global `window`"))?;
    let page = window
        .document()
        .ok_or_else(|| internal_error("no `window.document`"))?;

    document.observe_connected(mirror_script);

    let model = document.clone();
    let on_click = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
        replay_click(&model, &event);
    });
    page.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
        .map_err(|err| internal_error(format!("failed to listen for clicks: {err:?}")))?;
    on_click.forget();

    match page.ready_state().as_str() {
        "complete" => {
            document.advance_ready_state(ReadyState::Interactive);
            document.advance_ready_state(ReadyState::Complete);
        }
        "interactive" => document.advance_ready_state(ReadyState::Interactive),
        _ => {}
    }
    let model = document.clone();
    let on_ready = Closure::once_into_js(move || model.advance_ready_state(ReadyState::Interactive));
    page.add_event_listener_with_callback("DOMContentLoaded", on_ready.unchecked_ref())
        .map_err(|err| internal_error(format!("failed to listen for DOMContentLoaded: {err:?}")))?;
    let model = document.clone();
    let on_load = Closure::once_into_js(move || {
        model.advance_ready_state(ReadyState::Interactive);
        model.advance_ready_state(ReadyState::Complete);
    });
    window
        .add_event_listener_with_callback("load", on_load.unchecked_ref())
        .map_err(|err| internal_error(format!("failed to listen for load: {err:?}")))?;

    log::debug!("document connected to the live page");
    Ok(())
}

/// A tracker over a connected document, the window's page and `window.gtag`.
pub fn tracker_from_window() -> AnalyticsResult<Tracker> {
    let document = Document::new();
    connect_document(&document)?;
    Ok(Tracker::new(
        document,
        page_from_window()?,
        Arc::new(WindowGtag::default()),
    ))
}

fn mirror_script(element: &Element) {
    if element.local_name() != "script" {
        return;
    }
    let Some(src) = element.attribute("src") else {
        return;
    };
    let Some(page) = web_sys::window().and_then(|window| window.document()) else {
        return;
    };
    let script = match page.create_element("script") {
        Ok(script) => script,
        Err(err) => {
            log::warn!("failed to create script for `{src}`: {err:?}");
            return;
        }
    };
    for (name, value) in element.attributes() {
        if let Err(err) = script.set_attribute(&name, &value) {
            log::warn!("failed to copy attribute `{name}` to script `{src}`: {err:?}");
        }
    }

    let model = element.clone();
    let on_load = Closure::once_into_js(move || {
        model.dispatch_event("load");
    });
    if script
        .add_event_listener_with_callback("load", on_load.unchecked_ref())
        .is_err()
    {
        log::warn!("failed to listen for `load` on script `{src}`");
    }

    let parent: Option<web_sys::Node> = match page.body() {
        Some(body) => Some(body.into()),
        None => page.document_element().map(Into::into),
    };
    match parent.map(|parent| parent.append_child(&script)) {
        Some(Ok(_)) => log::debug!("loading script `{src}`"),
        Some(Err(err)) => log::warn!("failed to insert script `{src}`: {err:?}"),
        None => log::warn!("no element to insert script `{src}` into"),
    }
}

fn replay_click(document: &Document, event: &web_sys::Event) {
    if document.listener_count() == 0 {
        return;
    }
    let Some(target) = event
        .target()
        .and_then(|target| target.dyn_into::<web_sys::Element>().ok())
    else {
        return;
    };

    let mut chain = Vec::new();
    let mut current = Some(target);
    while let Some(element) = current {
        if matches!(element.local_name().as_str(), "body" | "html") {
            break;
        }
        current = element.parent_element();
        chain.push(element);
    }

    // Built innermost first. Each copy holds its real text around the copy of its child, so
    // text content matches the page along the chain.
    let mut innermost: Option<Element> = None;
    let mut outer: Option<(Element, String)> = None;
    for real in &chain {
        let copy = document.create_element(&real.local_name());
        for name in real.get_attribute_names().iter().filter_map(|name| name.as_string()) {
            if let Some(value) = real.get_attribute(&name) {
                copy.set_attribute(&name, value);
            }
        }
        let text = real.text_content().unwrap_or_default();
        match outer.take() {
            None => {
                copy.append_text(text.as_str());
            }
            Some((child, child_text)) => {
                let (before, after) = text
                    .split_once(child_text.as_str())
                    .unwrap_or((text.as_str(), ""));
                if !before.is_empty() {
                    copy.append_text(before);
                }
                if copy.append_child(&child).is_err() {
                    return;
                }
                if !after.is_empty() {
                    copy.append_text(after);
                }
            }
        }
        if innermost.is_none() {
            innermost = Some(copy.clone());
        }
        outer = Some((copy, text));
    }

    let (Some(target), Some((outermost, _))) = (innermost, outer) else {
        return;
    };
    if document.body().append_child(&outermost).is_ok() {
        target.click();
    }
    outermost.remove();
}
