#![cfg(all(target_arch = "wasm32", feature = "wasm-web"))]

use std::sync::{Arc, Mutex};

use utx_web_sdk::analytics::{CookieStore, TagManager};
use utx_web_sdk::dom::{
    attach_script, debounce, on_delegated, on_direct, AttributeValue, DebounceOptions, Document,
    ReadyState,
};
use utx_web_sdk::platform::browser::{
    connect_document, page_from_window, DocumentCookieStore, WindowGtag,
};
use utx_web_sdk::platform::runtime::sleep;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn window_gtag_installs_data_layer() {
    let gtag = WindowGtag::new("utxSmokeLayer");
    gtag.install();
    assert!(gtag.is_installed());

    let window = web_sys::window().unwrap();
    let layer = js_sys::Reflect::get(&window, &JsValue::from_str("utxSmokeLayer")).unwrap();
    assert!(js_sys::Array::is_array(&layer));
}

#[wasm_bindgen_test]
fn document_cookies_round_trip() {
    let cookies = DocumentCookieStore;
    cookies.set("utx_smoke", r#"{"utm_source":"test"}"#);
    assert_eq!(
        cookies.get("utx_smoke").as_deref(),
        Some(r#"{"utm_source":"test"}"#)
    );
}

#[wasm_bindgen_test]
fn page_reflects_window_location() {
    let page = page_from_window().expect("page from window");
    let href = web_sys::window().unwrap().location().href().unwrap();
    assert_eq!(page.url().as_str(), href);
}

#[wasm_bindgen_test(async)]
async fn debounce_and_listeners_run_in_the_browser() {
    let document = Document::new();
    document.advance_ready_state(ReadyState::Complete);

    let hits = Arc::new(Mutex::new(Vec::new()));
    let recorded = hits.clone();
    let debounced = debounce(
        move |value: u32| recorded.lock().unwrap().push(value),
        DebounceOptions::default(),
    );
    let listener_debounced = debounced.clone();
    on_direct(&document, "resize", move |_| listener_debounced.call(7));

    document.body().dispatch_event("resize");
    document.body().dispatch_event("resize");
    sleep(std::time::Duration::from_millis(250)).await;
    assert_eq!(*hits.lock().unwrap(), vec![7]);
}

#[wasm_bindgen_test(async)]
async fn connected_document_loads_scripts_on_the_page() {
    let document = Document::new();
    connect_document(&document).expect("connect document");

    let loaded = Arc::new(Mutex::new(0));
    let counter = loaded.clone();
    let src = "data:text/javascript,window.utxSmokeScript%3D1";
    attach_script(
        &document,
        src,
        [(
            "onload",
            AttributeValue::handler(move |_| *counter.lock().unwrap() += 1),
        )],
    )
    .expect("attach script");

    for _ in 0..40 {
        if *loaded.lock().unwrap() > 0 {
            break;
        }
        sleep(std::time::Duration::from_millis(50)).await;
    }
    assert_eq!(*loaded.lock().unwrap(), 1);

    let page = web_sys::window().unwrap().document().unwrap();
    let script = page
        .query_selector(&format!("script[src=\"{src}\"]"))
        .unwrap()
        .expect("script on the page");
    assert!(script.has_attribute("async"));
    let flag = js_sys::Reflect::get(
        &web_sys::window().unwrap(),
        &JsValue::from_str("utxSmokeScript"),
    )
    .unwrap();
    assert_eq!(flag.as_f64(), Some(1.0));
}

#[wasm_bindgen_test]
fn page_clicks_reach_delegated_listeners() {
    let document = Document::new();
    connect_document(&document).expect("connect document");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    on_delegated(&document, "click", "a[href]", move |event| {
        let anchor = event.current_target().expect("current target");
        let text = event.target_element().map(|target| target.text_content());
        recorded.lock().unwrap().push((
            anchor.attribute("href"),
            anchor.attribute("class"),
            anchor.text_content(),
            text,
        ));
    })
    .expect("delegated listener");

    let page = web_sys::window().unwrap().document().unwrap();
    let nav = page.create_element("nav").unwrap();
    let anchor = page.create_element("a").unwrap();
    anchor.set_attribute("href", "#pricing").unwrap();
    anchor.set_attribute("class", "cta").unwrap();
    let label = page.create_element("span").unwrap();
    label.set_text_content(Some("Pricing"));
    anchor.append_child(&label).unwrap();
    anchor.append_with_str_1(" now").unwrap();
    nav.append_child(&anchor).unwrap();
    page.body().unwrap().append_child(&nav).unwrap();

    label.dyn_ref::<web_sys::HtmlElement>().unwrap().click();
    nav.remove();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(
            Some("#pricing".to_string()),
            Some("cta".to_string()),
            "Pricing now".to_string(),
            Some("Pricing".to_string()),
        )]
    );
    assert_eq!(document.body().children().len(), 0);
}
