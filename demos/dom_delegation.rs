//! Builds a small page, wires a delegated click listener and a debounced resize handler,
//! then simulates a few events.

use std::time::Duration;

use utx_web_sdk::dom::{
    attach_script, attach_to_body, create_element, debounce, on, on_doc_ready, AttributeValue,
    DebounceOptions, Document, OnArgument, ReadyState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let document = Document::new();
    on_doc_ready(&document, || println!("document is interactive"));

    let nav = create_element(&document, "nav", [("class", AttributeValue::from("menu"))]);
    for (label, href) in [("Home", "/"), ("Pricing", "/pricing")] {
        let link = create_element(&document, "a", [("href", AttributeValue::from(href))]);
        link.append_text(label);
        nav.append_child(&link)?;
    }
    attach_to_body(&document, &nav)?;
    attach_script(
        &document,
        "https://cdn.example.com/widget.js",
        [("defer", AttributeValue::from(true))],
    )?;

    on(
        &document,
        "click",
        vec![
            OnArgument::from("a[href]"),
            OnArgument::callback(|event| {
                if let Some(link) = event.current_target() {
                    println!("clicked {:?} -> {:?}", link.inner_text(), link.attribute("href"));
                }
            }),
        ],
    )?;

    let resized = debounce(
        |width: u32| println!("resized to {width}px"),
        DebounceOptions::default().with_delay(Duration::from_millis(50)),
    );
    for width in [800, 900, 1024] {
        resized.call(width);
    }

    document.advance_ready_state(ReadyState::Interactive);
    for link in document.query_selector_all("nav a")? {
        link.click();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
