//! The `gtag` seam.
//!
//! [`TagManager`] is everything the tracker needs from the tag-manager global: installing the
//! `dataLayer` queue and `gtag` function, pushing commands, and reading fields back. In the
//! browser it is backed by `window.gtag` (see [`crate::platform::browser`]); elsewhere
//! [`GtagRegistry`] records the commands so callers and tests can inspect them.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

pub type EventParams = BTreeMap<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsentMode {
    Default,
    Update,
}

impl ConsentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentMode::Default => "default",
            ConsentMode::Update => "update",
        }
    }
}

/// One `gtag(...)` call.
#[derive(Clone, Debug, PartialEq)]
pub enum GtagCommand {
    Js(DateTime<Utc>),
    Config { target: String, params: EventParams },
    Consent { mode: ConsentMode, params: EventParams },
    Event { name: String, params: EventParams },
}

impl GtagCommand {
    /// Positional arguments of the equivalent `gtag` call, e.g. `["event", "page_view", {..}]`.
    pub fn to_arguments(&self) -> Vec<Value> {
        fn object(params: &EventParams) -> Value {
            Value::Object(params.clone().into_iter().collect())
        }

        match self {
            GtagCommand::Js(at) => vec![
                Value::from("js"),
                Value::from(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ],
            GtagCommand::Config { target, params } => {
                vec![Value::from("config"), Value::from(target.as_str()), object(params)]
            }
            GtagCommand::Consent { mode, params } => {
                vec![Value::from("consent"), Value::from(mode.as_str()), object(params)]
            }
            GtagCommand::Event { name, params } => {
                vec![Value::from("event"), Value::from(name.as_str()), object(params)]
            }
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait TagManager: Send + Sync {
    /// Creates the `dataLayer` queue and `gtag` function when they do not exist yet.
    fn install(&self);

    fn is_installed(&self) -> bool;

    /// Queues a command. Fire-and-forget: the tag manager reports nothing back.
    fn push(&self, command: GtagCommand);

    /// Resolves `gtag('get', target, field)`; `None` when the tag manager has no value.
    async fn get(&self, target: &str, field: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GtagState {
    pub data_layer_name: String,
    pub installed: bool,
    pub commands: Vec<GtagCommand>,
    pub fields: BTreeMap<String, String>,
}

impl GtagState {
    pub fn events(&self) -> Vec<(String, EventParams)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                GtagCommand::Event { name, params } => Some((name.clone(), params.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn consent_defaults(&self) -> Option<EventParams> {
        self.commands.iter().find_map(|command| match command {
            GtagCommand::Consent {
                mode: ConsentMode::Default,
                params,
            } => Some(params.clone()),
            _ => None,
        })
    }

    pub fn config_for(&self, target: &str) -> Option<EventParams> {
        self.commands.iter().find_map(|command| match command {
            GtagCommand::Config { target: t, params } if t == target => Some(params.clone()),
            _ => None,
        })
    }
}

/// In-memory [`TagManager`] that records every command.
#[derive(Debug, Default)]
pub struct GtagRegistry {
    state: Mutex<GtagState>,
}

impl GtagRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GtagState {
                data_layer_name: "dataLayer".to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn set_data_layer_name(&self, data_layer: impl Into<String>) {
        self.state.lock().unwrap().data_layer_name = data_layer.into();
    }

    /// Seeds the value returned by `get` for `field` (e.g. `client_id`).
    pub fn set_field(&self, field: impl Into<String>, value: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .fields
            .insert(field.into(), value.into());
    }

    pub fn snapshot(&self) -> GtagState {
        self.state.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        *self.state.lock().unwrap() = GtagState {
            data_layer_name: "dataLayer".to_string(),
            ..Default::default()
        };
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl TagManager for GtagRegistry {
    fn install(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.installed {
            log::debug!("installing `{}` queue and gtag function", state.data_layer_name);
            state.installed = true;
        }
    }

    fn is_installed(&self) -> bool {
        self.state.lock().unwrap().installed
    }

    fn push(&self, command: GtagCommand) {
        self.state.lock().unwrap().commands.push(command);
    }

    async fn get(&self, _target: &str, field: &str) -> Option<String> {
        self.state.lock().unwrap().fields.get(field).cloned()
    }
}
