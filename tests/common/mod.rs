//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use docbind_core::{
    client::{
        ClientConfig, EventStream, Signal, SignalHub, Subscription, Transport,
        PROPERTIES_INTERFACE,
    },
    variant::{ObjectPath, PropertyMap, Variant},
    DocbindError,
};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// The documentation fixtures under `tests/docs`.
#[allow(dead_code)]
pub fn docs_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("docs")
}

#[allow(dead_code)]
pub fn read_doc(name: &str) -> String {
    std::fs::read_to_string(docs_dir().join(name)).unwrap()
}

/// One recorded `Transport::call`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub path: ObjectPath,
    pub interface: String,
    pub method: String,
    pub args: Vec<Variant>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    responses: HashMap<(String, String), Vec<Variant>>,
    properties: HashMap<(String, String), PropertyMap>,
    disconnected: bool,
}

/// An in-memory transport: answers the standard Properties calls from a per-object property
/// table, other calls from canned responses, and delivers emitted signals per
/// `(path, interface)`.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    hubs: Arc<Mutex<HashMap<(String, String), SignalHub<Signal>>>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        MockTransport::default()
    }

    pub fn set_properties(&self, path: &str, interface: &str, properties: PropertyMap) {
        self.state
            .lock()
            .properties
            .insert((path.to_string(), interface.to_string()), properties);
    }

    pub fn respond(&self, interface: &str, method: &str, values: Vec<Variant>) {
        self.state
            .lock()
            .responses
            .insert((interface.to_string(), method.to_string()), values);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.state.lock().disconnected
    }

    fn hub(&self, path: &str, interface: &str) -> SignalHub<Signal> {
        self.hubs
            .lock()
            .entry((path.to_string(), interface.to_string()))
            .or_default()
            .clone()
    }

    /// Deliver a signal to everything registered for its path and interface.
    pub fn emit(&self, signal: Signal) -> usize {
        self.hub(signal.path.as_str(), &signal.interface).publish(signal)
    }

    pub fn subscriber_count(&self, path: &str, interface: &str) -> usize {
        self.hub(path, interface).subscriber_count()
    }

    fn properties_call(
        &self,
        target: &ClientConfig,
        method: &str,
        args: &[Variant],
    ) -> Result<Vec<Variant>, DocbindError> {
        let interface = args
            .first()
            .and_then(|v| v.as_str())
            .ok_or_else(|| DocbindError::Transport("missing interface argument".to_string()))?
            .to_string();
        let key = (target.path.as_str().to_string(), interface);
        let mut state = self.state.lock();
        let table = state.properties.entry(key).or_default();
        match method {
            "GetAll" => Ok(vec![Variant::Map(table.clone())]),
            "Get" => {
                let name = args.get(1).and_then(|v| v.as_str()).unwrap_or_default();
                table
                    .get(name)
                    .cloned()
                    .map(|v| vec![v])
                    .ok_or_else(|| DocbindError::Transport(format!("no property {name}")))
            }
            "Set" => {
                let name = args.get(1).and_then(|v| v.as_str()).unwrap_or_default();
                let value = args.get(2).cloned().unwrap_or_default();
                table.insert(name.to_string(), value);
                Ok(Vec::new())
            }
            other => Err(DocbindError::Transport(format!("unknown method {other}"))),
        }
    }
}

impl Transport for MockTransport {
    fn call(
        &self,
        target: &ClientConfig,
        method: &str,
        args: Vec<Variant>,
    ) -> Result<Vec<Variant>, DocbindError> {
        self.state.lock().calls.push(Call {
            path: target.path.clone(),
            interface: target.interface.clone(),
            method: method.to_string(),
            args: args.clone(),
        });
        if target.interface == PROPERTIES_INTERFACE {
            return self.properties_call(target, method, &args);
        }
        self.state
            .lock()
            .responses
            .get(&(target.interface.clone(), method.to_string()))
            .cloned()
            .ok_or_else(|| DocbindError::Transport(format!("no response for {method}")))
    }

    fn register(
        &self,
        path: &ObjectPath,
        interface: &str,
    ) -> Result<(Subscription, EventStream<Signal>), DocbindError> {
        Ok(self.hub(path.as_str(), interface).subscribe())
    }

    fn disconnect(&self) -> Result<(), DocbindError> {
        self.state.lock().disconnected = true;
        for hub in self.hubs.lock().values() {
            hub.close_all();
        }
        Ok(())
    }
}
