//! Runtime support for generated clients.
//!
//! Generated code talks to the peer only through the [`Transport`] trait; the concrete bus
//! connection lives outside this crate. On top of it [`Client`] implements the standard
//! `org.freedesktop.DBus.Properties` calls (`Get`, `Set`, `GetAll`) and subscriptions for
//! `PropertiesChanged` and the `org.freedesktop.DBus.ObjectManager` lifecycle signals.

use std::{collections::VecDeque, fmt, sync::Arc};

use crate::{
    error::{DocbindError, MarshalError},
    variant::{FromVariant, ObjectPath, PropertyMap, Variant},
};

pub mod signal;
pub mod store;

pub use signal::{
    EventStream, ObjectEvent, ObjectWatch, PropertyChanged, PropertyWatch, Signal, SignalHub,
    SignalWatch, Subscription,
};
pub use store::PropertyStore;

pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
pub const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";

/// Addressing of one remote object interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bus name of the peer, e.g. `org.bluez`
    pub service: String,
    pub interface: String,
    pub path: ObjectPath,
    /// Path at which the peer exports its object manager
    pub object_manager_path: ObjectPath,
}

impl ClientConfig {
    pub fn new<S: Into<String>, I: Into<String>>(service: S, interface: I, path: ObjectPath) -> Self {
        ClientConfig {
            service: service.into(),
            interface: interface.into(),
            path,
            object_manager_path: ObjectPath::new("/"),
        }
    }

    /// The same object, addressed through another interface.
    pub fn with_interface(&self, interface: &str) -> ClientConfig {
        ClientConfig {
            interface: interface.to_string(),
            ..self.clone()
        }
    }
}

/// The remote-call transport generated clients are built on.
pub trait Transport: Send + Sync {
    /// Invoke `method` on `target` with positional `args`; returns the positional results.
    fn call(
        &self,
        target: &ClientConfig,
        method: &str,
        args: Vec<Variant>,
    ) -> Result<Vec<Variant>, DocbindError>;

    /// Subscribe to the signals `interface` emits on `path`.
    fn register(
        &self,
        path: &ObjectPath,
        interface: &str,
    ) -> Result<(Subscription, EventStream<Signal>), DocbindError>;

    fn disconnect(&self) -> Result<(), DocbindError> {
        Ok(())
    }
}

/// A handle on one remote object interface.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish()
    }
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Client { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn path(&self) -> &ObjectPath {
        &self.config.path
    }

    pub fn interface(&self) -> &str {
        &self.config.interface
    }

    pub fn call(&self, method: &str, args: Vec<Variant>) -> Result<Vec<Variant>, DocbindError> {
        tracing::trace!(
            "[Client] {} {}.{}",
            self.config.path,
            self.config.interface,
            method
        );
        self.transport.call(&self.config, method, args)
    }

    fn call_properties(
        &self,
        method: &str,
        args: Vec<Variant>,
    ) -> Result<Vec<Variant>, DocbindError> {
        let target = self.config.with_interface(PROPERTIES_INTERFACE);
        self.transport.call(&target, method, args)
    }

    pub fn get_property(&self, name: &str) -> Result<Variant, DocbindError> {
        let mut returns = Returns::new(
            "Get",
            self.call_properties(
                "Get",
                vec![Variant::from(self.interface()), Variant::from(name)],
            )?,
        );
        Ok(returns.take()?)
    }

    pub fn get_property_as<T: FromVariant>(&self, name: &str) -> Result<T, DocbindError> {
        let value = self.get_property(name)?;
        Ok(T::from_variant(value).map_err(|e| e.for_field(name))?)
    }

    pub fn set_property(&self, name: &str, value: Variant) -> Result<(), DocbindError> {
        self.call_properties(
            "Set",
            vec![Variant::from(self.interface()), Variant::from(name), value],
        )?;
        Ok(())
    }

    pub fn get_all_properties(&self) -> Result<PropertyMap, DocbindError> {
        let mut returns = Returns::new(
            "GetAll",
            self.call_properties("GetAll", vec![Variant::from(self.interface())])?,
        );
        Ok(returns.take()?)
    }

    /// Raw signals of `interface` on this object.
    pub fn register(
        &self,
        interface: &str,
    ) -> Result<(Subscription, EventStream<Signal>), DocbindError> {
        self.transport.register(&self.config.path, interface)
    }

    /// One signal of this client's interface, by member name.
    pub fn watch_signal(&self, member: &str) -> Result<SignalWatch, DocbindError> {
        let (subscription, stream) = self.register(&self.config.interface)?;
        Ok(SignalWatch::new(subscription, stream, member))
    }

    pub fn watch_properties(&self) -> Result<PropertyWatch, DocbindError> {
        let (subscription, stream) = self.register(PROPERTIES_INTERFACE)?;
        Ok(PropertyWatch::new(
            subscription,
            stream,
            &self.config.interface,
        ))
    }

    /// Objects added or removed below this client's path.
    pub fn watch_objects(&self) -> Result<ObjectWatch, DocbindError> {
        let (subscription, stream) = self
            .transport
            .register(&self.config.object_manager_path, OBJECT_MANAGER_INTERFACE)?;
        Ok(ObjectWatch::new(
            subscription,
            stream,
            self.config.path.clone(),
        ))
    }

    pub fn disconnect(&self) -> Result<(), DocbindError> {
        self.transport.disconnect()
    }
}

/// Positional unpacking of a call's results.
#[derive(Debug)]
pub struct Returns {
    method: String,
    values: VecDeque<Variant>,
    received: usize,
    index: usize,
}

impl Returns {
    pub fn new(method: &str, values: Vec<Variant>) -> Self {
        Returns {
            method: method.to_string(),
            received: values.len(),
            values: values.into(),
            index: 0,
        }
    }

    /// Convert the next result to `T`.
    pub fn take<T: FromVariant>(&mut self) -> Result<T, MarshalError> {
        let index = self.index;
        let value = self
            .values
            .pop_front()
            .ok_or_else(|| MarshalError::MissingReturn {
                method: self.method.clone(),
                index,
                received: self.received,
            })?;
        self.index += 1;
        T::from_variant(value).map_err(|e| e.for_field(&format!("{}#{index}", self.method)))
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}
