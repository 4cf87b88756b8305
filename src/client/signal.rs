use futures_core::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    task::{Context, Poll},
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::store::PropertyStore;
use crate::{
    error::MarshalError,
    marshal::PropertyRecord,
    variant::{FromVariant, ObjectPath, PropertyMap, Variant},
};

pub const PROPERTIES_CHANGED: &str = "PropertiesChanged";
pub const INTERFACES_ADDED: &str = "InterfacesAdded";
pub const INTERFACES_REMOVED: &str = "InterfacesRemoved";

/// A signal as delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub path: ObjectPath,
    pub interface: String,
    pub member: String,
    pub body: Vec<Variant>,
}

struct Subscriber<E> {
    closed: Arc<AtomicBool>,
    sender: UnboundedSender<E>,
}

struct HubState<E> {
    next_id: u64,
    subscribers: BTreeMap<u64, Subscriber<E>>,
}

/// Fan-out of events to any number of cancellable subscriptions.
pub struct SignalHub<E>(Arc<Mutex<HubState<E>>>);

impl<E> Clone for SignalHub<E> {
    fn clone(&self) -> Self {
        SignalHub(self.0.clone())
    }
}

impl<E: Clone + Send + 'static> Default for SignalHub<E> {
    fn default() -> Self {
        SignalHub::new()
    }
}

impl<E: Clone + Send + 'static> SignalHub<E> {
    pub fn new() -> Self {
        SignalHub(Arc::new(Mutex::new(HubState {
            next_id: 0,
            subscribers: BTreeMap::new(),
        })))
    }

    pub fn subscribe(&self) -> (Subscription, EventStream<E>) {
        let (sender, receiver) = unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let id = {
            let mut state = self.0.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers.insert(
                id,
                Subscriber {
                    closed: closed.clone(),
                    sender,
                },
            );
            id
        };
        let hub: Weak<Mutex<HubState<E>>> = Arc::downgrade(&self.0);
        let detach = move || {
            if let Some(state) = hub.upgrade() {
                state.lock().subscribers.remove(&id);
            }
        };
        (
            Subscription {
                id,
                closed: closed.clone(),
                detach: Arc::new(detach),
            },
            EventStream { receiver, closed },
        )
    }

    /// Deliver `event` to every open subscription; returns how many received it.
    pub fn publish(&self, event: E) -> usize {
        let mut state = self.0.lock();
        let mut delivered = 0;
        state.subscribers.retain(|_, sub| {
            if sub.closed.load(Ordering::Acquire) {
                return false;
            }
            match sub.sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.lock().subscribers.len()
    }

    /// Drop every subscription; open streams end after draining.
    pub fn close_all(&self) {
        self.0.lock().subscribers.clear();
    }
}

/// Handle to one subscription. Cloning the handle does not duplicate the subscription, and
/// dropping it does not cancel it; only [`Subscription::unsubscribe`] does.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    closed: Arc<AtomicBool>,
    detach: Arc<dyn Fn() + Send + Sync>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop delivery. Once this returns the paired stream yields no further event, including
    /// events already queued. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        (self.detach)();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Receiving half of a subscription.
pub struct EventStream<E> {
    receiver: UnboundedReceiver<E>,
    closed: Arc<AtomicBool>,
}

impl<E> EventStream<E> {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    pub async fn next(&mut self) -> Option<E> {
        if !self.is_open() {
            return None;
        }
        let event = self.receiver.recv().await?;
        self.is_open().then_some(event)
    }

    /// Next queued event without waiting.
    pub fn try_next(&mut self) -> Option<E> {
        if !self.is_open() {
            return None;
        }
        let event = self.receiver.try_recv().ok()?;
        self.is_open().then_some(event)
    }

    /// Blocking variant of [`EventStream::next`]; must not be called from within an async
    /// runtime.
    pub fn blocking_next(&mut self) -> Option<E> {
        if !self.is_open() {
            return None;
        }
        let event = self.receiver.blocking_recv()?;
        self.is_open().then_some(event)
    }
}

impl<E> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        if !self.is_open() {
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(event)) if self.is_open() => Poll::Ready(Some(event)),
            Poll::Ready(_) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn body_arg<T: FromVariant>(signal: &Signal, index: usize) -> Result<T, MarshalError> {
    let value = signal
        .body
        .get(index)
        .cloned()
        .ok_or_else(|| MarshalError::MissingReturn {
            method: signal.member.clone(),
            index,
            received: signal.body.len(),
        })?;
    T::from_variant(value).map_err(|e| e.for_field(&format!("{}#{index}", signal.member)))
}

/// Decoded `PropertiesChanged` signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyChanged {
    pub interface: String,
    pub changed: PropertyMap,
    pub invalidated: Vec<String>,
}

impl PropertyChanged {
    pub fn decode(signal: &Signal) -> Result<PropertyChanged, MarshalError> {
        Ok(PropertyChanged {
            interface: body_arg(signal, 0)?,
            changed: body_arg(signal, 1)?,
            invalidated: if signal.body.len() > 2 {
                body_arg(signal, 2)?
            } else {
                Vec::new()
            },
        })
    }

    /// Apply the changed values to `store` under its write lock.
    pub fn apply_to<R: PropertyRecord>(&self, store: &PropertyStore<R>) -> Result<(), MarshalError> {
        store.update_from_map(&self.changed)
    }
}

/// Decoded `ObjectManager` lifecycle signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectEvent {
    /// Object path, interface name -> its properties
    Added {
        path: ObjectPath,
        interfaces: PropertyMap,
    },
    Removed {
        path: ObjectPath,
        interfaces: Vec<String>,
    },
}

impl ObjectEvent {
    pub fn decode(signal: &Signal) -> Result<Option<ObjectEvent>, MarshalError> {
        match signal.member.as_str() {
            INTERFACES_ADDED => Ok(Some(ObjectEvent::Added {
                path: body_arg(signal, 0)?,
                interfaces: body_arg(signal, 1)?,
            })),
            INTERFACES_REMOVED => Ok(Some(ObjectEvent::Removed {
                path: body_arg(signal, 0)?,
                interfaces: body_arg(signal, 1)?,
            })),
            _ => Ok(None),
        }
    }

    pub fn path(&self) -> &ObjectPath {
        match self {
            ObjectEvent::Added { path, .. } | ObjectEvent::Removed { path, .. } => path,
        }
    }
}

/// Property changes of one interface on one object.
#[derive(Debug)]
pub struct PropertyWatch {
    subscription: Subscription,
    stream: EventStream<Signal>,
    interface: String,
}

impl PropertyWatch {
    pub fn new(subscription: Subscription, stream: EventStream<Signal>, interface: &str) -> Self {
        PropertyWatch {
            subscription,
            stream,
            interface: interface.to_string(),
        }
    }

    fn accept(&self, signal: Signal) -> Option<PropertyChanged> {
        if signal.member != PROPERTIES_CHANGED {
            return None;
        }
        match PropertyChanged::decode(&signal) {
            Ok(change) if change.interface == self.interface => Some(change),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("[PropertyWatch] skipping malformed signal: {}", e);
                None
            }
        }
    }

    pub async fn next(&mut self) -> Option<PropertyChanged> {
        loop {
            let signal = self.stream.next().await?;
            if let Some(change) = self.accept(signal) {
                return Some(change);
            }
        }
    }

    pub fn try_next(&mut self) -> Option<PropertyChanged> {
        loop {
            let signal = self.stream.try_next()?;
            if let Some(change) = self.accept(signal) {
                return Some(change);
            }
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn unsubscribe(&self) {
        self.subscription.unsubscribe()
    }
}

/// Objects added below or removed from a root path.
#[derive(Debug)]
pub struct ObjectWatch {
    subscription: Subscription,
    stream: EventStream<Signal>,
    root: ObjectPath,
}

impl ObjectWatch {
    pub fn new(subscription: Subscription, stream: EventStream<Signal>, root: ObjectPath) -> Self {
        ObjectWatch {
            subscription,
            stream,
            root,
        }
    }

    fn accept(&self, signal: Signal) -> Option<ObjectEvent> {
        match ObjectEvent::decode(&signal) {
            Ok(Some(event)) if event.path().starts_with(&self.root) => Some(event),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("[ObjectWatch] skipping malformed signal: {}", e);
                None
            }
        }
    }

    pub async fn next(&mut self) -> Option<ObjectEvent> {
        loop {
            let signal = self.stream.next().await?;
            if let Some(event) = self.accept(signal) {
                return Some(event);
            }
        }
    }

    pub fn try_next(&mut self) -> Option<ObjectEvent> {
        loop {
            let signal = self.stream.try_next()?;
            if let Some(event) = self.accept(signal) {
                return Some(event);
            }
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn unsubscribe(&self) {
        self.subscription.unsubscribe()
    }
}

/// One interface-defined signal, by member name.
#[derive(Debug)]
pub struct SignalWatch {
    subscription: Subscription,
    stream: EventStream<Signal>,
    member: String,
}

impl SignalWatch {
    pub fn new(subscription: Subscription, stream: EventStream<Signal>, member: &str) -> Self {
        SignalWatch {
            subscription,
            stream,
            member: member.to_string(),
        }
    }

    pub async fn next(&mut self) -> Option<Signal> {
        loop {
            let signal = self.stream.next().await?;
            if signal.member == self.member {
                return Some(signal);
            }
        }
    }

    pub fn try_next(&mut self) -> Option<Signal> {
        loop {
            let signal = self.stream.try_next()?;
            if signal.member == self.member {
                return Some(signal);
            }
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn unsubscribe(&self) {
        self.subscription.unsubscribe()
    }
}

impl<E> fmt::Debug for EventStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn unsubscribe_is_idempotent_and_final() {
        let hub: SignalHub<u32> = SignalHub::new();
        let (sub, mut stream) = hub.subscribe();
        assert_eq!(hub.publish(1), 1);
        assert_eq!(hub.publish(2), 1);
        assert_eq!(stream.try_next(), Some(1));

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(sub.is_closed());
        assert_eq!(hub.subscriber_count(), 0);
        // 2 was queued before unsubscribe and must not surface.
        assert_eq!(stream.try_next(), None);
        assert_eq!(hub.publish(3), 0);
    }

    #[test]
    fn dropping_the_handle_keeps_delivery() {
        let hub: SignalHub<&'static str> = SignalHub::new();
        let (sub, mut stream) = hub.subscribe();
        drop(sub);
        hub.publish("still here");
        assert_eq!(stream.try_next(), Some("still here"));
    }

    #[test]
    fn decode_property_changes() {
        let mut changed = PropertyMap::new();
        changed.insert("Volume".to_string(), Variant::UInt16(42));
        let signal = Signal {
            path: ObjectPath::new("/org/bluez/hci0/dev_00/fd0"),
            interface: "org.freedesktop.DBus.Properties".to_string(),
            member: PROPERTIES_CHANGED.to_string(),
            body: vec![
                Variant::from("org.bluez.MediaTransport1"),
                Variant::Map(changed.clone()),
                Variant::Array(vec![Variant::from("Delay")]),
            ],
        };
        let change = PropertyChanged::decode(&signal).unwrap();
        assert_eq!(change.interface, "org.bluez.MediaTransport1");
        assert_eq!(change.changed, changed);
        assert_eq!(change.invalidated, vec!["Delay".to_string()]);

        let truncated = Signal {
            body: vec![Variant::from("org.bluez.MediaTransport1")],
            ..signal
        };
        assert!(matches!(
            PropertyChanged::decode(&truncated),
            Err(MarshalError::MissingReturn { index: 1, .. })
        ));
    }

    #[test]
    fn object_events_filter_by_member() {
        let signal = Signal {
            path: ObjectPath::new("/"),
            interface: "org.freedesktop.DBus.ObjectManager".to_string(),
            member: INTERFACES_REMOVED.to_string(),
            body: vec![
                Variant::Path(ObjectPath::new("/org/bluez/hci0/dev_00")),
                Variant::Array(vec![Variant::from("org.bluez.Device1")]),
            ],
        };
        let event = ObjectEvent::decode(&signal).unwrap().unwrap();
        assert_eq!(event.path().as_str(), "/org/bluez/hci0/dev_00");

        let other = Signal {
            member: "Unrelated".to_string(),
            ..signal
        };
        assert_eq!(ObjectEvent::decode(&other).unwrap(), None);
    }
}
