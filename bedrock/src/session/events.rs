//! Typed session events and the subscription/wait machinery.
//!
//! Every decoded packet is published as a generic [`Event::Packet`];
//! handler-recognised packets additionally raise a typed event. Callbacks
//! run inside the driver task, so they see session effects in order.

use bytes::Bytes;
use tokio::sync::oneshot;

/// Observable session events.
#[derive(Debug, Clone)]
pub enum Event {
    /// The RakNet handshake completed.
    RaknetConnect,
    /// The server accepted the Login packet.
    Login,
    /// StartGame arrived; the world mirror is populated.
    StartGame {
        entity_id: i64,
        runtime_entity_id: u64,
        world_name: String,
    },
    /// The player is fully in the world.
    Spawn,
    /// One 50 ms game tick.
    Tick(u64),
    /// Every decoded game packet, before typed handling.
    Packet {
        id: u32,
        name: Option<&'static str>,
        payload: Bytes,
    },
    /// A chat or system message.
    Text {
        source: String,
        message: String,
        xuid: String,
    },
    /// The server pushed a form at the client.
    FormRequest { form_id: u32, form_data: String },
    /// The server granted a chunk radius.
    ChunkRadiusUpdated(i32),
    EntityAdded { runtime_id: u64 },
    EntityRemoved { unique_id: i64 },
    /// The server kicked the session.
    Kick { message: String },
    /// The session ended, for any reason.
    Disconnect { reason: String },
    /// An automatic reconnect attempt is starting.
    Reconnect { attempt: u32 },
    /// A non-fatal or login-fatal error.
    Error { message: String },
}

/// Which packets a subscription or wait applies to.
#[derive(Debug, Clone)]
pub enum PacketSelector {
    Id(u32),
    Name(String),
}

impl PacketSelector {
    pub(crate) fn matches(&self, id: u32, name: Option<&'static str>) -> bool {
        match self {
            PacketSelector::Id(want) => *want == id,
            PacketSelector::Name(want) => name == Some(want.as_str()),
        }
    }
}

impl From<u32> for PacketSelector {
    fn from(id: u32) -> Self {
        PacketSelector::Id(id)
    }
}

impl From<&str> for PacketSelector {
    fn from(name: &str) -> Self {
        PacketSelector::Name(name.to_string())
    }
}

pub(crate) type EventCallback = Box<dyn FnMut(&Event) + Send>;

/// Callback registry and one-shot packet waiters, owned by the driver.
#[derive(Default)]
pub(crate) struct Subscriptions {
    event_subscribers: Vec<(u64, EventCallback)>,
    packet_subscribers: Vec<(u64, PacketSelector, EventCallback)>,
    waiters: Vec<(PacketSelector, oneshot::Sender<(u32, Bytes)>)>,
}

impl Subscriptions {
    pub fn subscribe_events(&mut self, id: u64, callback: EventCallback) {
        self.event_subscribers.push((id, callback));
    }

    pub fn subscribe_packets(&mut self, id: u64, selector: PacketSelector, callback: EventCallback) {
        self.packet_subscribers.push((id, selector, callback));
    }

    pub fn unsubscribe(&mut self, id: u64) {
        self.event_subscribers.retain(|(sub, _)| *sub != id);
        self.packet_subscribers.retain(|(sub, _, _)| *sub != id);
    }

    pub fn add_waiter(&mut self, selector: PacketSelector, tx: oneshot::Sender<(u32, Bytes)>) {
        self.waiters.push((selector, tx));
    }

    /// Publish an event to every matching subscriber.
    pub fn emit(&mut self, event: &Event) {
        for (_, callback) in &mut self.event_subscribers {
            callback(event);
        }
        if let Event::Packet { id, name, .. } = event {
            for (_, selector, callback) in &mut self.packet_subscribers {
                if selector.matches(*id, *name) {
                    callback(event);
                }
            }
        }
    }

    /// Complete every waiter matched by this packet.
    pub fn offer_to_waiters(&mut self, id: u32, name: Option<&'static str>, payload: &Bytes) {
        let mut kept = Vec::with_capacity(self.waiters.len());
        for (selector, tx) in self.waiters.drain(..) {
            if selector.matches(id, name) {
                let _ = tx.send((id, payload.clone()));
            } else {
                kept.push((selector, tx));
            }
        }
        self.waiters = kept;
    }

    /// Drop all pending waiters; their receivers observe a disconnect.
    pub fn fail_waiters(&mut self) {
        self.waiters.clear();
    }
}
