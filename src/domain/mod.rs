//! Domain layer: channels, connections, events and the subscriber registry.
//!
//! Everything in here is transport-agnostic. The SSE layer adapts an HTTP
//! response body to an [`EventSink`]; the registry and publisher never see
//! axum types.

pub mod channel;
pub mod channel_family;
pub mod connection;
pub mod connection_id;
pub mod delivery;
pub mod event;
pub mod registry;

pub use channel::Channel;
pub use channel_family::{ChannelCatalog, ChannelFamily, Subscription};
pub use connection::{Connection, EventSink, SendError};
pub use connection_id::ConnectionId;
pub use delivery::DeliveryReport;
pub use event::{EncodedEvent, Event};
pub use registry::{ChannelStats, Registry};
