//! Cloud-variable session client.
//!
//! A cloud session is a persistent WebSocket connection to the
//! cloud-variable service over which small named string values are
//! synchronized between every client attached to the same project. This
//! crate provides:
//! - the line-delimited JSON wire codec ([`codec`])
//! - the local variable cache ([`store`])
//! - pub/sub fan-out of inbound `set` events ([`registry`])
//! - the transport seam and its `tokio-tungstenite` implementation
//!   ([`transport`])
//! - the session state machine that ties them together ([`session`])

pub mod codec;
pub mod error;
pub mod registry;
pub mod session;
pub mod store;
pub mod transport;

pub use codec::{CloudEvent, DecodeError, OutboundFrame, SetEvent, decode_chunk, decode_line};
pub use error::CloudError;
pub use registry::{SubscriberRegistry, Subscription, SubscriptionError};
pub use session::{CloudSession, SessionState};
pub use store::VariableStore;
pub use transport::{CloudConnector, CloudTransport, ConnectAuth, TransportError};
pub use transport::ws::WsConnector;
