//! # Courier Core
//!
//! Queue polling and type-routed message despatch on top of a managed
//! queue/topic service.
//!
//! This library provides:
//! - A message envelope with reserved type and correlation attributes
//! - A type registry that maps attribute-carried type names to message shapes
//! - A despatcher that deserializes envelopes and invokes the matching handler
//! - A queue poller that deletes messages on success and releases them on failure
//! - Sender and publisher envelope construction for outgoing messages
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for despatch, transport and send operations
//! - [`envelope`] - Envelope, receipt handle and correlation identifiers
//! - [`registry`] - Registry of known message types
//! - [`handler`] - Handler trait and per-despatch handler scopes
//! - [`despatcher`] - Type resolution and handler invocation
//! - [`poller`] - Receive, despatch, delete-or-release loop
//! - [`sender`] - Outgoing envelope construction, sender and publisher
//! - [`transport`] - Queue and topic transport traits
//! - [`memory`] - In-memory transport for tests and development
//! - [`config`] - Polling and logging configuration

pub mod config;
pub mod despatcher;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod memory;
pub mod poller;
pub mod registry;
pub mod sender;
pub mod transport;

// Re-export commonly used types at crate root for convenience
pub use config::{init_tracing, ConfigError, LoggingConfig, PollingConfig};
pub use despatcher::{Despatcher, MessageDespatcher};
pub use envelope::{
    attributes, CorrelationId, CourierMessage, MessageEnvelope, MessageId, ReceiptHandle,
    ReceivedEnvelope,
};
pub use error::{CorrelationIdError, DespatchError, SendError, TransportError};
pub use handler::{HandlerProvider, HandlerRegistry, HandlerScope, MessageHandler};
pub use memory::InMemoryTransport;
pub use poller::{shutdown_signal, QueuePoller, ShutdownSignal, ShutdownTrigger};
pub use registry::{TypeDescriptor, TypeRegistry};
pub use sender::{build_envelope, MessagePublisher, MessageSender, PublishOptions, SendOptions};
pub use transport::{DeliveryOptions, QueueTransport, ReceiveRequest, TopicTransport};
