//! # Courier AWS
//!
//! Amazon SQS and SNS transports for `courier-core`, built on direct HTTP
//! calls to the AWS query API with Signature V4 signing.
//!
//! ## Module Organization
//!
//! - [`config`] - Region, endpoint and credential settings
//! - [`error`] - AWS errors and their mapping to transport errors
//! - [`signer`] - Signature V4 signing and credentials
//! - [`sqs`] - SQS queue transport
//! - [`sns`] - SNS topic transport
//!
//! ## Example
//!
//! ```no_run
//! use courier_aws::{AwsTransportConfig, SqsTransport};
//! use courier_core::{Despatcher, HandlerRegistry, PollingConfig, QueuePoller, TypeRegistry};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = SqsTransport::new(&AwsTransportConfig::new("eu-west-1"))?;
//! let despatcher = Despatcher::new(TypeRegistry::new(), HandlerRegistry::new().into_provider());
//!
//! let poller = QueuePoller::new(
//!     Arc::new(transport),
//!     Arc::new(despatcher),
//!     PollingConfig::new("orders"),
//! );
//! # Ok(())
//! # }
//! ```

mod client;
pub mod config;
pub mod error;
pub mod signer;
pub mod sns;
pub mod sqs;
mod xml;

pub use config::AwsTransportConfig;
pub use error::AwsError;
pub use signer::Credentials;
pub use sns::SnsTransport;
pub use sqs::SqsTransport;
