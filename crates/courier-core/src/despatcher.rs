//! Type resolution and handler invocation for received envelopes.
//!
//! Resolution order:
//!
//! 1. No usable `AssemblyQualifiedName` or `Type` attribute: the envelope is
//!    unroutable ([`DespatchError::InvalidMessageContents`]).
//! 2. `AssemblyQualifiedName` matching a registered identity wins, whatever
//!    `Type` says.
//! 3. Otherwise `Type` is looked up by exact name
//!    ([`DespatchError::TypeResolution`] when nothing matches).
//!
//! The body is then deserialized into the resolved type and handed to the
//! handler resolved from a fresh [`HandlerScope`](crate::HandlerScope).

use crate::envelope::{attributes, CorrelationId, MessageEnvelope};
use crate::error::DespatchError;
use crate::handler::HandlerProvider;
use crate::registry::{TypeDescriptor, TypeRegistry};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Routes one envelope to its handler.
#[async_trait]
pub trait MessageDespatcher: Send + Sync {
    /// Resolve, deserialize and handle `envelope`.
    ///
    /// Never deletes or releases the message.
    async fn despatch(
        &self,
        correlation_id: CorrelationId,
        envelope: &MessageEnvelope,
    ) -> Result<(), DespatchError>;
}

/// Despatcher backed by a [`TypeRegistry`] and a [`HandlerProvider`].
pub struct Despatcher {
    registry: TypeRegistry,
    handlers: Arc<dyn HandlerProvider>,
}

impl Despatcher {
    /// Create a despatcher over a fixed set of types and handlers.
    pub fn new(registry: TypeRegistry, handlers: Arc<dyn HandlerProvider>) -> Self {
        Self { registry, handlers }
    }

    /// Registered types
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Resolve the registered type an envelope carries.
    pub fn resolve(&self, envelope: &MessageEnvelope) -> Result<&TypeDescriptor, DespatchError> {
        let identity = envelope.non_blank_attribute(attributes::ASSEMBLY_QUALIFIED_NAME);
        let type_name = envelope.non_blank_attribute(attributes::TYPE);

        if identity.is_none() && type_name.is_none() {
            return Err(DespatchError::InvalidMessageContents {
                message_id: envelope.log_id().to_string(),
            });
        }

        if let Some(identity) = identity {
            if let Some(descriptor) = self.registry.by_qualified_name(identity) {
                return Ok(descriptor);
            }

            debug!(
                message_id = %envelope.log_id(),
                identity = identity,
                "Qualified type identity not registered; falling back to type name"
            );
        }

        match type_name {
            Some(type_name) => {
                self.registry
                    .by_type_name(type_name)
                    .ok_or_else(|| DespatchError::TypeResolution {
                        identity: type_name.to_string(),
                    })
            }
            None => Err(DespatchError::TypeResolution {
                identity: identity.unwrap_or_default().to_string(),
            }),
        }
    }
}

#[async_trait]
impl MessageDespatcher for Despatcher {
    async fn despatch(
        &self,
        correlation_id: CorrelationId,
        envelope: &MessageEnvelope,
    ) -> Result<(), DespatchError> {
        let descriptor = self.resolve(envelope)?;

        debug!(
            message_id = %envelope.log_id(),
            type_name = descriptor.type_name(),
            "Resolved message type"
        );

        let scope = self.handlers.create_scope();
        descriptor
            .despatch(&scope, correlation_id, &envelope.body)
            .await
    }
}

#[cfg(test)]
#[path = "despatcher_tests.rs"]
mod tests;
