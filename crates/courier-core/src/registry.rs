//! Registry of message types known to this process.
//!
//! The registry replaces runtime type loading: an attribute-carried type name
//! can only be resolved to a shape that was registered at startup. Each entry
//! knows how to deserialize its body and hand it to the handler resolved from
//! a [`HandlerScope`].

use crate::envelope::{CorrelationId, CourierMessage};
use crate::error::DespatchError;
use crate::handler::HandlerScope;
use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

// ============================================================================
// Routes
// ============================================================================

/// Type-erased deserialize-and-invoke step for one registered type.
#[async_trait]
trait Route: Send + Sync {
    async fn despatch(
        &self,
        scope: &HandlerScope,
        correlation_id: CorrelationId,
        body: &[u8],
    ) -> Result<(), DespatchError>;
}

struct TypedRoute<M>(PhantomData<fn() -> M>);

#[async_trait]
impl<M: CourierMessage> Route for TypedRoute<M> {
    async fn despatch(
        &self,
        scope: &HandlerScope,
        correlation_id: CorrelationId,
        body: &[u8],
    ) -> Result<(), DespatchError> {
        let message: M =
            serde_json::from_slice(body).map_err(|source| DespatchError::Deserialization {
                type_name: M::TYPE_NAME.to_string(),
                source,
            })?;

        let handler = scope
            .resolve::<M>()
            .ok_or_else(|| DespatchError::HandlerNotFound {
                type_name: M::TYPE_NAME.to_string(),
            })?;

        handler
            .handle(correlation_id, message)
            .await
            .map_err(|source| DespatchError::HandlerExecution {
                type_name: M::TYPE_NAME.to_string(),
                source,
            })
    }
}

// ============================================================================
// TypeDescriptor
// ============================================================================

/// A registered message type.
#[derive(Clone)]
pub struct TypeDescriptor {
    type_name: &'static str,
    qualified_name: &'static str,
    route: Arc<dyn Route>,
}

impl TypeDescriptor {
    /// Describe the message type `M`.
    pub fn of<M: CourierMessage>() -> Self {
        Self {
            type_name: M::TYPE_NAME,
            qualified_name: M::qualified_name(),
            route: Arc::new(TypedRoute::<M>(PhantomData)),
        }
    }

    /// Short type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Fully-qualified type identity
    pub fn qualified_name(&self) -> &'static str {
        self.qualified_name
    }

    /// Deserialize `body` as this type and invoke the handler resolved from
    /// `scope`.
    pub async fn despatch(
        &self,
        scope: &HandlerScope,
        correlation_id: CorrelationId,
        body: &[u8],
    ) -> Result<(), DespatchError> {
        self.route.despatch(scope, correlation_id, body).await
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("qualified_name", &self.qualified_name)
            .finish()
    }
}

// ============================================================================
// TypeRegistry
// ============================================================================

/// Set of message types this process can despatch.
///
/// Built once at startup and used read-only afterwards.
///
/// # Examples
///
/// ```rust
/// use courier_core::{CourierMessage, TypeRegistry};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct OrderPlaced {
///     order_id: u64,
/// }
///
/// impl CourierMessage for OrderPlaced {
///     const TYPE_NAME: &'static str = "OrderPlaced";
/// }
///
/// let mut registry = TypeRegistry::new();
/// registry.register::<OrderPlaced>();
///
/// assert!(registry.by_type_name("OrderPlaced").is_some());
/// assert!(registry.by_type_name("orderplaced").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    by_qualified_name: HashMap<&'static str, TypeDescriptor>,
    by_type_name: HashMap<&'static str, TypeDescriptor>,
}

impl TypeRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the message type `M`.
    ///
    /// Re-registering a qualified name replaces its entry. When two different
    /// types share a short name, the first registration keeps the short name
    /// and the second is reachable only through its qualified name.
    pub fn register<M: CourierMessage>(&mut self) -> &mut Self {
        let descriptor = TypeDescriptor::of::<M>();

        match self.by_type_name.get(descriptor.type_name) {
            Some(existing) if existing.qualified_name != descriptor.qualified_name => {
                warn!(
                    type_name = descriptor.type_name,
                    kept = existing.qualified_name,
                    shadowed = descriptor.qualified_name,
                    "Short type name already registered; keeping the first registration"
                );
            }
            _ => {
                self.by_type_name
                    .insert(descriptor.type_name, descriptor.clone());
            }
        }

        self.by_qualified_name
            .insert(descriptor.qualified_name, descriptor);
        self
    }

    /// Look up a type by its fully-qualified identity.
    pub fn by_qualified_name(&self, qualified_name: &str) -> Option<&TypeDescriptor> {
        self.by_qualified_name.get(qualified_name)
    }

    /// Look up a type by exact short name.
    pub fn by_type_name(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.by_type_name.get(type_name)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.by_qualified_name.len()
    }

    /// Check whether no type is registered
    pub fn is_empty(&self) -> bool {
        self.by_qualified_name.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
