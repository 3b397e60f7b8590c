//! Message handlers and per-despatch handler scopes.
//!
//! Handlers are registered per message type as factories. Each despatch asks
//! the [`HandlerProvider`] for a fresh [`HandlerScope`] and resolves its handler
//! from there, so a handler instance never outlives the message it handles.

use crate::envelope::{CorrelationId, CourierMessage};
use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Handles one message type.
///
/// Returning an error releases the message back to the queue for redelivery.
#[async_trait]
pub trait MessageHandler<M: CourierMessage>: Send + Sync {
    async fn handle(&self, correlation_id: CorrelationId, message: M) -> anyhow::Result<()>;
}

/// Source of handler scopes.
pub trait HandlerProvider: Send + Sync {
    /// Create an isolated scope for a single despatch.
    fn create_scope(&self) -> HandlerScope;
}

type HandlerFactory<M> = Arc<dyn Fn() -> Box<dyn MessageHandler<M>> + Send + Sync>;

type FactoryMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Handler lookup for a single despatch.
///
/// Every call to [`resolve`](Self::resolve) builds a new handler instance from
/// the registered factory.
#[derive(Clone)]
pub struct HandlerScope {
    factories: Arc<FactoryMap>,
}

impl HandlerScope {
    /// Resolve the handler bound to `M`, if one is registered.
    pub fn resolve<M: CourierMessage>(&self) -> Option<Box<dyn MessageHandler<M>>> {
        let factory = self.factories.get(&TypeId::of::<M>())?;
        let factory = factory.downcast_ref::<HandlerFactory<M>>()?;
        Some(factory())
    }
}

/// Explicit registry of handler factories, keyed by message type.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use courier_core::{CorrelationId, CourierMessage, HandlerProvider, HandlerRegistry, MessageHandler};
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
/// struct OrderPlacedHandler;
///
/// #[async_trait]
/// impl MessageHandler<OrderPlaced> for OrderPlacedHandler {
///     async fn handle(&self, _correlation_id: CorrelationId, _message: OrderPlaced) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
///
/// let mut handlers = HandlerRegistry::new();
/// handlers.register::<OrderPlaced, _, _>(|| OrderPlacedHandler);
///
/// assert!(handlers.create_scope().resolve::<OrderPlaced>().is_some());
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    factories: FactoryMap,
}

impl HandlerRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory that builds a handler for `M`.
    ///
    /// A second registration for the same message type replaces the first.
    pub fn register<M, H, F>(&mut self, factory: F) -> &mut Self
    where
        M: CourierMessage,
        H: MessageHandler<M> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let factory: HandlerFactory<M> =
            Arc::new(move || -> Box<dyn MessageHandler<M>> { Box::new(factory()) });
        self.factories.insert(TypeId::of::<M>(), Arc::new(factory));
        self
    }

    /// Check whether a handler is registered for `M`.
    pub fn contains<M: CourierMessage>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<M>())
    }

    /// Freeze the registry into a provider that can be shared across pollers.
    pub fn into_provider(self) -> Arc<dyn HandlerProvider> {
        Arc::new(FrozenHandlers {
            factories: Arc::new(self.factories),
        })
    }
}

impl HandlerProvider for HandlerRegistry {
    fn create_scope(&self) -> HandlerScope {
        HandlerScope {
            factories: Arc::new(self.factories.clone()),
        }
    }
}

/// Read-only provider whose scopes share one factory map.
struct FrozenHandlers {
    factories: Arc<FactoryMap>,
}

impl HandlerProvider for FrozenHandlers {
    fn create_scope(&self) -> HandlerScope {
        HandlerScope {
            factories: Arc::clone(&self.factories),
        }
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
