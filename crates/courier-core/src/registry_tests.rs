//! Tests for [`TypeRegistry`] and [`TypeDescriptor`].

use super::*;
use crate::handler::{HandlerProvider, HandlerRegistry, MessageHandler};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Serialize, Deserialize)]
struct InvoiceIssued {
    invoice_id: String,
}

impl CourierMessage for InvoiceIssued {
    const TYPE_NAME: &'static str = "InvoiceIssued";
}

mod legacy {
    use super::*;

    /// Same short name as the outer type, different identity.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct InvoiceIssued {
        pub number: u32,
    }

    impl CourierMessage for InvoiceIssued {
        const TYPE_NAME: &'static str = "InvoiceIssued";

        fn qualified_name() -> &'static str {
            "Billing.Legacy.InvoiceIssued, Billing"
        }
    }
}

struct CapturingHandler {
    seen: Arc<Mutex<Vec<(CorrelationId, String)>>>,
}

#[async_trait]
impl MessageHandler<InvoiceIssued> for CapturingHandler {
    async fn handle(
        &self,
        correlation_id: CorrelationId,
        message: InvoiceIssued,
    ) -> anyhow::Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((correlation_id, message.invoice_id));
        Ok(())
    }
}

mod lookup {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = TypeRegistry::new();

        assert!(registry.is_empty());
        assert!(registry.by_type_name("InvoiceIssued").is_none());
    }

    #[test]
    fn test_lookup_by_both_names() {
        let mut registry = TypeRegistry::new();
        registry.register::<InvoiceIssued>();

        let by_name = registry.by_type_name("InvoiceIssued").unwrap();
        let by_identity = registry
            .by_qualified_name(InvoiceIssued::qualified_name())
            .unwrap();

        assert_eq!(by_name.qualified_name(), by_identity.qualified_name());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_type_name_lookup_is_exact() {
        let mut registry = TypeRegistry::new();
        registry.register::<InvoiceIssued>();

        assert!(registry.by_type_name("invoiceissued").is_none());
        assert!(registry.by_type_name("InvoiceIssued ").is_none());
    }

    #[test]
    fn test_registering_same_type_twice_keeps_one_entry() {
        let mut registry = TypeRegistry::new();
        registry
            .register::<InvoiceIssued>()
            .register::<InvoiceIssued>();

        assert_eq!(registry.len(), 1);
    }

    /// Verify that the first registration keeps a contested short name.
    #[test]
    fn test_short_name_collision_keeps_first() {
        let mut registry = TypeRegistry::new();
        registry
            .register::<InvoiceIssued>()
            .register::<legacy::InvoiceIssued>();

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry
                .by_type_name("InvoiceIssued")
                .unwrap()
                .qualified_name(),
            InvoiceIssued::qualified_name()
        );
        assert!(registry
            .by_qualified_name("Billing.Legacy.InvoiceIssued, Billing")
            .is_some());
    }
}

mod descriptor_despatch {
    use super::*;

    #[tokio::test]
    async fn test_descriptor_deserializes_and_invokes_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler_seen = Arc::clone(&seen);
        let mut handlers = HandlerRegistry::new();
        handlers.register::<InvoiceIssued, _, _>(move || CapturingHandler {
            seen: Arc::clone(&handler_seen),
        });

        let descriptor = TypeDescriptor::of::<InvoiceIssued>();
        let correlation_id = CorrelationId::new();

        descriptor
            .despatch(
                &handlers.create_scope(),
                correlation_id,
                br#"{"invoice_id":"INV-1"}"#,
            )
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(correlation_id, "INV-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_descriptor_reports_deserialization_failure() {
        let handlers = HandlerRegistry::new();
        let descriptor = TypeDescriptor::of::<InvoiceIssued>();

        let result = descriptor
            .despatch(&handlers.create_scope(), CorrelationId::new(), b"[1, 2]")
            .await;

        assert!(matches!(
            result,
            Err(DespatchError::Deserialization { ref type_name, .. }) if type_name == "InvoiceIssued"
        ));
    }

    #[tokio::test]
    async fn test_descriptor_reports_missing_handler() {
        let handlers = HandlerRegistry::new();
        let descriptor = TypeDescriptor::of::<InvoiceIssued>();

        let result = descriptor
            .despatch(
                &handlers.create_scope(),
                CorrelationId::new(),
                br#"{"invoice_id":"INV-2"}"#,
            )
            .await;

        assert!(matches!(
            result,
            Err(DespatchError::HandlerNotFound { .. })
        ));
    }
}
