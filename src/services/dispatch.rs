use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AppError;
use crate::services::fcm::{PushGateway, PushMessage};
use crate::store::models::{NavigationTarget, NotificationKind, NotificationRecord};
use crate::store::{NotificationStore, TokenRegistry};

/// Outcome of a dispatch. The record is written to history before any
/// delivery attempt, so a failed or skipped delivery still leaves the
/// notification visible in subsequent listings.
#[derive(Debug)]
pub enum DispatchOutcome {
    Delivered(NotificationRecord),
    StoredUndelivered {
        record: NotificationRecord,
        error: AppError,
    },
    NoToken,
}

/// Coordinates the two halves of a notification: the durable history entry
/// and the best-effort real-time push. The two can fail independently and
/// neither outcome rolls back the other.
pub struct DispatchCoordinator {
    store: Arc<NotificationStore>,
    tokens: Arc<TokenRegistry>,
    gateway: Arc<dyn PushGateway>,
}

impl DispatchCoordinator {
    pub fn new(
        store: Arc<NotificationStore>,
        tokens: Arc<TokenRegistry>,
        gateway: Arc<dyn PushGateway>,
    ) -> Self {
        Self {
            store,
            tokens,
            gateway,
        }
    }

    pub async fn dispatch(&self, user_id: &str, kind: NotificationKind) -> DispatchOutcome {
        let title = render_title(&kind);
        let body = render_body(&kind);
        let navigation = navigation_target(&kind);

        // History first. The store releases the user's log lock before we
        // touch the gateway, so history reads are never stalled by push
        // latency.
        let record = self
            .store
            .append(user_id, kind, title, body, navigation)
            .await;

        let Some(token) = self.tokens.get(user_id).await else {
            tracing::warn!(
                "No device token for user {}; notification {} stored without delivery",
                user_id,
                record.id
            );
            return DispatchOutcome::NoToken;
        };

        let message = PushMessage {
            title: record.title.clone(),
            body: record.body.clone(),
            data: delivery_data(&record),
        };

        match self.gateway.send(&token, &message).await {
            Ok(()) => {
                tracing::info!("Delivered notification {} to user {}", record.id, user_id);
                DispatchOutcome::Delivered(record)
            }
            Err(e) => {
                tracing::warn!(
                    "Notification {} stored but not delivered to user {}: {}",
                    record.id,
                    user_id,
                    e
                );
                DispatchOutcome::StoredUndelivered { record, error: e }
            }
        }
    }
}

fn render_title(kind: &NotificationKind) -> String {
    match kind {
        NotificationKind::ProviderRegistration { .. } => "New Provider Registration".to_string(),
        NotificationKind::DocumentStatus { .. } => "Document Status Update".to_string(),
    }
}

fn render_body(kind: &NotificationKind) -> String {
    match kind {
        NotificationKind::ProviderRegistration { provider_name, .. } => format!(
            "{} has successfully registered as a service provider.",
            provider_name
        ),
        NotificationKind::DocumentStatus {
            document_type,
            provider_name,
            status,
            ..
        } => format!(
            "Your {} from {} has been {}.",
            document_type, provider_name, status
        ),
    }
}

fn navigation_target(kind: &NotificationKind) -> NavigationTarget {
    match kind {
        NotificationKind::ProviderRegistration { provider_id, .. } => NavigationTarget {
            url: format!("/service-providers/{}", provider_id),
            action_id: provider_id.clone(),
            kind: kind.as_str().to_string(),
        },
        NotificationKind::DocumentStatus {
            document_id,
            redirect_url,
            ..
        } => NavigationTarget {
            url: redirect_url.clone(),
            action_id: document_id.clone(),
            kind: kind.as_str().to_string(),
        },
    }
}

/// The gateway requires string-typed data fields, so everything structured
/// is flattened to key/value strings here.
fn delivery_data(record: &NotificationRecord) -> HashMap<String, String> {
    HashMap::from([
        ("url".to_string(), record.data.url.clone()),
        ("action_id".to_string(), record.data.action_id.clone()),
        ("type".to_string(), record.data.kind.clone()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-process gateway fake: records sends, optionally fails them all.
    struct FakeGateway {
        fail: bool,
        sent: Mutex<Vec<(String, PushMessage)>>,
    }

    impl FakeGateway {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PushGateway for FakeGateway {
        async fn send(&self, token: &str, message: &PushMessage) -> crate::error::AppResult<()> {
            if self.fail {
                return Err(AppError::Delivery("FCM API error (503): unavailable".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((token.to_string(), message.clone()));
            Ok(())
        }
    }

    fn coordinator(
        gateway: Arc<FakeGateway>,
    ) -> (DispatchCoordinator, Arc<NotificationStore>, Arc<TokenRegistry>) {
        let store = Arc::new(NotificationStore::new());
        let tokens = Arc::new(TokenRegistry::new());
        let coordinator = DispatchCoordinator::new(store.clone(), tokens.clone(), gateway);
        (coordinator, store, tokens)
    }

    fn provider_kind() -> NotificationKind {
        NotificationKind::ProviderRegistration {
            provider_id: "prov_42".to_string(),
            provider_name: "Brac Bank Ltd".to_string(),
        }
    }

    fn document_kind() -> NotificationKind {
        NotificationKind::DocumentStatus {
            document_id: "doc_7".to_string(),
            document_type: "Tax Certificate".to_string(),
            provider_name: "Brac Bank Ltd".to_string(),
            status: "approved".to_string(),
            redirect_url: "/document-vaults/v1/documents/doc_7".to_string(),
        }
    }

    #[tokio::test]
    async fn delivered_when_token_present_and_gateway_succeeds() {
        let gateway = FakeGateway::new(false);
        let (coordinator, store, tokens) = coordinator(gateway.clone());
        tokens.save("user_123", "device-token").await;

        let outcome = coordinator.dispatch("user_123", provider_kind()).await;
        let record = match outcome {
            DispatchOutcome::Delivered(record) => record,
            other => panic!("expected Delivered, got {:?}", other),
        };

        assert_eq!(record.title, "New Provider Registration");
        assert_eq!(
            record.body,
            "Brac Bank Ltd has successfully registered as a service provider."
        );
        assert_eq!(record.data.url, "/service-providers/prov_42");

        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "device-token");

        // The delivery payload is all string key/value pairs.
        let data = &sent[0].1.data;
        assert_eq!(data.get("url").unwrap(), "/service-providers/prov_42");
        assert_eq!(data.get("action_id").unwrap(), "prov_42");
        assert_eq!(data.get("type").unwrap(), "provider_registration");

        assert_eq!(store.snapshot("user_123").await.len(), 1);
    }

    #[tokio::test]
    async fn gateway_failure_still_records_history() {
        let gateway = FakeGateway::new(true);
        let (coordinator, store, tokens) = coordinator(gateway);
        tokens.save("user_123", "device-token").await;

        let outcome = coordinator.dispatch("user_123", document_kind()).await;
        let record = match outcome {
            DispatchOutcome::StoredUndelivered { record, error } => {
                assert!(matches!(error, AppError::Delivery(_)));
                record
            }
            other => panic!("expected StoredUndelivered, got {:?}", other),
        };

        let log = store.snapshot("user_123").await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], record);
    }

    #[tokio::test]
    async fn missing_token_still_records_history() {
        let gateway = FakeGateway::new(false);
        let (coordinator, store, _tokens) = coordinator(gateway.clone());

        let outcome = coordinator.dispatch("user_123", provider_kind()).await;
        assert!(matches!(outcome, DispatchOutcome::NoToken));

        assert_eq!(store.snapshot("user_123").await.len(), 1);
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn document_status_template() {
        let gateway = FakeGateway::new(false);
        let (coordinator, _store, tokens) = coordinator(gateway);
        tokens.save("user_123", "device-token").await;

        let outcome = coordinator.dispatch("user_123", document_kind()).await;
        let record = match outcome {
            DispatchOutcome::Delivered(record) => record,
            other => panic!("expected Delivered, got {:?}", other),
        };

        assert_eq!(record.title, "Document Status Update");
        assert_eq!(
            record.body,
            "Your Tax Certificate from Brac Bank Ltd has been approved."
        );
        assert_eq!(record.data.url, "/document-vaults/v1/documents/doc_7");
        assert_eq!(record.data.action_id, "doc_7");
        assert_eq!(record.data.kind, "document_status");
    }

    #[tokio::test]
    async fn concurrent_dispatches_get_distinct_ids() {
        let gateway = FakeGateway::new(false);
        let (coordinator, store, tokens) = coordinator(gateway);
        tokens.save("user_123", "device-token").await;

        let coordinator = Arc::new(coordinator);
        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(
                    async move { coordinator.dispatch("user_123", provider_kind()).await },
                )
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        let log = store.snapshot("user_123").await;
        let mut ids: Vec<u64> = log.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }
}
