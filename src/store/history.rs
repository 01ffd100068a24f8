use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::store::models::{NavigationTarget, NotificationKind, NotificationRecord};

/// Per-user log state. `next_id` is a monotonic counter so ids stay unique
/// and ordered even when several records are created within the same clock
/// tick; wall-clock time is display-only.
#[derive(Debug)]
struct UserLog {
    next_id: u64,
    records: Vec<NotificationRecord>,
}

impl UserLog {
    fn new() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

/// Outcome of a mark-read request. Absence is surfaced rather than
/// swallowed so the HTTP layer can answer with a 404.
#[derive(Debug, PartialEq, Eq)]
pub enum MarkReadOutcome {
    Updated(NotificationRecord),
    UnknownUser,
    UnknownRecord,
}

/// In-memory notification history, one newest-first log per user.
///
/// Each user's log sits behind its own mutex: appends, snapshots and
/// read-state updates for one user serialize against each other, while
/// operations on different users never contend. The outer map lock is held
/// only long enough to resolve the per-user entry.
#[derive(Debug, Default)]
pub struct NotificationStore {
    logs: RwLock<HashMap<String, Arc<Mutex<UserLog>>>>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn user_log(&self, user_id: &str) -> Option<Arc<Mutex<UserLog>>> {
        self.logs.read().await.get(user_id).cloned()
    }

    async fn user_log_or_create(&self, user_id: &str) -> Arc<Mutex<UserLog>> {
        if let Some(log) = self.user_log(user_id).await {
            return log;
        }

        let mut logs = self.logs.write().await;
        logs.entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(UserLog::new())))
            .clone()
    }

    /// Inserts a new record at the head of the user's log, creating the log
    /// if this is the user's first notification. Returns the stored record
    /// with its assigned id.
    pub async fn append(
        &self,
        user_id: &str,
        kind: NotificationKind,
        title: String,
        body: String,
        navigation: NavigationTarget,
    ) -> NotificationRecord {
        let log = self.user_log_or_create(user_id).await;
        let mut log = log.lock().await;

        let record = NotificationRecord {
            id: log.next_id,
            kind,
            title,
            body,
            data: navigation,
            created_at: Utc::now(),
            read: false,
        };
        log.next_id += 1;
        log.records.insert(0, record.clone());

        record
    }

    /// Point-in-time copy of the user's log, newest-first. Unknown users
    /// get an empty list.
    pub async fn snapshot(&self, user_id: &str) -> Vec<NotificationRecord> {
        match self.user_log(user_id).await {
            Some(log) => log.lock().await.records.clone(),
            None => Vec::new(),
        }
    }

    /// Sets `read = true` on the matching record. Idempotent: marking an
    /// already-read record reports `Updated` again.
    pub async fn mark_read(&self, user_id: &str, id: u64) -> MarkReadOutcome {
        let Some(log) = self.user_log(user_id).await else {
            return MarkReadOutcome::UnknownUser;
        };
        let mut log = log.lock().await;

        match log.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.read = true;
                MarkReadOutcome::Updated(record.clone())
            }
            None => MarkReadOutcome::UnknownRecord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(n: u32) -> NotificationKind {
        NotificationKind::ProviderRegistration {
            provider_id: format!("prov_{}", n),
            provider_name: format!("Provider {}", n),
        }
    }

    fn navigation(n: u32) -> NavigationTarget {
        NavigationTarget {
            url: format!("/service-providers/prov_{}", n),
            action_id: format!("prov_{}", n),
            kind: "provider_registration".to_string(),
        }
    }

    async fn append_nth(store: &NotificationStore, user: &str, n: u32) -> NotificationRecord {
        store
            .append(
                user,
                kind(n),
                "New Provider Registration".to_string(),
                format!("Provider {} has successfully registered.", n),
                navigation(n),
            )
            .await
    }

    #[tokio::test]
    async fn append_inserts_newest_first() {
        let store = NotificationStore::new();

        let r1 = append_nth(&store, "user_123", 1).await;
        let r2 = append_nth(&store, "user_123", 2).await;
        let r3 = append_nth(&store, "user_123", 3).await;

        let log = store.snapshot("user_123").await;
        let ids: Vec<u64> = log.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![r3.id, r2.id, r1.id]);
    }

    #[tokio::test]
    async fn ids_are_monotonic_per_user() {
        let store = NotificationStore::new();

        let a = append_nth(&store, "user_a", 1).await;
        let b = append_nth(&store, "user_a", 2).await;
        assert!(b.id > a.id);

        // A second user's counter starts fresh and does not interleave.
        let c = append_nth(&store, "user_b", 1).await;
        assert_eq!(c.id, 1);
    }

    #[tokio::test]
    async fn concurrent_appends_assign_distinct_ids() {
        let store = Arc::new(NotificationStore::new());

        let tasks: Vec<_> = (0..50)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move { append_nth(&store, "user_123", n).await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        let log = store.snapshot("user_123").await;
        assert_eq!(log.len(), 50);

        let mut ids: Vec<u64> = log.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[tokio::test]
    async fn snapshot_for_unknown_user_is_empty() {
        let store = NotificationStore::new();
        assert!(store.snapshot("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let store = NotificationStore::new();
        let record = append_nth(&store, "user_123", 1).await;
        assert!(!record.read);

        let first = store.mark_read("user_123", record.id).await;
        assert!(matches!(first, MarkReadOutcome::Updated(ref r) if r.read));

        let second = store.mark_read("user_123", record.id).await;
        assert!(matches!(second, MarkReadOutcome::Updated(ref r) if r.read));
    }

    #[tokio::test]
    async fn mark_read_distinguishes_missing_user_and_record() {
        let store = NotificationStore::new();
        assert_eq!(
            store.mark_read("nobody", 1).await,
            MarkReadOutcome::UnknownUser
        );

        append_nth(&store, "user_123", 1).await;
        assert_eq!(
            store.mark_read("user_123", 999).await,
            MarkReadOutcome::UnknownRecord
        );
    }

    #[tokio::test]
    async fn mark_read_does_not_disturb_ordering() {
        let store = NotificationStore::new();
        append_nth(&store, "user_123", 1).await;
        let middle = append_nth(&store, "user_123", 2).await;
        append_nth(&store, "user_123", 3).await;

        store.mark_read("user_123", middle.id).await;

        let log = store.snapshot("user_123").await;
        let ids: Vec<u64> = log.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(log[1].read);
        assert!(!log[0].read);
    }
}
