use chrono::{DateTime, Utc};
use serde::Serialize;

/// Closed set of notification kinds the portals can trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    ProviderRegistration {
        provider_id: String,
        provider_name: String,
    },
    DocumentStatus {
        document_id: String,
        document_type: String,
        provider_name: String,
        status: String,
        redirect_url: String,
    },
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ProviderRegistration { .. } => "provider_registration",
            NotificationKind::DocumentStatus { .. } => "document_status",
        }
    }
}

/// Where the client should take the user when the notification is tapped.
/// Serialized as the `data` object of a record, matching the portal wire
/// contract (`url` / `action_id` / `type`).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NavigationTarget {
    pub url: String,
    pub action_id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One entry in a user's notification log. `id` is assigned by the store
/// and is unique and strictly increasing within that user's log; `read` is
/// the only mutable field.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotificationRecord {
    pub id: u64,
    // Derived title/body/data are what clients consume; the kind itself
    // stays off the wire.
    #[serde(skip)]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: NavigationTarget,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Read-state filter for history listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFilter {
    #[default]
    All,
    Read,
    Unread,
}

impl ReadFilter {
    /// Maps the `status` query parameter; unknown values fall through to All.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("read") => ReadFilter::Read,
            Some("unread") => ReadFilter::Unread,
            _ => ReadFilter::All,
        }
    }

    pub fn matches(&self, record: &NotificationRecord) -> bool {
        match self {
            ReadFilter::All => true,
            ReadFilter::Read => record.read,
            ReadFilter::Unread => !record.read,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageQuery {
    pub page: u64,
    pub limit: u64,
    pub filter: ReadFilter,
}

impl PageQuery {
    /// Normalizes raw query parameters: absent values fall back to the
    /// defaults (page 1, limit 10), and both are raised to at least 1.
    pub fn new(page: Option<u64>, limit: Option<u64>, filter: ReadFilter) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(10).max(1),
            filter,
        }
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::new(None, None, ReadFilter::All)
    }
}

/// One page of a user's history. Field names follow the portal wire
/// contract; `unread_count` is always computed over the unfiltered log.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    #[serde(rename = "total_notification")]
    pub total_matching: u64,
    pub unread_count: u64,
    pub current_page: u64,
    pub total_pages: u64,
    #[serde(rename = "data")]
    pub items: Vec<NotificationRecord>,
}
