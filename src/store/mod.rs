//! In-memory state owned by the service: per-user notification logs, the
//! pagination engine over log snapshots, and the device-token registry.

pub mod history;
pub mod models;
pub mod pagination;
pub mod tokens;

pub use history::{MarkReadOutcome, NotificationStore};
pub use pagination::paginate;
pub use tokens::TokenRegistry;
