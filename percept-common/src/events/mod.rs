//! Change events for the realtime channel
//!
//! Provides the change-notification types published by a backend after each
//! mutation, and the EventBus that fans them out to subscribers.

mod subscription;

pub use subscription::ChangeSubscription;

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::models::{Comment, Profession, Rating};

/// Backend tables that publish change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Professions,
    Ratings,
    Messages,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Ratings, Table::Messages, Table::Professions];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Professions => "professions",
            Table::Ratings => "ratings",
            Table::Messages => "messages",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of row mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Row payload carried by a change event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChangeRecord {
    Rating(Rating),
    Message(Comment),
    /// Full snapshot after insert or update
    Profession(Profession),
    /// Deleted professions only carry their id
    ProfessionDeleted { id: Uuid },
}

/// A single change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record: ChangeRecord,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ChangeEvent {
    pub fn rating_inserted(rating: Rating) -> Self {
        Self::new(Table::Ratings, ChangeKind::Insert, ChangeRecord::Rating(rating))
    }

    pub fn message_inserted(comment: Comment) -> Self {
        Self::new(Table::Messages, ChangeKind::Insert, ChangeRecord::Message(comment))
    }

    pub fn profession_changed(kind: ChangeKind, profession: Profession) -> Self {
        Self::new(Table::Professions, kind, ChangeRecord::Profession(profession))
    }

    pub fn profession_deleted(id: Uuid) -> Self {
        Self::new(
            Table::Professions,
            ChangeKind::Delete,
            ChangeRecord::ProfessionDeleted { id },
        )
    }

    fn new(table: Table, kind: ChangeKind, record: ChangeRecord) -> Self {
        Self {
            table,
            kind,
            record,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Profession the changed row belongs to
    pub fn profession_id(&self) -> Uuid {
        match &self.record {
            ChangeRecord::Rating(r) => r.profession_id,
            ChangeRecord::Message(m) => m.profession_id,
            ChangeRecord::Profession(p) => p.id,
            ChangeRecord::ProfessionDeleted { id } => *id,
        }
    }

    /// Get event type as string for logging and filtering
    pub fn event_type(&self) -> &str {
        match (self.table, self.kind) {
            (Table::Ratings, ChangeKind::Insert) => "RatingInserted",
            (Table::Messages, ChangeKind::Insert) => "MessageInserted",
            (Table::Professions, ChangeKind::Insert) => "ProfessionInserted",
            (Table::Professions, ChangeKind::Update) => "ProfessionUpdated",
            (Table::Professions, ChangeKind::Delete) => "ProfessionDeleted",
            (_, ChangeKind::Update) => "RowUpdated",
            (_, ChangeKind::Delete) => "RowDeleted",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central distribution bus for change events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block writers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use percept_common::events::{EventBus, Table};
///
/// let bus = EventBus::new(100);
/// let _ratings = bus.subscribe_table(Table::Ratings);
/// assert_eq!(bus.subscriber_count(), 1);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to future events of one table
    pub fn subscribe_table(&self, table: Table) -> ChangeSubscription {
        ChangeSubscription::new(table, self.tx.subscribe())
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
