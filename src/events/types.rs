// src/events/types.rs
//
// All domain events in the system.
// Each event represents an immutable fact that has already occurred.
//
// CRITICAL RULES:
// - Events are facts, not commands
// - Events are immutable
// - Events carry only the data needed to react
// - No reconciliation logic in event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trait that all domain events must implement
pub trait DomainEvent: std::fmt::Debug + Clone {
    /// Unique identifier for this event instance
    fn event_id(&self) -> Uuid;

    /// When this event occurred
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Human-readable event type name
    fn event_type(&self) -> &'static str;
}

macro_rules! impl_domain_event {
    ($event:ident) => {
        impl DomainEvent for $event {
            fn event_id(&self) -> Uuid {
                self.event_id
            }
            fn occurred_at(&self) -> DateTime<Utc> {
                self.occurred_at
            }
            fn event_type(&self) -> &'static str {
                stringify!($event)
            }
        }
    };
}

// ============================================================================
// LIBRARY SYNC EVENTS
// ============================================================================

/// Emitted once a reconciliation holds the partition lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySyncStarted {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub partition: String,
}

impl LibrarySyncStarted {
    pub fn new(partition: String) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            partition,
        }
    }
}

impl_domain_event!(LibrarySyncStarted);

/// Emitted after remotely fetched entities were committed to the local cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntitiesCached {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub partition: String,
    pub external_ids: Vec<i64>,
}

impl CatalogEntitiesCached {
    pub fn new(partition: String, external_ids: Vec<i64>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            partition,
            external_ids,
        }
    }
}

impl_domain_event!(CatalogEntitiesCached);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySyncCompleted {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub partition: String,
    pub entity_count: usize,
    pub remote_fetched: usize,
    pub was_stale: bool,
}

impl LibrarySyncCompleted {
    pub fn new(partition: String, entity_count: usize, remote_fetched: usize, was_stale: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            partition,
            entity_count,
            remote_fetched,
            was_stale,
        }
    }
}

impl_domain_event!(LibrarySyncCompleted);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySyncFailed {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub partition: String,
    /// Phase the run failed in
    pub phase: String,
    pub reason: String,
    pub retryable: bool,
}

impl LibrarySyncFailed {
    pub fn new(partition: String, phase: String, reason: String, retryable: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            partition,
            phase,
            reason,
            retryable,
        }
    }
}

impl_domain_event!(LibrarySyncFailed);

// ============================================================================
// PINNED QUERY EVENTS
// ============================================================================

/// Emitted when a pinned query result was replaced from the network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinnedQueryRefreshed {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub pin: String,
    pub entity_count: usize,
    pub evicted: usize,
}

impl PinnedQueryRefreshed {
    pub fn new(pin: String, entity_count: usize, evicted: usize) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            pin,
            entity_count,
            evicted,
        }
    }
}

impl_domain_event!(PinnedQueryRefreshed);
