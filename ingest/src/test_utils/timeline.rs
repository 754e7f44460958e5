use std::sync::Arc;

use tokio::sync::Mutex;

/// An operation observed by a test collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEvent {
    Authenticate { alias: String, accepted: bool },
    Fetch { alias: String, page: usize },
    Truncate { table: String },
    Script { path: String },
    Upload { prefix: String, objects: usize },
    Archive { prefix: String },
    Delete { prefix: String },
}

/// Append-only, shared log of [`TimelineEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Arc<Mutex<Vec<TimelineEvent>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, event: TimelineEvent) {
        self.events.lock().await.push(event);
    }

    pub async fn events(&self) -> Vec<TimelineEvent> {
        self.events.lock().await.clone()
    }

    /// Returns the events matching `predicate`, in order.
    pub async fn filter<P>(&self, predicate: P) -> Vec<TimelineEvent>
    where
        P: Fn(&TimelineEvent) -> bool,
    {
        self.events
            .lock()
            .await
            .iter()
            .filter(|event| predicate(event))
            .cloned()
            .collect()
    }

    /// Returns the index of the first event matching `predicate`.
    pub async fn position<P>(&self, predicate: P) -> Option<usize>
    where
        P: Fn(&TimelineEvent) -> bool,
    {
        self.events.lock().await.iter().position(predicate)
    }

    /// Returns the index of the last event matching `predicate`.
    pub async fn last_position<P>(&self, predicate: P) -> Option<usize>
    where
        P: Fn(&TimelineEvent) -> bool,
    {
        self.events.lock().await.iter().rposition(predicate)
    }

    pub async fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&TimelineEvent) -> bool,
    {
        self.events
            .lock()
            .await
            .iter()
            .filter(|event| predicate(event))
            .count()
    }
}

impl TimelineEvent {
    pub fn is_fetch_of(&self, alias: &str) -> bool {
        matches!(self, TimelineEvent::Fetch { alias: a, .. } if a == alias)
    }

    pub fn is_truncate(&self) -> bool {
        matches!(self, TimelineEvent::Truncate { .. })
    }

    /// Whether this is the execution of a script whose path contains `fragment`.
    pub fn is_script(&self, fragment: &str) -> bool {
        matches!(self, TimelineEvent::Script { path } if path.contains(fragment))
    }

    pub fn is_upload(&self) -> bool {
        matches!(self, TimelineEvent::Upload { .. })
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, TimelineEvent::Archive { .. })
    }

    pub fn is_delete_of(&self, prefix: &str) -> bool {
        matches!(self, TimelineEvent::Delete { prefix: p } if p == prefix)
    }
}
