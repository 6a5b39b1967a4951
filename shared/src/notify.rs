use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    IsBusy,
    CurrentCoordinates,
    Address,
    StatusMessage,
    DisplayText,
    SavedLocations,
    NewEntryName,
    NewEntryLatitude,
    NewEntryLongitude,
    /// Which commands can currently execute.
    CommandAvailability,
}

impl Field {
    /// Fields the display line is computed from.
    #[must_use]
    pub const fn affects_display(self) -> bool {
        matches!(
            self,
            Self::IsBusy | Self::CurrentCoordinates | Self::Address | Self::StatusMessage
        )
    }
}

/// Ordered, duplicate-free list of changed fields. Carries no values;
/// subscribers re-read `ViewModel::snapshot`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    fields: Vec<Field>,
}

impl ChangeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn of(fields: &[Field]) -> Self {
        let mut set = Self::new();
        for &field in fields {
            set.push(field);
        }
        set
    }

    /// Adds `field`, plus whatever it implies: display-relevant fields
    /// imply `DisplayText`, and `IsBusy` implies `CommandAvailability`.
    pub fn push(&mut self, field: Field) {
        self.insert(field);
        if field.affects_display() {
            self.insert(Field::DisplayText);
        }
        if field == Field::IsBusy {
            self.insert(Field::CommandAvailability);
        }
    }

    pub fn extend(&mut self, other: ChangeSet) {
        for field in other.fields {
            self.insert(field);
        }
    }

    fn insert(&mut self, field: Field) {
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
    }

    #[must_use]
    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// Broadcast side of the pub/sub. Publishing never blocks and never fails:
/// with no subscribers the set is dropped, and a lagging subscriber sees
/// `RecvError::Lagged` and should re-read the whole snapshot.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeSet>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.sender.subscribe()
    }

    pub fn publish(&self, changes: ChangeSet) {
        if changes.is_empty() {
            return;
        }
        trace!(fields = ?changes.fields(), "publishing changes");
        let _ = self.sender.send(changes);
    }
}
