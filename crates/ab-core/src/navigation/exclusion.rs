//! Records the user has marked to leave out of statistics

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::records::RecordId;

/// Set of excluded record identities.
///
/// Keyed by [`RecordId`] rather than by position, so a mark follows its
/// record when the record list is reloaded or reordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<RecordId>", into = "Vec<RecordId>")]
pub struct ExclusionSet {
    ids: AHashSet<RecordId>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.ids.contains(id)
    }

    /// Returns false if the id was already present
    pub fn insert(&mut self, id: RecordId) -> bool {
        self.ids.insert(id)
    }

    /// Returns false if the id was not present
    pub fn remove(&mut self, id: &RecordId) -> bool {
        self.ids.remove(id)
    }

    /// Flip membership; returns the new membership
    pub fn toggle(&mut self, id: RecordId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Ids in a stable order
    pub fn sorted(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl From<Vec<RecordId>> for ExclusionSet {
    fn from(ids: Vec<RecordId>) -> Self {
        Self { ids: ids.into_iter().collect() }
    }
}

impl From<ExclusionSet> for Vec<RecordId> {
    fn from(set: ExclusionSet) -> Self {
        set.sorted()
    }
}
