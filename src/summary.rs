//! Page summaries, totals and the run verdict.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use crate::classifier::Classification;
use crate::types::{Operation, RestoreState};

/// Keys partitioned by restore state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSets {
    pub not_requested: BTreeSet<String>,
    pub in_progress: BTreeSet<String>,
    pub finished: BTreeSet<String>,
    pub unknown: BTreeSet<String>,
    pub skipped_folders: BTreeSet<String>,
}

impl StateSets {
    pub fn get(&self, state: RestoreState) -> &BTreeSet<String> {
        match state {
            RestoreState::NotRequested => &self.not_requested,
            RestoreState::InProgress => &self.in_progress,
            RestoreState::Finished => &self.finished,
            RestoreState::Unknown => &self.unknown,
            RestoreState::SkippedFolder => &self.skipped_folders,
        }
    }

    fn get_mut(&mut self, state: RestoreState) -> &mut BTreeSet<String> {
        match state {
            RestoreState::NotRequested => &mut self.not_requested,
            RestoreState::InProgress => &mut self.in_progress,
            RestoreState::Finished => &mut self.finished,
            RestoreState::Unknown => &mut self.unknown,
            RestoreState::SkippedFolder => &mut self.skipped_folders,
        }
    }

    pub fn insert(&mut self, state: RestoreState, key: String) {
        self.get_mut(state).insert(key);
    }

    pub fn state_of(&self, key: &str) -> Option<RestoreState> {
        RestoreState::ALL
            .into_iter()
            .find(|state| self.get(*state).contains(key))
    }

    pub fn total(&self) -> usize {
        RestoreState::ALL
            .iter()
            .map(|state| self.get(*state).len())
            .sum()
    }
}

/// Outcome of one listing page.
///
/// Built by exactly one page worker and handed off immutably.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub item_index: usize,
    pub page_index: usize,
    /// Keys in listing order.
    pub keys: Vec<String>,
    pub states: StateSets,
    pub notes: BTreeMap<String, String>,
}

impl PageSummary {
    pub fn new(item_index: usize, page_index: usize) -> Self {
        Self {
            item_index,
            page_index,
            ..Default::default()
        }
    }

    /// Placeholder for a page whose worker task faulted.
    pub fn empty(item_index: usize, page_index: usize) -> Self {
        Self::new(item_index, page_index)
    }

    /// Record the classification of `key`. A key seen twice on one page
    /// keeps its first classification.
    pub fn record(&mut self, key: &str, classification: Classification) {
        if self.states.state_of(key).is_some() {
            return;
        }
        self.keys.push(key.to_string());
        self.states.insert(classification.state, key.to_string());
        if let Some(note) = classification.note {
            self.notes.insert(key.to_string(), note);
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Per-state key counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub keys: u64,
    pub not_requested: u64,
    pub in_progress: u64,
    pub finished: u64,
    pub unknown: u64,
    pub skipped_folders: u64,
}

impl StateCounts {
    /// Keys a restore applies to: everything except folder markers.
    pub fn eligible(&self) -> u64 {
        self.keys - self.skipped_folders
    }
}

/// Whether the restore goal is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every non-folder key is finished.
    Complete,
    /// No eligible key has a restore requested yet.
    NotRequested,
    /// Restores are requested but not all are finished.
    InProgress,
}

impl Verdict {
    pub fn is_complete(&self) -> bool {
        *self == Verdict::Complete
    }

    pub fn message(&self, operation: Operation) -> String {
        match self {
            Verdict::Complete => format!("Success: All {operation} operations are complete"),
            Verdict::NotRequested => {
                format!("Attention: No {operation} operations have been requested")
            }
            Verdict::InProgress => {
                format!("Attention: Not all {operation} operations are complete yet")
            }
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Complete => "complete",
            Verdict::NotRequested => "not_requested",
            Verdict::InProgress => "in_progress",
        };
        f.write_str(s)
    }
}

/// Union of page summaries.
///
/// Totals only grow. A key already present keeps its first observed state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreTotals {
    pub states: StateSets,
    pub notes: BTreeMap<String, String>,
    seen: HashSet<String>,
}

impl RestoreTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_page(&mut self, page: &PageSummary) {
        for key in &page.keys {
            if !self.seen.insert(key.clone()) {
                continue;
            }
            if let Some(state) = page.states.state_of(key) {
                self.states.insert(state, key.clone());
            }
            if let Some(note) = page.notes.get(key) {
                self.notes.insert(key.clone(), note.clone());
            }
        }
    }

    pub fn merge(&mut self, other: &RestoreTotals) {
        for state in RestoreState::ALL {
            for key in other.states.get(state) {
                if !self.seen.insert(key.clone()) {
                    continue;
                }
                self.states.insert(state, key.clone());
                if let Some(note) = other.notes.get(key) {
                    self.notes.insert(key.clone(), note.clone());
                }
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn counts(&self) -> StateCounts {
        StateCounts {
            keys: self.seen.len() as u64,
            not_requested: self.states.not_requested.len() as u64,
            in_progress: self.states.in_progress.len() as u64,
            finished: self.states.finished.len() as u64,
            unknown: self.states.unknown.len() as u64,
            skipped_folders: self.states.skipped_folders.len() as u64,
        }
    }

    /// `keys - skipped_folders == finished` is success. Otherwise the run is
    /// "none requested" when every eligible key is still `NotRequested`.
    pub fn verdict(&self) -> Verdict {
        let counts = self.counts();
        if counts.eligible() == counts.finished {
            Verdict::Complete
        } else if counts.eligible() == counts.not_requested {
            Verdict::NotRequested
        } else {
            Verdict::InProgress
        }
    }
}
