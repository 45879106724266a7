//! Material list state: the raw feed, the filter inputs, the derived view
//! and in-flight mutations.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::State;
use crate::filter::CategoryFilter;
use crate::model::Material;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedStatus {
    /// No class, no subscription.
    Idle,
    /// Subscription established, first result not yet delivered.
    Loading,
    Ready,
    /// The subscription failed and has ended. `retry` re-issues it.
    Error(String),
}

impl FeedStatus {
    /// Idle, Ready or Error: nothing more will arrive without a change.
    pub fn is_settled(&self) -> bool {
        !matches!(self, FeedStatus::Loading)
    }
}

/// Materials of the active class, newest first. Stored at `materials/feed`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState {
    pub class: Option<String>,
    pub status: FeedStatus,
    pub materials: Arc<[Material]>,
    /// Subscription generation this state belongs to.
    pub generation: u64,
}

impl FeedState {
    pub fn idle(generation: u64) -> Self {
        Self {
            class: None,
            status: FeedStatus::Idle,
            materials: Arc::from(Vec::new()),
            generation,
        }
    }

    pub fn find(&self, id: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.id == id)
    }
}

impl State for FeedState {
    const PATH: &'static str = "materials/feed";
}

/// Filter inputs. Stored at `materials/filter`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub category: CategoryFilter,
    pub query: String,
}

impl State for FilterState {
    const PATH: &'static str = "materials/filter";
}

/// What the material list shows. Stored at `materials/view`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialView {
    pub class: Option<String>,
    pub status: FeedStatus,
    pub filter: FilterState,
    pub items: Vec<Material>,
    /// Size of the unfiltered feed.
    pub total: usize,
}

impl State for MaterialView {
    const PATH: &'static str = "materials/view";
}

/// Materials with a delete or edit in flight. Stored at
/// `materials/mutations`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationState {
    pub pending: BTreeSet<String>,
    pub last_error: Option<String>,
}

impl State for MutationState {
    const PATH: &'static str = "materials/mutations";
}
