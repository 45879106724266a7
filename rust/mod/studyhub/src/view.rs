//! The displayed material list.
//!
//! `ViewModel` listens to `materials/feed` and recomputes `materials/view`
//! synchronously whenever the feed, the category filter or the query
//! changes.
//!
//! The view is published while the filter lock is held, so subscribers of
//! `materials/view` must not change the filter from inside their callback.

use std::sync::{Arc, Mutex};

use crate::filter::{self, CategoryFilter};
use crate::state::{FeedState, FilterState, MaterialView, State, StateStore, SubscriptionId};

pub struct ViewModel {
    store: Arc<StateStore>,
    filter: Mutex<FilterState>,
    subscription: Option<SubscriptionId>,
}

impl ViewModel {
    pub fn attach(store: Arc<StateStore>) -> Arc<Self> {
        let vm = Arc::new_cyclic(|weak: &std::sync::Weak<ViewModel>| {
            let weak = weak.clone();
            let subscription = store.subscribe(FeedState::PATH, move |_, value| {
                if let (Some(vm), Some(feed)) = (weak.upgrade(), value.downcast::<FeedState>()) {
                    vm.recompute_with(&feed);
                }
            });
            ViewModel {
                store: store.clone(),
                filter: Mutex::new(FilterState::default()),
                subscription,
            }
        });
        vm.store.put(FilterState::default());
        vm.recompute();
        vm
    }

    pub fn filter(&self) -> FilterState {
        self.filter.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_category(&self, category: CategoryFilter) {
        self.update_filter(|f| f.category = category);
    }

    pub fn set_query(&self, query: &str) {
        self.update_filter(|f| f.query = query.to_string());
    }

    pub fn set_filter(&self, filter: FilterState) {
        self.update_filter(|f| *f = filter);
    }

    /// The current displayed list.
    pub fn current(&self) -> Arc<MaterialView> {
        match self.store.read::<MaterialView>() {
            Some(view) => view,
            None => Arc::new(self.build(&self.filter(), None)),
        }
    }

    fn update_filter(&self, update: impl FnOnce(&mut FilterState)) {
        let filter = {
            let mut current = self.filter.lock().unwrap_or_else(|e| e.into_inner());
            update(&mut current);
            current.clone()
        };
        self.store.put(filter);
        self.recompute();
    }

    fn recompute(&self) {
        let filter = self.filter.lock().unwrap_or_else(|e| e.into_inner());
        let feed = self.store.read::<FeedState>();
        self.store.put(self.build(&filter, feed.as_deref()));
    }

    fn recompute_with(&self, feed: &FeedState) {
        let filter = self.filter.lock().unwrap_or_else(|e| e.into_inner());
        self.store.put(self.build(&filter, Some(feed)));
    }

    fn build(&self, filter: &FilterState, feed: Option<&FeedState>) -> MaterialView {
        match feed {
            Some(feed) => MaterialView {
                class: feed.class.clone(),
                status: feed.status.clone(),
                filter: filter.clone(),
                items: filter::apply(&feed.materials, filter),
                total: feed.materials.len(),
            },
            None => MaterialView {
                class: None,
                status: crate::state::FeedStatus::Idle,
                filter: filter.clone(),
                items: Vec::new(),
                total: 0,
            },
        }
    }
}

impl Drop for ViewModel {
    fn drop(&mut self) {
        if let Some(id) = self.subscription {
            self.store.unsubscribe(id);
        }
    }
}
