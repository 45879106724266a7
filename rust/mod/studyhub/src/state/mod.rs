//! Presentation state.
//!
//! Every piece of UI-facing state lives at a well-known path in a
//! `StateStore`. A front-end reads the typed value at a path and subscribes
//! to changes by exact path or by pattern (`materials/#`, `+/state`, `#`).
//!
//! | Path | Type |
//! |---|---|
//! | `auth/state` | [`AuthState`] |
//! | `materials/feed` | [`FeedState`] |
//! | `materials/filter` | [`FilterState`] |
//! | `materials/view` | [`MaterialView`] |
//! | `materials/mutations` | [`MutationState`] |
//! | `upload/state` | [`UploadState`] |

mod auth;
mod materials;
mod pattern;
mod store;
mod upload;

pub use auth::{AuthState, SessionPhase};
pub use materials::{FeedState, FeedStatus, FilterState, MaterialView, MutationState};
pub use store::{StateStore, StateValue, SubscriptionId};
pub use upload::{UploadPhase, UploadState};

/// A typed value that lives at a fixed path.
pub trait State: std::any::Any + Send + Sync {
    const PATH: &'static str;
}
