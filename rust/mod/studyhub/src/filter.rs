//! Category and free-text filtering of the material list.
//!
//! Pure functions of their inputs: the same list and filter always give
//! the same result, and the input order is preserved.

use std::fmt;
use std::str::FromStr;

use crate::model::{Category, Material};
use crate::state::FilterState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn admits(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => *c == category,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("All"),
            CategoryFilter::Only(c) => c.fmt(f),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        s.parse().map(CategoryFilter::Only)
    }
}

/// Lowercased, trimmed query. None when there is nothing to match.
fn normalize(query: &str) -> Option<String> {
    let q = query.trim();
    (!q.is_empty()).then(|| q.to_lowercase())
}

fn text_matches(material: &Material, needle: &str) -> bool {
    material.file_name.to_lowercase().contains(needle)
        || material.uploaded_by.to_lowercase().contains(needle)
        || material.category.label().to_lowercase().contains(needle)
}

pub fn matches(material: &Material, filter: &FilterState) -> bool {
    if !filter.category.admits(material.category) {
        return false;
    }
    match normalize(&filter.query) {
        Some(needle) => text_matches(material, &needle),
        None => true,
    }
}

/// The displayed subset of `materials`.
pub fn apply(materials: &[Material], filter: &FilterState) -> Vec<Material> {
    let needle = normalize(&filter.query);
    materials
        .iter()
        .filter(|m| filter.category.admits(m.category))
        .filter(|m| match &needle {
            Some(n) => text_matches(m, n),
            None => true,
        })
        .cloned()
        .collect()
}
