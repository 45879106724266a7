//! Subscription patterns over `/`-separated paths.
//!
//! `+` matches exactly one segment. `#` must be last and matches the rest
//! of the path, including nothing (`auth/#` matches `auth`).

pub(crate) fn matches(pattern: &str, path: &str) -> bool {
    let mut pat = pattern.split('/');
    let mut segs = path.split('/');
    loop {
        match (pat.next(), segs.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// A pattern is valid when `#` appears only as the final segment.
pub(crate) fn is_valid(pattern: &str) -> bool {
    let segments: Vec<&str> = pattern.split('/').collect();
    segments
        .iter()
        .enumerate()
        .all(|(i, s)| *s != "#" || i == segments.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact() {
        assert!(matches("auth/state", "auth/state"));
        assert!(!matches("auth/state", "auth/terms"));
        assert!(!matches("auth", "auth/state"));
        assert!(!matches("auth/state", "auth"));
    }

    #[test]
    fn single_level() {
        assert!(matches("+/state", "auth/state"));
        assert!(matches("materials/+", "materials/view"));
        assert!(!matches("materials/+", "materials/view/extra"));
    }

    #[test]
    fn multi_level() {
        assert!(matches("#", "auth/state"));
        assert!(matches("materials/#", "materials/feed"));
        assert!(matches("materials/#", "materials"));
        assert!(!matches("materials/#", "upload/state"));
    }

    #[test]
    fn hash_must_be_last() {
        assert!(is_valid("a/#"));
        assert!(is_valid("#"));
        assert!(!is_valid("#/a"));
        assert!(!is_valid("a/#/b"));
    }
}
