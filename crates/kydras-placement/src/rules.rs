//! First-match rule resolution.

use kydras_types::PoolRule;

use crate::glob::glob_match;

/// Return the first rule whose pattern matches the sanitized relative
/// path, or `None`. Rules are evaluated top-to-bottom; order matters.
pub fn resolve_rule<'a>(rules: &'a [PoolRule], rel_path: &str) -> Option<&'a PoolRule> {
    rules.iter().find(|r| glob_match(&r.pattern, rel_path))
}
