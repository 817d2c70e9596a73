//! Category selection policy.

use std::collections::HashSet;

use crate::models::CategoryInfo;

/// Pick the next generation target: among eligible leaf categories, prefer
/// one with zero existing questions, otherwise the fewest unsolved
/// questions. Ties break on the lowest id so runs are reproducible.
///
/// Eligible means not in `excluded` and still needing questions under
/// `threshold`. Returns `None` when nothing is eligible.
#[must_use]
pub fn select_next<'a>(
    categories: &'a [CategoryInfo],
    excluded: &HashSet<i64>,
    threshold: i64,
) -> Option<&'a CategoryInfo> {
    categories
        .iter()
        .filter(|c| !excluded.contains(&c.id) && c.needed(threshold) > 0)
        .min_by_key(|c| (c.unsolved_count, i64::from(c.question_count != 0), c.id))
}
