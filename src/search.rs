use chrono::NaiveDate;

use crate::auth::{Claims, Role};
use crate::models::{Item, ItemCategory, ItemStatus};

/// Access tier of the caller as seen by the browse/search path.
///
/// Derived from validated JWT claims; anything without a recognized staff role
/// degrades to the most restrictive tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    Student,
    Staff,
}

impl Viewer {
    pub fn from_claims(claims: Option<&Claims>) -> Self {
        match claims {
            Some(c) if c.roles.iter().any(|r| matches!(r, Role::Staff)) => Viewer::Staff,
            Some(_) => Viewer::Student,
            None => Viewer::Anonymous,
        }
    }

    pub fn is_staff(self) -> bool {
        matches!(self, Viewer::Staff)
    }
}

/// Caller-supplied search criteria. Every dimension is optional; `None` means
/// "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub query: Option<String>,
    pub status: Option<ItemStatus>,
    pub category: Option<ItemCategory>,
    pub color: Option<String>,
    pub location: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl FilterSpec {
    /// Build a spec from raw query-string values. Empty strings and the "all"
    /// sentinel mean unconstrained; unparsable status/category/date values
    /// degrade to no constraint on that dimension rather than erroring.
    pub fn parse(
        query: Option<&str>,
        status: Option<&str>,
        category: Option<&str>,
        color: Option<&str>,
        location: Option<&str>,
        date_from: Option<&str>,
        date_to: Option<&str>,
    ) -> Self {
        FilterSpec {
            query: non_empty(query),
            status: non_empty(status).and_then(|s| s.parse().ok()),
            category: non_empty(category).and_then(|s| s.parse().ok()),
            color: non_empty(color),
            location: non_empty(location),
            date_from: non_empty(date_from).and_then(|s| parse_date(&s)),
            date_to: non_empty(date_to).and_then(|s| parse_date(&s)),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == FilterSpec::default()
    }
}

fn non_empty(v: Option<&str>) -> Option<String> {
    let v = v?.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("all") {
        return None;
    }
    Some(v.to_string())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Select the subset of `items` matching `spec`, as visible to `viewer`.
///
/// The visibility gate runs before any filter predicate: inactive items are
/// never returned, and non-staff viewers only ever see found items. It is a
/// security boundary, so no FilterSpec content can widen it — a student asking
/// for `status=lost` gets an empty result, not other people's lost reports.
///
/// Pure: input order is preserved, `items` is never mutated, and the clock is
/// never consulted (date bounds come from the spec).
pub fn filter_items(items: &[Item], spec: &FilterSpec, viewer: Viewer) -> Vec<Item> {
    items
        .iter()
        .filter(|item| visible_to(item, viewer))
        .filter(|item| matches_spec(item, spec))
        .cloned()
        .collect()
}

fn visible_to(item: &Item, viewer: Viewer) -> bool {
    if !item.is_active {
        return false;
    }
    viewer.is_staff() || item.status == ItemStatus::Found
}

fn matches_spec(item: &Item, spec: &FilterSpec) -> bool {
    if let Some(q) = &spec.query {
        let q = q.to_lowercase();
        let hit = contains_ci(&item.title, &q)
            || contains_ci(&item.description, &q)
            || opt_contains_ci(item.color.as_deref(), &q)
            || contains_ci(&item.location, &q)
            || opt_contains_ci(item.venue.as_deref(), &q)
            || opt_contains_ci(item.container.as_deref(), &q);
        if !hit {
            return false;
        }
    }
    if let Some(status) = spec.status {
        if item.status != status {
            return false;
        }
    }
    if let Some(category) = spec.category {
        if item.category != category {
            return false;
        }
    }
    if let Some(color) = &spec.color {
        // missing color is a miss, not a pass
        if !opt_contains_ci(item.color.as_deref(), &color.to_lowercase()) {
            return false;
        }
    }
    if let Some(location) = &spec.location {
        let needle = location.to_lowercase();
        if !contains_ci(&item.location, &needle) && !opt_contains_ci(item.venue.as_deref(), &needle)
        {
            return false;
        }
    }
    // NaiveDate comparison is inherently whole-day, which gives the inclusive
    // start-of-day / end-of-day bound semantics.
    if let Some(from) = spec.date_from {
        if item.date_lost_found < from {
            return false;
        }
    }
    if let Some(to) = spec.date_to {
        if item.date_lost_found > to {
            return false;
        }
    }
    true
}

// needle must already be lowercased
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn opt_contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.map_or(false, |h| contains_ci(h, needle))
}
