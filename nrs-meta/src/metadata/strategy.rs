//! Per-field resolution policies
//!
//! Each field of a grouping is bound to one strategy at compile time:
//! `Override` picks a single winning value, `Merge` unions list values.
//! Strategies see the field's slots already sorted by source priority,
//! highest first.

use super::slot::Slot;
use serde::Serialize;

/// Values that carry no information even though they are present
///
/// Override skips placeholders while a better value exists further down the
/// ranking, but surfaces one if nothing else is available.
pub trait Placeholder {
    fn is_placeholder(&self) -> bool {
        false
    }
}

impl Placeholder for String {}
impl Placeholder for u32 {}
impl Placeholder for Vec<String> {}

/// Policy name as it appears in a grouping's policy table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    Override,
    Merge,
}

/// One row of a grouping's policy table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldPolicy {
    pub field: &'static str,
    pub strategy: ResolutionStrategy,
}

pub trait FieldStrategy<T> {
    /// Combine one field across ranked fragments
    fn resolve<'a, I>(ranked: I) -> Slot<T>
    where
        I: Iterator<Item = &'a Slot<T>>,
        T: 'a;

    /// Write-time canonicalization
    fn normalize(_slot: &mut Slot<T>) {}
}

/// First informative value wins
pub struct Override;

impl<T: Clone + Placeholder> FieldStrategy<T> for Override {
    fn resolve<'a, I>(ranked: I) -> Slot<T>
    where
        I: Iterator<Item = &'a Slot<T>>,
        T: 'a,
    {
        let mut fallback: Option<&Slot<T>> = None;

        for slot in ranked {
            match slot {
                Slot::Absent => continue,
                Slot::Value(v) if !v.is_placeholder() => return slot.clone(),
                _ => {
                    fallback.get_or_insert(slot);
                }
            }
        }

        fallback.cloned().unwrap_or_default()
    }
}

/// Ordered, deduplicated union of list values
pub struct Merge;

impl FieldStrategy<Vec<String>> for Merge {
    fn resolve<'a, I>(ranked: I) -> Slot<Vec<String>>
    where
        I: Iterator<Item = &'a Slot<Vec<String>>>,
    {
        let mut seen_any = false;
        let mut merged: Vec<String> = Vec::new();

        for slot in ranked {
            if slot.is_present() {
                seen_any = true;
            }
            if let Slot::Value(items) = slot {
                for item in items {
                    if !merged.contains(item) {
                        merged.push(item.clone());
                    }
                }
            }
        }

        if seen_any {
            Slot::Value(merged)
        } else {
            Slot::Absent
        }
    }

    fn normalize(slot: &mut Slot<Vec<String>>) {
        if let Slot::Value(items) = slot {
            let mut lowered: Vec<String> = Vec::with_capacity(items.len());
            for item in items.iter() {
                let item = item.trim().to_lowercase();
                if !item.is_empty() && !lowered.contains(&item) {
                    lowered.push(item);
                }
            }
            *items = lowered;
        }
    }
}
