//! Captured call stacks and the merge performed on re-raise.
//!
//! Snapshots are stored oldest caller first: index 0 is the outermost frame
//! (closest to `main`), the last element is the innermost frame (closest to
//! the raise point).
//!
//! # Merging
//!
//! An error re-raised through several nested handlers picks up a fresh
//! snapshot at every raise. Those snapshots overlap: the frames around the
//! raise point are shared, while the frames older than where the two
//! captures diverge only exist in the earlier one. [`StackSnapshot::merge`]
//! keeps one copy of the shared part:
//!
//! ```text
//! old: [a, b, c, x, y]        new: [p, q, x, y]
//!                 ^^^^^                    ^^^^  common innermost run (2)
//! merged: [a, b, c] ++ [p, q, x, y]
//! ```

use serde::Serialize;
use std::fmt;

use crate::frame::StackFrame;

/// An ordered, immutable sequence of frames, oldest caller first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StackSnapshot {
    frames: Vec<StackFrame>,
}

impl StackSnapshot {
    /// Build a snapshot from frames ordered oldest caller first.
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StackFrame> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frame closest to the raise point.
    pub fn innermost(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    /// The frame closest to the program entry.
    pub fn outermost(&self) -> Option<&StackFrame> {
        self.frames.first()
    }

    /// Length of the run of equal frames shared by both snapshots, counted
    /// inward-out from the innermost frame of each.
    pub fn common_suffix_len(&self, other: &StackSnapshot) -> usize {
        self.frames
            .iter()
            .rev()
            .zip(other.frames.iter().rev())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Merge `self` (the previously attached snapshot) with `newer`.
    ///
    /// Returns `newer` with the frames of `self` that lie outside the common
    /// innermost run prepended. Neither input is modified.
    pub fn merge(&self, newer: &StackSnapshot) -> StackSnapshot {
        let shared = self.common_suffix_len(newer);
        let keep = self.frames.len() - shared;
        let mut frames = Vec::with_capacity(keep + newer.frames.len());
        frames.extend_from_slice(&self.frames[..keep]);
        frames.extend_from_slice(&newer.frames);
        tracing::trace!(
            old = self.frames.len(),
            new = newer.frames.len(),
            shared,
            merged = frames.len(),
            "merged stack snapshots"
        );
        StackSnapshot { frames }
    }
}

/// Merge two optional snapshots. An absent snapshot behaves as empty, and the
/// result is absent only when both inputs are.
pub fn merge_stacks(
    old: Option<&StackSnapshot>,
    newer: Option<&StackSnapshot>,
) -> Option<StackSnapshot> {
    match (old, newer) {
        (None, None) => None,
        (Some(old), None) => Some(old.clone()),
        (None, Some(newer)) => Some(newer.clone()),
        (Some(old), Some(newer)) => Some(old.merge(newer)),
    }
}

impl<'a> IntoIterator for &'a StackSnapshot {
    type Item = &'a StackFrame;
    type IntoIter = std::slice::Iter<'a, StackFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

impl FromIterator<StackFrame> for StackSnapshot {
    fn from_iter<I: IntoIterator<Item = StackFrame>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Display for StackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return Ok(());
        }
        writeln!(f, "stack (most recent call last):")?;
        for (i, frame) in self.frames.iter().enumerate() {
            writeln!(f, "  {i}: {frame}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(name: &str) -> StackFrame {
        StackFrame::new("app", "app.rs", name.len() as u32, name)
    }

    fn snap(names: &[&str]) -> StackSnapshot {
        names.iter().map(|n| frame(n)).collect()
    }

    #[test]
    fn test_merge_with_itself_is_identity() {
        let s = snap(&["main", "load", "parse", "read"]);
        assert_eq!(s.merge(&s), s);
        assert_eq!(StackSnapshot::empty().merge(&StackSnapshot::empty()), StackSnapshot::empty());
    }

    #[test]
    fn test_merge_keeps_unconsumed_outer_prefix() {
        let old = snap(&["main", "load", "parse", "handler", "read"]);
        let new = snap(&["retry", "handler", "read"]);
        let merged = old.merge(&new);

        assert_eq!(old.common_suffix_len(&new), 2);
        assert_eq!(merged, snap(&["main", "load", "parse", "retry", "handler", "read"]));
        assert!(merged.len() <= old.len() + new.len());
        assert_eq!(&merged.frames()[..3], &old.frames()[..3]);
    }

    #[test]
    fn test_merge_disjoint_prepends_everything() {
        let old = snap(&["main", "a"]);
        let new = snap(&["main", "b"]);
        assert_eq!(old.merge(&new), snap(&["main", "a", "main", "b"]));
    }

    #[test]
    fn test_merge_when_new_is_suffix_of_old() {
        let old = snap(&["main", "a", "b"]);
        let new = snap(&["a", "b"]);
        assert_eq!(old.merge(&new), old);
    }

    #[test]
    fn test_merge_when_old_is_suffix_of_new() {
        let old = snap(&["b"]);
        let new = snap(&["main", "a", "b"]);
        assert_eq!(old.merge(&new), new);
    }

    #[test]
    fn test_merge_with_empty_sides() {
        let s = snap(&["main", "a"]);
        assert_eq!(StackSnapshot::empty().merge(&s), s);
        assert_eq!(s.merge(&StackSnapshot::empty()), s);
    }

    #[test]
    fn test_merge_stops_at_field_mismatch() {
        let old = StackSnapshot::new(vec![frame("main"), frame("a").with_line(None)]);
        let new = StackSnapshot::new(vec![frame("main"), frame("a")]);
        assert_eq!(old.common_suffix_len(&new), 0);
        assert_eq!(old.merge(&new).len(), 4);
    }

    #[test]
    fn test_merge_stacks_optional() {
        let s = snap(&["main"]);
        assert_eq!(merge_stacks(None, None), None);
        assert_eq!(merge_stacks(Some(&s), None), Some(s.clone()));
        assert_eq!(merge_stacks(None, Some(&s)), Some(s.clone()));
        assert_eq!(merge_stacks(Some(&s), Some(&s)), Some(s));
    }

    #[test]
    fn test_display_lists_frames() {
        let text = snap(&["main", "run"]).to_string();
        assert!(text.starts_with("stack (most recent call last):"));
        assert!(text.contains("  0: app::main at app.rs:4"));
        assert!(text.contains("  1: app::run at app.rs:3"));
        assert_eq!(StackSnapshot::empty().to_string(), "");
    }
}
