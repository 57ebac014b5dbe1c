//! Window edge generation: which utterances may talk to which.
//!
//! For an anchor `i` in a dialogue of length `L`, the eligible targets are
//! the contiguous range `[max(0, i - past), min(L, i + future + 1))`, with
//! either side widened to the dialogue boundary when unbounded. The anchor
//! always lies in its own window, so every node gets a self-loop.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};

/// Directed `(source, target)` pairs local to one dialogue.
///
/// A `BTreeSet` so duplicates collapse and enumeration is deterministic.
pub type EdgeSet = BTreeSet<(usize, usize)>;

/// One side of the temporal window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Reach the dialogue boundary.
    Unbounded,
    /// Reach at most this many neighbours.
    Bounded(usize),
}

impl TryFrom<i64> for Window {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(Window::Unbounded),
            v if v >= 0 => Ok(Window::Bounded(v as usize)),
            v => Err(Error::InvalidWindow(v)),
        }
    }
}

impl From<Window> for i64 {
    fn from(w: Window) -> i64 {
        match w {
            Window::Unbounded => -1,
            Window::Bounded(n) => n as i64,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Unbounded => write!(f, "unbounded"),
            Window::Bounded(n) => write!(f, "{}", n),
        }
    }
}

/// Past and future window bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub past: Window,
    pub future: Window,
}

impl WindowSpec {
    /// Build from the `-1 = unbounded` integer convention.
    pub fn try_new(past: i64, future: i64) -> Result<Self> {
        Ok(Self {
            past: Window::try_from(past)?,
            future: Window::try_from(future)?,
        })
    }

    /// Target range for `anchor` in a dialogue of `length` utterances.
    pub fn range(&self, anchor: usize, length: usize) -> std::ops::Range<usize> {
        let start = match self.past {
            Window::Unbounded => 0,
            Window::Bounded(p) => anchor.saturating_sub(p),
        };
        let end = match self.future {
            Window::Unbounded => length,
            Window::Bounded(f) => length.min(anchor + f + 1),
        };
        start..end
    }

    /// All window edges for a dialogue of `length` utterances.
    pub fn edges(&self, length: usize) -> EdgeSet {
        let mut edges = EdgeSet::new();
        for anchor in 0..length {
            for target in self.range(anchor, length) {
                edges.insert((anchor, target));
            }
        }
        edges
    }
}

/// Window edges for one dialogue using the `-1 = unbounded` convention.
pub fn edge_perms(length: usize, window_past: i64, window_future: i64) -> Result<EdgeSet> {
    Ok(WindowSpec::try_new(window_past, window_future)?.edges(length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_utterances_one_each_way() {
        let edges = edge_perms(3, 1, 1).unwrap();
        let expected: EdgeSet = [(0, 0), (0, 1), (1, 0), (1, 1), (1, 2), (2, 1), (2, 2)]
            .into_iter()
            .collect();
        assert_eq!(edges, expected);
    }

    #[test]
    fn every_edge_in_bounds_with_self_loop() {
        for length in 1..8 {
            for past in -1..=2 {
                for future in -1..=2 {
                    let edges = edge_perms(length, past, future).unwrap();
                    for &(i, j) in &edges {
                        assert!(i < length && j < length, "({}, {}) outside {}", i, j, length);
                    }
                    for i in 0..length {
                        assert!(edges.contains(&(i, i)), "missing self-loop at {}", i);
                    }
                }
            }
        }
    }

    #[test]
    fn deterministic_across_calls() {
        let a: Vec<_> = edge_perms(9, 2, -1).unwrap().into_iter().collect();
        let b: Vec<_> = edge_perms(9, 2, -1).unwrap().into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn unbounded_both_ways_is_complete() {
        assert_eq!(edge_perms(5, -1, -1).unwrap().len(), 25);
    }

    #[test]
    fn zero_window_is_self_loops_only() {
        let edges = edge_perms(4, 0, 0).unwrap();
        assert_eq!(edges.len(), 4);
        assert!(edges.iter().all(|&(i, j)| i == j));
    }

    #[test]
    fn past_only_never_looks_ahead() {
        let edges = edge_perms(6, -1, 0).unwrap();
        assert!(edges.iter().all(|&(i, j)| j <= i));
        assert_eq!(edges.len(), 21);
    }

    #[test]
    fn empty_dialogue_has_no_edges() {
        assert!(edge_perms(0, 3, 3).unwrap().is_empty());
    }

    #[test]
    fn rejects_bounds_below_minus_one() {
        assert!(matches!(edge_perms(3, -2, 1), Err(Error::InvalidWindow(-2))));
        assert!(matches!(WindowSpec::try_new(0, -5), Err(Error::InvalidWindow(-5))));
    }

    #[test]
    fn window_round_trips_through_i64() {
        for v in [-1i64, 0, 3] {
            assert_eq!(i64::from(Window::try_from(v).unwrap()), v);
        }
    }
}
