use std::cmp::Ordering;

/// Total-ordered wrapper around `f64`, used as a `BTreeMap` key. Times and
/// positions in this crate are always finite, so `total_cmp` gives a correct
/// total order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedF64(pub f64);

impl Eq for OrderedF64 {}

impl PartialOrd for OrderedF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// An half-open genomic interval `[left, right)` inherited by `child` from
/// `parent`. Edges for a given child are chained via `next`, an index into the
/// arena they're stored in, sorted by `left`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub left: f64,
    pub right: f64,
    pub parent: u32,
    pub child: u32,
    pub next: Option<usize>,
}

impl Edge {
    #[must_use]
    pub fn new(left: f64, right: f64, parent: u32, child: u32) -> Self {
        Self { left, right, parent, child, next: None }
    }
}

pub const NODE_IS_SAMPLE: u8 = 1;
