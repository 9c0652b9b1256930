use std::collections::BTreeMap;

use crate::edge::{Edge, OrderedF64};

type LeftKey = (OrderedF64, OrderedF64, u32);
type RightKey = (OrderedF64, OrderedF64, u32);
type PathKey = (OrderedF64, OrderedF64, u32, u32);

/// The three sorted multi-indexes every edge participates in: by `(left,
/// time[child], child)`, by `(right, -time[child], child)`, and by `(left,
/// right, parent, child)`. Values are arena indices into the builder's edge
/// `Vec`.
#[derive(Debug, Default)]
pub struct Indexes {
    by_left: BTreeMap<LeftKey, usize>,
    by_right: BTreeMap<RightKey, usize>,
    by_path: BTreeMap<PathKey, usize>,
}

impl Indexes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_left.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_left.is_empty()
    }

    /// Check that all three indexes agree on cardinality, the debug invariant
    /// every public mutation must preserve.
    #[must_use]
    pub fn cardinalities_match(&self) -> bool {
        self.by_left.len() == self.by_right.len() && self.by_left.len() == self.by_path.len()
    }

    fn left_key(edge: &Edge, time_child: f64) -> LeftKey {
        (OrderedF64(edge.left), OrderedF64(time_child), edge.child)
    }

    fn right_key(edge: &Edge, time_child: f64) -> RightKey {
        (OrderedF64(edge.right), OrderedF64(-time_child), edge.child)
    }

    fn path_key(edge: &Edge) -> PathKey {
        (OrderedF64(edge.left), OrderedF64(edge.right), edge.parent, edge.child)
    }

    pub fn insert(&mut self, edge_id: usize, edge: &Edge, time_child: f64) {
        self.by_left.insert(Self::left_key(edge, time_child), edge_id);
        self.by_right.insert(Self::right_key(edge, time_child), edge_id);
        self.by_path.insert(Self::path_key(edge), edge_id);
    }

    pub fn remove(&mut self, edge: &Edge, time_child: f64) {
        self.by_left.remove(&Self::left_key(edge, time_child));
        self.by_right.remove(&Self::right_key(edge, time_child));
        self.by_path.remove(&Self::path_key(edge));
    }

    /// Find the edge occupying `(left, right, parent, *)` for some child other
    /// than the one under consideration, mirroring a bisect-then-check probe
    /// against the path index. Returns `(child, edge_id)` of the first match,
    /// if one exists.
    #[must_use]
    pub fn path_match(&self, left: f64, right: f64, parent: u32) -> Option<(u32, usize)> {
        let probe = (OrderedF64(left), OrderedF64(right), parent, 0u32);
        let (&(l, r, p, c), &edge_id) = self.by_path.range(probe..).next()?;
        if l.0 == left && r.0 == right && p == parent {
            Some((c, edge_id))
        } else {
            None
        }
    }

    /// Edge ids in `Il` order: ascending `left`, ties broken by `time[child]`
    /// then `child`.
    pub fn iter_by_left(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_left.values().copied()
    }

    /// Edge ids in `Ir` order: ascending `right`, ties broken by descending
    /// `time[child]` then `child`.
    pub fn iter_by_right(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_right.values().copied()
    }
}
