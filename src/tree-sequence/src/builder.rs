use std::collections::BTreeMap;

use log::trace;

use crate::edge::{Edge, OrderedF64, NODE_IS_SAMPLE};
use crate::error::TreeSequenceError;
use crate::index::Indexes;

/// A match found when probing the path index for a `(left, right, parent)`
/// triple already present under a different child: the existing child and
/// the arena index of its edge.
type PathMatch = (usize, u32, usize);

/// Mutable, append-only tree-sequence state: nodes, an edge arena organized
/// into per-child chains, and the three indexes `Il`/`Ir`/`Ip` kept in lockstep
/// with every chain mutation.
#[derive(Debug, Default)]
pub struct TreeSequenceBuilder {
    num_sites: u32,
    times: Vec<f64>,
    flags: Vec<u8>,
    edges: Vec<Edge>,
    path: Vec<Option<usize>>,
    mutations: BTreeMap<u32, Vec<(u32, u8)>>,
    indexes: Indexes,
}

impl TreeSequenceBuilder {
    #[must_use]
    pub fn new(num_sites: u32) -> Self {
        Self { num_sites, ..Self::default() }
    }

    #[must_use]
    pub fn num_sites(&self) -> u32 {
        self.num_sites
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.times.len()
    }

    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.indexes.len()
    }

    #[must_use]
    pub fn node_time(&self, node: u32) -> f64 {
        self.times[node as usize]
    }

    #[must_use]
    pub fn node_is_sample(&self, node: u32) -> bool {
        self.flags[node as usize] & NODE_IS_SAMPLE != 0
    }

    #[must_use]
    pub fn indexes(&self) -> &Indexes {
        &self.indexes
    }

    #[must_use]
    pub fn edge(&self, edge_id: usize) -> &Edge {
        &self.edges[edge_id]
    }

    #[must_use]
    pub fn path_head(&self, node: u32) -> Option<usize> {
        self.path[node as usize]
    }

    /// The node carrying site `site`'s leading (derived-state `1`) mutation,
    /// if any. By invariant there is at most one such node per site.
    #[must_use]
    pub fn first_mutation_at(&self, site: u32) -> Option<u32> {
        self.mutations.get(&site).and_then(|entries| entries.first()).map(|&(node, _)| node)
    }

    /// Append a new node, returning its id.
    pub fn add_node(&mut self, time: f64, is_sample: bool) -> u32 {
        let id = self.times.len() as u32;
        self.times.push(time);
        self.flags.push(if is_sample { NODE_IS_SAMPLE } else { 0 });
        self.path.push(None);
        trace!("add_node {id}: time={time}, is_sample={is_sample}");
        id
    }

    /// Bulk-load nodes from a snapshot, in id order.
    pub fn restore_nodes(&mut self, times: &[f64], flags: &[u8]) {
        for (&time, &flag) in times.iter().zip(flags) {
            self.add_node(time, flag & NODE_IS_SAMPLE != 0);
        }
    }

    /// Build and insert `child`'s edge chain from three parallel arrays given in
    /// decreasing-`left` order (as a backward traceback naturally produces);
    /// the chain ends up sorted ascending by `left`. Runs path compression
    /// first when `compress` is set.
    pub fn add_path(
        &mut self,
        child: u32,
        lefts: &[f64],
        rights: &[f64],
        parents: &[u32],
        compress: bool,
    ) -> Result<(), TreeSequenceError> {
        if self.path[child as usize].is_some() {
            return Err(TreeSequenceError::ChildPathNotEmpty { node: child });
        }

        let mut head: Option<usize> = None;
        let mut prev: Option<usize> = None;
        for i in (0..lefts.len()).rev() {
            let edge_id = self.edges.len();
            self.edges.push(Edge::new(lefts[i], rights[i], parents[i], child));
            match prev {
                Some(prev_id) => self.edges[prev_id].next = Some(edge_id),
                None => head = Some(edge_id),
            }
            prev = Some(edge_id);
        }

        let head = match head {
            Some(h) if compress => Some(self.compress_path(h)?),
            other => other,
        };

        self.path[child as usize] = head;
        if let Some(h) = head {
            self.index_chain(h);
        }
        self.debug_check_state()?;
        Ok(())
    }

    /// Append mutations at the given sites, all attributed to `node`.
    pub fn add_mutations(&mut self, node: u32, sites: &[u32], derived_states: &[u8]) {
        for (&site, &derived) in sites.iter().zip(derived_states) {
            self.mutations.entry(site).or_default().push((node, derived));
        }
    }

    /// Bulk-load mutations from a snapshot. The mutation's parent is not
    /// stored: it is always derivable from the ordering within a site's list.
    pub fn restore_mutations(
        &mut self,
        sites: &[u32],
        nodes: &[u32],
        derived_states: &[u8],
    ) -> Result<(), TreeSequenceError> {
        if sites.len() != nodes.len() || sites.len() != derived_states.len() {
            return Err(TreeSequenceError::RestoreMutationsLengthMismatch {
                site: sites.len(),
                node: nodes.len(),
                derived_state: derived_states.len(),
            });
        }
        for ((&site, &node), &derived) in sites.iter().zip(nodes).zip(derived_states) {
            self.mutations.entry(site).or_default().push((node, derived));
        }
        Ok(())
    }

    /// Bulk-load edges from a snapshot: group by child, sort each group by
    /// `left`, link into chains, and index.
    pub fn restore_edges(
        &mut self,
        lefts: &[f64],
        rights: &[f64],
        parents: &[u32],
        children: &[u32],
    ) -> Result<(), TreeSequenceError> {
        let n = lefts.len();
        if rights.len() != n || parents.len() != n || children.len() != n {
            return Err(TreeSequenceError::RestoreLengthMismatch {
                left: lefts.len(),
                right: rights.len(),
                parent: parents.len(),
                child: children.len(),
            });
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| (children[i], OrderedF64(lefts[i])));

        let mut prev_child: Option<u32> = None;
        let mut prev_edge_id: Option<usize> = None;
        for &i in &order {
            let edge_id = self.edges.len();
            self.edges.push(Edge::new(lefts[i], rights[i], parents[i], children[i]));
            if prev_child == Some(children[i]) {
                if let Some(pid) = prev_edge_id {
                    self.edges[pid].next = Some(edge_id);
                }
            } else {
                self.path[children[i] as usize] = Some(edge_id);
            }
            let time_child = self.times[children[i] as usize];
            self.indexes.insert(edge_id, &self.edges[edge_id], time_child);
            prev_child = Some(children[i]);
            prev_edge_id = Some(edge_id);
        }

        self.debug_check_state()?;
        Ok(())
    }

    /// Parallel `(time, flags)` columns, in node-id order.
    #[must_use]
    pub fn dump_nodes(&self) -> (Vec<f64>, Vec<u8>) {
        (self.times.clone(), self.flags.clone())
    }

    /// Parallel `(left, right, parent, child)` columns, chains emitted in
    /// child-id order.
    #[must_use]
    pub fn dump_edges(&self) -> (Vec<f64>, Vec<f64>, Vec<u32>, Vec<u32>) {
        let mut lefts = Vec::new();
        let mut rights = Vec::new();
        let mut parents = Vec::new();
        let mut children = Vec::new();
        for head in self.path.iter().flatten() {
            let mut cur = Some(*head);
            while let Some(edge_id) = cur {
                let e = self.edges[edge_id];
                lefts.push(e.left);
                rights.push(e.right);
                parents.push(e.parent);
                children.push(e.child);
                cur = e.next;
            }
        }
        (lefts, rights, parents, children)
    }

    /// Parallel `(site, node, derived_state)` columns, grouped by ascending
    /// site id, in insertion order within a site.
    #[must_use]
    pub fn dump_mutations(&self) -> (Vec<u32>, Vec<u32>, Vec<u8>) {
        let mut sites = Vec::new();
        let mut nodes = Vec::new();
        let mut derived = Vec::new();
        for (&site, entries) in &self.mutations {
            for &(node, d) in entries {
                sites.push(site);
                nodes.push(node);
                derived.push(d);
            }
        }
        (sites, nodes, derived)
    }

    fn index_chain(&mut self, head: usize) {
        let mut cur = Some(head);
        while let Some(edge_id) = cur {
            let edge = self.edges[edge_id];
            let time_child = self.times[edge.child as usize];
            self.indexes.insert(edge_id, &edge, time_child);
            cur = edge.next;
        }
    }

    fn unindex_chain(&mut self, head: usize) {
        let mut cur = Some(head);
        while let Some(edge_id) = cur {
            let edge = self.edges[edge_id];
            let time_child = self.times[edge.child as usize];
            self.indexes.remove(&edge, time_child);
            cur = edge.next;
        }
    }

    /// Merge adjacent edges `(l, x, p, c)` and `(x, r, p, c)` in a chain into
    /// `(l, r, p, c)`. Dropped edges are left as unreferenced arena entries.
    fn squash_chain(&mut self, head: usize) -> usize {
        let mut prev = head;
        let mut cur = self.edges[prev].next;
        while let Some(x) = cur {
            let (prev_right, prev_child, prev_parent) = {
                let e = self.edges[prev];
                (e.right, e.child, e.parent)
            };
            let x_edge = self.edges[x];
            if prev_right == x_edge.left && prev_child == x_edge.child && prev_parent == x_edge.parent {
                self.edges[prev].right = x_edge.right;
                self.edges[prev].next = x_edge.next;
                cur = x_edge.next;
            } else {
                prev = x;
                cur = x_edge.next;
            }
        }
        head
    }

    /// Try to compress the not-yet-indexed chain rooted at `head`: for every
    /// edge that exactly matches an already-indexed `(left, right, parent)`
    /// triple under some other child, reroute through that child (or, if it
    /// isn't already synthetic, through a freshly created synthetic node) once
    /// at least two edges agree on the same target.
    fn compress_path(&mut self, head: usize) -> Result<usize, TreeSequenceError> {
        let mut matches: Vec<PathMatch> = Vec::new();
        let mut cur = Some(head);
        while let Some(edge_id) = cur {
            let edge = self.edges[edge_id];
            if let Some((matched_child, matched_edge_id)) = self.indexes.path_match(edge.left, edge.right, edge.parent)
            {
                matches.push((edge_id, matched_child, matched_edge_id));
            }
            cur = edge.next;
        }

        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for &(_, matched_child, _) in &matches {
            *counts.entry(matched_child).or_insert(0) += 1;
        }

        for (&child_id, &count) in &counts {
            if count < 2 {
                continue;
            }
            if self.flags[child_id as usize] == 0 {
                self.remap_synthetic(child_id, &matches);
            } else {
                self.create_synthetic_node(child_id, &matches)?;
            }
        }

        Ok(self.squash_chain(head))
    }

    fn remap_synthetic(&mut self, child_id: u32, matches: &[PathMatch]) {
        for &(new_edge_id, matched_child, _) in matches {
            if matched_child == child_id {
                self.edges[new_edge_id].parent = child_id;
            }
        }
    }

    fn create_synthetic_node(&mut self, child_id: u32, matches: &[PathMatch]) -> Result<(), TreeSequenceError> {
        let synthetic_node = self.add_node(0.0, false);

        if let Some(existing_head) = self.path[child_id as usize] {
            self.unindex_chain(existing_head);
        }

        let mut synthetic_head: Option<usize> = None;
        let mut synthetic_prev: Option<usize> = None;
        for &(new_edge_id, matched_child, matched_edge_id) in matches {
            if matched_child != child_id {
                continue;
            }
            let matched = self.edges[matched_edge_id];
            let synth_edge_id = self.edges.len();
            self.edges.push(Edge::new(matched.left, matched.right, matched.parent, synthetic_node));
            match synthetic_prev {
                Some(prev_id) => self.edges[prev_id].next = Some(synth_edge_id),
                None => synthetic_head = Some(synth_edge_id),
            }
            synthetic_prev = Some(synth_edge_id);

            self.edges[new_edge_id].parent = synthetic_node;
            self.edges[matched_edge_id].parent = synthetic_node;
        }

        let synthetic_head = synthetic_head.ok_or_else(|| {
            TreeSequenceError::InternalInvariant(format!(
                "create_synthetic_node for child {child_id} found no matches despite count >= 2"
            ))
        })?;
        let synthetic_head = self.squash_chain(synthetic_head);
        self.path[synthetic_node as usize] = Some(synthetic_head);

        if let Some(existing_head) = self.path[child_id as usize] {
            self.path[child_id as usize] = Some(self.squash_chain(existing_head));
        }

        self.update_node_time(synthetic_node)?;

        self.index_chain(synthetic_head);
        if let Some(existing_head) = self.path[child_id as usize] {
            self.index_chain(existing_head);
        }
        trace!("create_synthetic_node {synthetic_node} for child {child_id}");
        Ok(())
    }

    /// Set a freshly-created synthetic node's time strictly below the lowest
    /// time among its chain's parents (and never above the root's time).
    fn update_node_time(&mut self, node_id: u32) -> Result<(), TreeSequenceError> {
        if self.flags[node_id as usize] != 0 {
            return Err(TreeSequenceError::InternalInvariant(format!(
                "update_node_time called on non-synthetic node {node_id}"
            )));
        }
        let root_time = self.times[0];
        let mut min_parent_time = root_time + 1.0;
        let mut cur = self.path[node_id as usize];
        let mut saw_edge = false;
        while let Some(edge_id) = cur {
            saw_edge = true;
            let edge = self.edges[edge_id];
            min_parent_time = min_parent_time.min(self.times[edge.parent as usize]);
            cur = edge.next;
        }
        if !saw_edge {
            return Err(TreeSequenceError::InternalInvariant(format!(
                "update_node_time called on node {node_id} with an empty chain"
            )));
        }
        if !(0.0..=root_time).contains(&min_parent_time) {
            return Err(TreeSequenceError::InternalInvariant(format!(
                "update_node_time: min_parent_time {min_parent_time} out of [0, {root_time}] for node {node_id}"
            )));
        }
        self.times[node_id as usize] = min_parent_time - 0.1;
        Ok(())
    }

    fn debug_check_state(&self) -> Result<(), TreeSequenceError> {
        if cfg!(debug_assertions) {
            self.check_state()
        } else {
            Ok(())
        }
    }

    /// Assert every documented invariant. Intended for debug builds and tests;
    /// a violation here is always a bug in this crate, never a user error.
    pub fn check_state(&self) -> Result<(), TreeSequenceError> {
        if !self.indexes.cardinalities_match() {
            return Err(TreeSequenceError::InternalInvariant(
                "Il/Ir/Ip index cardinalities diverged".to_string(),
            ));
        }
        for (child, head) in self.path.iter().enumerate() {
            let Some(head) = head else { continue };
            let mut cur = Some(*head);
            let mut prev_right: Option<f64> = None;
            while let Some(edge_id) = cur {
                let e = self.edges[edge_id];
                if e.child as usize != child {
                    return Err(TreeSequenceError::InternalInvariant(format!(
                        "chain for node {child} contains an edge belonging to child {}",
                        e.child
                    )));
                }
                if let Some(pr) = prev_right {
                    if e.left < pr {
                        return Err(TreeSequenceError::InternalInvariant(format!(
                            "chain for node {child} is not sorted by left"
                        )));
                    }
                    if self.flags[child] != 0 && e.left != pr {
                        return Err(TreeSequenceError::InternalInvariant(format!(
                            "non-synthetic node {child} has a gap in its chain"
                        )));
                    }
                }
                prev_right = Some(e.right);
                cur = e.next;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_root_tsb() -> TreeSequenceBuilder {
        let mut tsb = TreeSequenceBuilder::new(10);
        tsb.add_node(2.0, true); // root, id 0
        tsb
    }

    #[test]
    fn add_path_builds_ascending_chain_from_descending_input() {
        let mut tsb = two_root_tsb();
        let child = tsb.add_node(0.0, true);
        // decreasing-left input, as a backward traceback would emit
        tsb.add_path(child, &[5.0, 2.0, 0.0], &[10.0, 5.0, 2.0], &[0, 0, 0], false).unwrap();

        let (lefts, rights, _, _) = tsb.dump_edges();
        assert_eq!(lefts, vec![0.0, 2.0, 5.0]);
        assert_eq!(rights, vec![2.0, 5.0, 10.0]);
    }

    #[test]
    fn rejects_double_add_path() {
        let mut tsb = two_root_tsb();
        let child = tsb.add_node(0.0, true);
        tsb.add_path(child, &[0.0], &[10.0], &[0], false).unwrap();
        let err = tsb.add_path(child, &[0.0], &[10.0], &[0], false).unwrap_err();
        assert!(matches!(err, TreeSequenceError::ChildPathNotEmpty { node } if node == child));
    }

    #[test]
    fn squash_merges_contiguous_identical_parent_edges() {
        let mut tsb = two_root_tsb();
        let child = tsb.add_node(0.0, true);
        tsb.add_path(child, &[5.0, 0.0], &[10.0, 5.0], &[0, 0], true).unwrap();
        assert_eq!(tsb.num_edges(), 1);
        let (lefts, rights, _, _) = tsb.dump_edges();
        assert_eq!(lefts, vec![0.0]);
        assert_eq!(rights, vec![10.0]);
    }

    #[test]
    fn path_compression_creates_synthetic_node_on_repeated_match() {
        let mut tsb = two_root_tsb();
        let a = tsb.add_node(1.0, true);
        let b = tsb.add_node(1.0, true);
        tsb.add_path(a, &[5.0, 0.0], &[10.0, 5.0], &[0, 0], false).unwrap();
        // b shares both segments with a against the same parent 0: should synthesize a new node.
        tsb.add_path(b, &[5.0, 0.0], &[10.0, 5.0], &[0, 0], true).unwrap();

        assert_eq!(tsb.num_nodes(), 4); // root, a, b, synthetic
        let synthetic = 3u32;
        assert!(!tsb.node_is_sample(synthetic));
        // strictly between the children (time 1.0) and the root parent (time 2.0)
        assert!(tsb.node_time(synthetic) > 1.0 && tsb.node_time(synthetic) < 2.0);
        tsb.check_state().unwrap();
    }

    #[test]
    fn restore_round_trips_dump() {
        let mut tsb = two_root_tsb();
        let child = tsb.add_node(0.0, true);
        tsb.add_path(child, &[5.0, 0.0], &[10.0, 5.0], &[0, 0], false).unwrap();
        tsb.add_mutations(child, &[3], &[1]);

        let (times, flags) = tsb.dump_nodes();
        let (lefts, rights, parents, children) = tsb.dump_edges();
        let (sites, nodes, derived) = tsb.dump_mutations();

        let mut restored = TreeSequenceBuilder::new(10);
        restored.restore_nodes(&times, &flags);
        restored.restore_edges(&lefts, &rights, &parents, &children).unwrap();
        restored.restore_mutations(&sites, &nodes, &derived).unwrap();

        assert_eq!(restored.dump_nodes(), (times, flags));
        assert_eq!(restored.dump_edges(), (lefts, rights, parents, children));
        assert_eq!(restored.dump_mutations(), (sites, nodes, derived));
        restored.check_state().unwrap();
    }
}
