use log::debug;
use tree_sequence::TreeSequenceBuilder;

use crate::error::AncestorMatcherError;
use crate::likelihood::Likelihood;
use crate::tree_state::{SparseTree, NULL_NODE};

/// The outcome of [`find_path`]: the recombination-minimizing path through the
/// current tree sequence, plus the haplotype the matcher actually recovered
/// (which may disagree with the input at sites forced to mismatch).
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub lefts: Vec<f64>,
    pub rights: Vec<f64>,
    pub parents: Vec<u32>,
    pub matched_haplotype: Vec<u8>,
}

/// Per-call scratch state for the copying HMM: the local tree being
/// maintained as the matcher steps across sites, the likelihood lattice per
/// node, and the traceback recorded along the way.
struct MatchState {
    tree: SparseTree,
    likelihood: Vec<Likelihood>,
    active: Vec<u32>,
    path_cache: Vec<Option<bool>>,
    l_cache: Vec<Option<Likelihood>>,
    traceback: Vec<Vec<(u32, bool)>>,
    argmax_node: Vec<i32>,
}

impl MatchState {
    fn new(num_nodes: usize, num_sites: usize) -> Self {
        Self {
            tree: SparseTree::new(num_nodes),
            likelihood: vec![Likelihood::Missing; num_nodes],
            active: Vec::new(),
            path_cache: vec![None; num_nodes],
            l_cache: vec![None; num_nodes],
            traceback: vec![Vec::new(); num_sites],
            argmax_node: vec![NULL_NODE; num_sites],
        }
    }

    fn deactivate(&mut self, u: u32) {
        if let Some(pos) = self.active.iter().position(|&v| v == u) {
            self.active.swap_remove(pos);
        }
    }
}

/// Run the Li-Stephens copying HMM forward across `[start, end)` against the
/// tree sequence's frozen edge indexes, then trace back the highest-likelihood
/// path. `h` gives the target haplotype; entries outside `[start, end)` are
/// ignored.
pub fn find_path(
    tree_seq: &TreeSequenceBuilder,
    h: &[u8],
    start: u32,
    end: u32,
) -> Result<MatchResult, AncestorMatcherError> {
    if start >= end {
        return Err(AncestorMatcherError::EmptyInterval { start, end });
    }

    let n = tree_seq.num_nodes();
    let m = tree_seq.num_sites();
    let il: Vec<usize> = tree_seq.indexes().iter_by_left().collect();
    let ir: Vec<usize> = tree_seq.indexes().iter_by_right().collect();
    let num_edges = il.len();

    let mut state = MatchState::new(n, m as usize);

    let edge_left = |tree_seq: &TreeSequenceBuilder, id: usize| tree_seq.edge(id).left;
    let edge_right = |tree_seq: &TreeSequenceBuilder, id: usize| tree_seq.edge(id).right;

    // Catch up the tree to the first segment overlapping `start`.
    let mut j = 0usize;
    let mut k = 0usize;
    let mut left = 0.0f64;
    let mut pos = 0.0f64;
    let mut right = m as f64;
    if j < num_edges && (start as f64) < edge_left(tree_seq, il[j]) {
        right = edge_left(tree_seq, il[j]);
    }
    while j < num_edges && k < num_edges && edge_left(tree_seq, il[j]) <= start as f64 {
        while k < num_edges && edge_right(tree_seq, ir[k]) == pos {
            let e = *tree_seq.edge(ir[k]);
            state.tree.remove_edge(e.parent, e.child);
            k += 1;
        }
        while j < num_edges && edge_left(tree_seq, il[j]) == pos {
            let e = *tree_seq.edge(il[j]);
            state.tree.insert_edge(e.parent, e.child);
            j += 1;
        }
        left = pos;
        right = m as f64;
        if j < num_edges {
            right = right.min(edge_left(tree_seq, il[j]));
        }
        if k < num_edges {
            right = right.min(edge_right(tree_seq, ir[k]));
        }
        pos = right;
    }
    if left >= right {
        return Err(AncestorMatcherError::InternalInvariant(format!(
            "find_path: initial tree catch-up produced an empty interval [{left}, {right})"
        )));
    }

    for u in 0..n {
        if state.tree.parent[u] != NULL_NODE {
            state.likelihood[u] = Likelihood::Compressed;
        }
    }

    let mut last_root = 0u32;
    if state.tree.left_child[0] != NULL_NODE {
        last_root = state.tree.left_child[0] as u32;
    }
    state.active.push(last_root);
    state.likelihood[last_root as usize] = Likelihood::Match;

    let mut remove_start = k;
    let mut widest_tree = 0usize;
    while left < end as f64 {
        for l in remove_start..k {
            let e = *tree_seq.edge(ir[l]);
            for u in [e.parent, e.child] {
                if state.tree.is_nonzero_root(u) {
                    state.likelihood[u as usize] = Likelihood::Missing;
                    state.deactivate(u);
                }
            }
        }

        let mut root = 0u32;
        if state.tree.left_child[0] != NULL_NODE {
            root = state.tree.left_child[0] as u32;
        }
        if root != last_root {
            if last_root == 0 {
                state.likelihood[last_root as usize] = Likelihood::Missing;
                state.deactivate(last_root);
            }
            if state.likelihood[root as usize] == Likelihood::Missing {
                state.likelihood[root as usize] = Likelihood::Mismatch;
                state.active.push(root);
            }
            last_root = root;
        }

        widest_tree = widest_tree.max(state.active.len());

        let site_lo = (left.max(start as f64)) as u32;
        let site_hi = (right.min(end as f64)) as u32;
        for site in site_lo..site_hi {
            update_site(tree_seq, &mut state, site, h[site as usize]);
        }

        remove_start = k;
        while k < num_edges && edge_right(tree_seq, ir[k]) == right {
            let e = *tree_seq.edge(ir[k]);
            state.tree.remove_edge(e.parent, e.child);
            k += 1;
            if state.likelihood[e.child as usize] == Likelihood::Compressed {
                let mut u = e.parent;
                while state.likelihood[u as usize] == Likelihood::Compressed && state.l_cache[u as usize].is_none() {
                    u = state.tree.parent[u as usize] as u32;
                }
                let l_child = state.l_cache[u as usize].unwrap_or(state.likelihood[u as usize]);
                let mut u2 = e.parent;
                while state.likelihood[u2 as usize] == Likelihood::Compressed && state.l_cache[u2 as usize].is_none()
                {
                    state.l_cache[u2 as usize] = Some(l_child);
                    u2 = state.tree.parent[u2 as usize] as u32;
                }
                state.likelihood[e.child as usize] = l_child;
                state.active.push(e.child);
            }
        }
        for l in remove_start..k {
            let e = *tree_seq.edge(ir[l]);
            let mut u = e.parent as i32;
            while u != NULL_NODE && state.l_cache[u as usize].is_some() {
                state.l_cache[u as usize] = None;
                u = state.tree.parent[u as usize];
            }
        }

        left = right;
        while j < num_edges && edge_left(tree_seq, il[j]) == left {
            let e = *tree_seq.edge(il[j]);
            state.tree.insert_edge(e.parent, e.child);
            j += 1;
            for u in [e.parent, e.child] {
                if u != 0 && state.likelihood[u as usize] == Likelihood::Missing {
                    state.likelihood[u as usize] = Likelihood::Mismatch;
                    state.active.push(u);
                }
            }
        }
        right = m as f64;
        if j < num_edges {
            right = right.min(edge_left(tree_seq, il[j]));
        }
        if k < num_edges {
            right = right.min(edge_right(tree_seq, ir[k]));
        }
    }

    debug!(
        "find_path [{start}, {end}): widest local tree had {widest_tree} active nodes, {num_edges} indexed edges"
    );

    run_traceback(tree_seq, &mut state, &il, &ir, start, end)
}

/// Update the likelihood of every active node for `site`, given the observed
/// allele `state_allele` in the haplotype being matched.
fn update_site(tree_seq: &TreeSequenceBuilder, state: &mut MatchState, site: u32, state_allele: u8) {
    let mut mutation_node: i32 = NULL_NODE;
    if let Some(node) = tree_seq.first_mutation_at(site) {
        mutation_node = node as i32;
        if state.likelihood[node as usize] == Likelihood::Compressed {
            let mut u = node;
            while state.likelihood[u as usize] == Likelihood::Compressed {
                u = state.tree.parent[u as usize] as u32;
            }
            state.likelihood[node as usize] = state.likelihood[u as usize];
            state.active.push(node);
        }
    }

    let active_nodes = state.active.clone();
    let mut max_l: Option<Likelihood> = None;
    let mut max_l_node: i32 = NULL_NODE;

    for &u in &active_nodes {
        let mut d = false;
        if mutation_node != NULL_NODE {
            let mut v = u as i32;
            while v != NULL_NODE && v != mutation_node && state.path_cache[v as usize].is_none() {
                v = state.tree.parent[v as usize];
            }
            d = if v != NULL_NODE && state.path_cache[v as usize].is_some() {
                state.path_cache[v as usize].unwrap()
            } else {
                v == mutation_node
            };
            let mut v2 = u as i32;
            while v2 != NULL_NODE && v2 != mutation_node && state.path_cache[v2 as usize].is_none() {
                state.path_cache[v2 as usize] = Some(d);
                v2 = state.tree.parent[v2 as usize];
            }
        }

        let recombination_required = state.likelihood[u as usize] == Likelihood::Mismatch;
        state.traceback[site as usize].push((u, recombination_required));

        if mutation_node != NULL_NODE && d != (state_allele == 1) {
            state.likelihood[u as usize] = Likelihood::Mismatch;
        } else if state.likelihood[u as usize] == Likelihood::Mismatch {
            state.likelihood[u as usize] = Likelihood::Recomb;
        }

        if max_l.map_or(true, |m| state.likelihood[u as usize] > m) {
            max_l = Some(state.likelihood[u as usize]);
            max_l_node = u as i32;
        }
    }

    if max_l != Some(Likelihood::Match) {
        if let Some(threshold) = max_l {
            for &u in &active_nodes {
                if state.likelihood[u as usize] == threshold {
                    state.likelihood[u as usize] = Likelihood::Match;
                }
            }
        }
    }
    state.argmax_node[site as usize] = max_l_node;

    for &u in &active_nodes {
        let mut v = u as i32;
        while v != NULL_NODE && state.path_cache[v as usize].is_some() {
            state.path_cache[v as usize] = None;
            v = state.tree.parent[v as usize];
        }
    }

    compress_likelihoods(state);
}

/// Drop every active node whose likelihood equals that of its nearest active
/// ancestor: it carries no information a traceback couldn't recover by
/// inheritance, so it's demoted to `Compressed` and removed from the active set.
fn compress_likelihoods(state: &mut MatchState) {
    let old_active = std::mem::take(&mut state.active);
    let mut cached_paths = Vec::new();

    for u in old_active {
        let p = state.tree.parent[u as usize];
        if p != NULL_NODE {
            cached_paths.push(p);
            let mut v = p;
            while state.likelihood[v as usize] == Likelihood::Compressed && state.l_cache[v as usize].is_none() {
                v = state.tree.parent[v as usize];
            }
            let l_p = state.l_cache[v as usize].unwrap_or(state.likelihood[v as usize]);
            let mut v2 = p;
            while state.likelihood[v2 as usize] == Likelihood::Compressed && state.l_cache[v2 as usize].is_none() {
                state.l_cache[v2 as usize] = Some(l_p);
                v2 = state.tree.parent[v2 as usize];
            }
            if state.likelihood[u as usize] == l_p {
                state.likelihood[u as usize] = Likelihood::Compressed;
            }
        }
        if state.likelihood[u as usize] != Likelihood::Compressed {
            state.active.push(u);
        }
    }

    for p in cached_paths {
        let mut v = p;
        while v != NULL_NODE && state.l_cache[v as usize].is_some() {
            state.l_cache[v as usize] = None;
            v = state.tree.parent[v as usize];
        }
    }
}

/// Walk backward from the end of the interval, recovering the recombination-
/// minimizing path and the haplotype the matcher actually assigns at each site.
fn run_traceback(
    tree_seq: &TreeSequenceBuilder,
    state: &mut MatchState,
    il: &[usize],
    ir: &[usize],
    start: u32,
    end: u32,
) -> Result<MatchResult, AncestorMatcherError> {
    let num_edges = il.len();
    let num_sites = tree_seq.num_sites();

    let mut u = state.argmax_node[end as usize - 1];
    if u == NULL_NODE {
        return Err(AncestorMatcherError::InternalInvariant(format!(
            "run_traceback: no arg-max node recorded at site {}",
            end - 1
        )));
    }

    #[derive(Clone, Copy)]
    struct OpenEdge {
        left: f64,
        right: f64,
        parent: u32,
    }
    let mut output_edges = vec![OpenEdge { left: 0.0, right: end as f64, parent: u as u32 }];

    let mut required: Vec<i8> = vec![-1; tree_seq.num_nodes()]; // -1 = unmarked, 0 = false, 1 = true
    let mut matched_haplotype = vec![sample_data::UNKNOWN_ALLELE; num_sites as usize];
    for site in start..end {
        matched_haplotype[site as usize] = 0;
    }

    state.tree.reset();

    let mut j = num_edges as isize - 1;
    let mut k = num_edges as isize - 1;
    let mut pos = num_sites as f64;

    while pos > start as f64 {
        while k >= 0 && tree_seq.edge(il[k as usize]).left == pos {
            let e = *tree_seq.edge(il[k as usize]);
            state.tree.remove_edge(e.parent, e.child);
            k -= 1;
        }
        while j >= 0 && tree_seq.edge(ir[j as usize]).right == pos {
            let e = *tree_seq.edge(ir[j as usize]);
            state.tree.insert_edge(e.parent, e.child);
            j -= 1;
        }

        let right = pos;
        let mut left = 0.0f64;
        if k >= 0 {
            left = left.max(tree_seq.edge(il[k as usize]).left);
        }
        if j >= 0 {
            left = left.max(tree_seq.edge(ir[j as usize]).right);
        }
        pos = left;
        if left >= right {
            return Err(AncestorMatcherError::InternalInvariant(format!(
                "run_traceback: backward tree step produced an empty interval [{left}, {right})"
            )));
        }

        let lo = left.max(start as f64) as u32;
        let hi = right.min(end as f64) as u32;
        for site in (lo..hi).rev() {
            let current = output_edges.last().copied().expect("output_edges is never empty");
            let mut u = current.parent as i32;
            if let Some(mutation_node) = tree_seq.first_mutation_at(site) {
                if state.tree.is_descendant(u as u32, mutation_node as i32) {
                    matched_haplotype[site as usize] = 1;
                }
            }
            for &(node, recombine) in &state.traceback[site as usize] {
                required[node as usize] = i8::from(recombine);
            }

            let mut walker = u;
            while walker != 0 && required[walker as usize] == -1 {
                walker = state.tree.parent[walker as usize];
            }
            u = walker;

            if required[u as usize] == 1 && site > start {
                let last = output_edges.last_mut().expect("output_edges is never empty");
                last.left = site as f64;
                let next_parent = state.argmax_node[site as usize - 1];
                output_edges.push(OpenEdge { left: 0.0, right: site as f64, parent: next_parent as u32 });
            }

            for &(node, _) in &state.traceback[site as usize] {
                required[node as usize] = -1;
            }
        }
    }
    output_edges.last_mut().expect("output_edges is never empty").left = start as f64;

    let mut lefts = Vec::with_capacity(output_edges.len());
    let mut rights = Vec::with_capacity(output_edges.len());
    let mut parents = Vec::with_capacity(output_edges.len());
    for e in &output_edges {
        if e.left < start as f64 || e.right > end as f64 || e.left >= e.right {
            return Err(AncestorMatcherError::InternalInvariant(format!(
                "run_traceback produced a malformed edge [{}, {}) outside [{start}, {end})",
                e.left, e.right
            )));
        }
        lefts.push(e.left);
        rights.push(e.right);
        parents.push(e.parent);
    }

    Ok(MatchResult { lefts, rights, parents, matched_haplotype })
}
