/// Sentinel for "no such node" in the sparse-tree arrays below.
pub const NULL_NODE: i32 = -1;

/// A sparse local-tree representation maintained incrementally as the matcher
/// steps across genomic intervals: parent, first child, and sibling links per
/// node. Rebuilt (forward) or reset-and-rebuilt (backward, for traceback) from
/// the tree-sequence's `Il`/`Ir` indexes.
#[derive(Debug)]
pub struct SparseTree {
    pub parent: Vec<i32>,
    pub left_child: Vec<i32>,
    pub right_child: Vec<i32>,
    pub left_sib: Vec<i32>,
    pub right_sib: Vec<i32>,
}

impl SparseTree {
    #[must_use]
    pub fn new(num_nodes: usize) -> Self {
        Self {
            parent: vec![NULL_NODE; num_nodes],
            left_child: vec![NULL_NODE; num_nodes],
            right_child: vec![NULL_NODE; num_nodes],
            left_sib: vec![NULL_NODE; num_nodes],
            right_sib: vec![NULL_NODE; num_nodes],
        }
    }

    pub fn reset(&mut self) {
        self.parent.fill(NULL_NODE);
        self.left_child.fill(NULL_NODE);
        self.right_child.fill(NULL_NODE);
        self.left_sib.fill(NULL_NODE);
        self.right_sib.fill(NULL_NODE);
    }

    pub fn remove_edge(&mut self, parent: u32, child: u32) {
        let (p, c) = (parent as usize, child as usize);
        let lsib = self.left_sib[c];
        let rsib = self.right_sib[c];
        if lsib == NULL_NODE {
            self.left_child[p] = rsib;
        } else {
            self.right_sib[lsib as usize] = rsib;
        }
        if rsib == NULL_NODE {
            self.right_child[p] = lsib;
        } else {
            self.left_sib[rsib as usize] = lsib;
        }
        self.parent[c] = NULL_NODE;
        self.left_sib[c] = NULL_NODE;
        self.right_sib[c] = NULL_NODE;
    }

    pub fn insert_edge(&mut self, parent: u32, child: u32) {
        let (p, c) = (parent as usize, child as usize);
        self.parent[c] = parent as i32;
        let u = self.right_child[p];
        if u == NULL_NODE {
            self.left_child[p] = child as i32;
            self.left_sib[c] = NULL_NODE;
        } else {
            self.right_sib[u as usize] = child as i32;
            self.left_sib[c] = u;
        }
        self.right_sib[c] = NULL_NODE;
        self.right_child[p] = child as i32;
    }

    #[must_use]
    pub fn is_nonzero_root(&self, u: u32) -> bool {
        u != 0 && self.parent[u as usize] == NULL_NODE && self.left_child[u as usize] == NULL_NODE
    }

    /// Is `v` on the path from `u` to the root (or `u == v`)?
    #[must_use]
    pub fn is_descendant(&self, u: u32, v: i32) -> bool {
        if v == NULL_NODE {
            return false;
        }
        let mut w = u as i32;
        while w != v && w != NULL_NODE {
            w = self.parent[w as usize];
        }
        w == v
    }
}
