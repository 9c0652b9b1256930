/// The five-value likelihood lattice the copying HMM tracks per node.
///
/// Declared ascending so derived [`Ord`] gives `Match > Recomb > Mismatch >
/// Compressed > Missing`, matching the comparisons the matcher makes when
/// picking an arg-max node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Likelihood {
    /// Node is outside the current local tree.
    Missing,
    /// Node is in the tree but its value is inherited from its nearest
    /// non-compressed ancestor; not tracked explicitly to save space.
    Compressed,
    Mismatch,
    Recomb,
    Match,
}
