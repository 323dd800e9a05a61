//! Tree node holding one cluster of samples

/// Index of a centroid inside its tree's arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

impl NodeId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Red-black node color
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

/// A centroid: the running mean and total weight of one cluster of samples.
///
/// Besides its own statistics every node carries `subtree_weight`, the sum of
/// `weight` over itself and all of its descendants. That aggregate is what
/// lets the tree answer rank queries in O(height).
///
/// `parent` is a navigation link only; nodes are owned by the tree's arena.
#[derive(Clone, Debug)]
pub(crate) struct Centroid {
    pub(crate) mean: f64,
    pub(crate) weight: f64,
    pub(crate) subtree_weight: f64,
    pub(crate) color: Color,
    pub(crate) parent: Option<NodeId>,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
}

impl Centroid {
    /// Create a detached red node whose subtree is just itself
    pub(crate) fn new(mean: f64, weight: f64) -> Self {
        Self {
            mean,
            weight,
            subtree_weight: weight,
            color: Color::Red,
            parent: None,
            left: None,
            right: None,
        }
    }

    /// Blend `delta` weight of `value` into the running mean.
    ///
    /// Only the node's own statistics change; ancestors' aggregates are the
    /// caller's concern.
    #[inline]
    pub(crate) fn absorb(&mut self, delta: f64, value: f64) {
        self.mean += delta * (value - self.mean) / (self.weight + delta);
        self.weight += delta;
    }

    #[inline]
    pub(crate) fn is_red(&self) -> bool {
        self.color == Color::Red
    }
}
