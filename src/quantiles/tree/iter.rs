//! Non-recursive in-order traversal

use super::{Centroid, CentroidTree, NodeId};
use crate::math;
use core::iter::FusedIterator;

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// In-order iterator over a [`CentroidTree`].
///
/// Starts at the minimum node. Nodes whose left subtree is being walked are
/// remembered in `hints`, which is sized from the red-black height bound
/// `2 * log2(n + 1)`; ancestors above the starting point are reached through
/// parent links instead.
#[derive(Debug, Clone)]
pub(crate) struct Iter<'a> {
    tree: &'a CentroidTree,
    next: Option<NodeId>,
    hints: Vec<NodeId>,
    remaining: usize,
}

impl<'a> Iter<'a> {
    pub(super) fn new(tree: &'a CentroidTree) -> Self {
        let height = 2 * math::floor_log2(tree.len() + 1) as usize;
        Self {
            tree,
            next: tree.min(),
            hints: Vec::with_capacity(height),
            remaining: tree.len(),
        }
    }

    fn advance(&mut self, from: NodeId) -> Option<NodeId> {
        let tree = self.tree;

        if tree.max() == Some(from) {
            return None;
        }

        if let Some(mut node) = tree[from].right {
            while let Some(left) = tree[node].left {
                self.hints.push(node);
                node = left;
            }
            return Some(node);
        }

        if let Some(hint) = self.hints.pop() {
            return Some(hint);
        }

        let mut node = from;
        while let Some(parent) = tree[node].parent {
            if tree[parent].left == Some(node) {
                return Some(parent);
            }
            node = parent;
        }
        None
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Centroid;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.advance(current);
        self.remaining -= 1;
        let tree = self.tree;
        Some(&tree[current])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}
