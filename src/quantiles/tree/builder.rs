//! Linear-time construction of a red-black tree from sorted centroids

use super::{Centroid, CentroidTree, Color, NodeId};
use crate::math;

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Collects centroids in ascending mean order and turns them into a valid
/// red-black tree in O(n) without a single rotation.
///
/// For `n` nodes the black height is `floor(log2(n + 1))`; a perfect black
/// skeleton of that height holds `2^bh - 1` nodes and the remaining
/// `n - 2^bh + 1` are placed as red children in the lowest black level,
/// filled from the left.
#[derive(Debug, Default)]
pub(crate) struct SortedBuilder {
    nodes: Vec<Centroid>,
}

impl SortedBuilder {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Append a centroid; means must arrive strictly ascending
    pub(crate) fn push(&mut self, mean: f64, weight: f64) {
        debug_assert!(
            self.nodes.last().map_or(true, |last| last.mean < mean),
            "sorted builder fed out of order"
        );
        self.nodes.push(Centroid::new(mean, weight));
    }

    /// Most recently pushed centroid, for blending more weight into it
    #[inline]
    pub(crate) fn last_mut(&mut self) -> Option<&mut Centroid> {
        self.nodes.last_mut()
    }

    pub(crate) fn build(self) -> CentroidTree {
        let mut nodes = self.nodes;
        let count = nodes.len();
        if count == 0 {
            return CentroidTree::new();
        }

        for node in &mut nodes {
            node.subtree_weight = node.weight;
            node.color = Color::Red;
        }

        let black_height = math::floor_log2(count + 1);
        let max_red = 1usize << black_height;
        let red = count + 1 - max_red;

        let mut next = 0;
        let root = place(&mut nodes, &mut next, black_height, max_red, red);
        debug_assert_eq!(next, count);

        CentroidTree::from_raw(
            nodes,
            Some(root),
            Some(NodeId::new(0)),
            Some(NodeId::new(count - 1)),
        )
    }
}

/// Build the subtree holding the next nodes in `nodes[*next..]` with the
/// given black height, placing `red` red nodes. Returns its (black) root.
fn place(
    nodes: &mut [Centroid],
    next: &mut usize,
    black_height: u32,
    max_red: usize,
    mut red: usize,
) -> NodeId {
    let top = if black_height == 1 {
        let mut top = take(next);
        if red > 0 {
            let parent = take(next);
            link_left(nodes, parent, top);
            top = parent;
            red -= 1;
        }
        if red > 0 {
            let right = take(next);
            link_right(nodes, top, right);
        }
        top
    } else {
        let max_red = max_red >> 1;
        let left_red = red.min(max_red);
        let left = place(nodes, next, black_height - 1, max_red, left_red);
        let top = take(next);
        link_left(nodes, top, left);
        let right = place(nodes, next, black_height - 1, max_red, red - left_red);
        link_right(nodes, top, right);
        top
    };

    nodes[top.index()].color = Color::Black;
    top
}

#[inline]
fn take(next: &mut usize) -> NodeId {
    let id = NodeId::new(*next);
    *next += 1;
    id
}

fn link_left(nodes: &mut [Centroid], parent: NodeId, child: NodeId) {
    nodes[child.index()].parent = Some(parent);
    nodes[parent.index()].left = Some(child);
    nodes[parent.index()].subtree_weight += nodes[child.index()].subtree_weight;
}

fn link_right(nodes: &mut [Centroid], parent: NodeId, child: NodeId) {
    nodes[child.index()].parent = Some(parent);
    nodes[parent.index()].right = Some(child);
    nodes[parent.index()].subtree_weight += nodes[child.index()].subtree_weight;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(n: u32) -> CentroidTree {
        let mut builder = SortedBuilder::with_capacity(n as usize);
        for i in 0..n {
            builder.push(f64::from(i), f64::from(i % 7 + 1));
        }
        builder.build()
    }

    #[test]
    fn test_empty_build() {
        let tree = SortedBuilder::default().build();
        tree.assert_valid();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_every_size_is_valid() {
        for n in 1..=300 {
            let tree = build(n);
            tree.assert_valid();
            assert_eq!(tree.len(), n as usize);

            let expected: f64 = (0..n).map(|i| f64::from(i % 7 + 1)).sum();
            assert_eq!(tree.total_weight(), expected, "n={}", n);
        }
    }

    #[test]
    fn test_red_count() {
        for n in 1..=300usize {
            let tree = build(n as u32);
            let reds = tree.iter().filter(|c| c.is_red()).count();
            let black_height = math::floor_log2(n + 1);
            assert_eq!(reds, n + 1 - (1 << black_height), "n={}", n);
        }
    }

    #[test]
    fn test_boundaries() {
        let tree = build(10);
        assert_eq!(tree.min().map(|id| tree[id].mean), Some(0.0));
        assert_eq!(tree.max().map(|id| tree[id].mean), Some(9.0));
    }

    #[test]
    fn test_last_mut_blend_is_reflected() {
        let mut builder = SortedBuilder::default();
        builder.push(1.0, 1.0);
        builder.push(2.0, 1.0);
        if let Some(last) = builder.last_mut() {
            last.absorb(1.0, 4.0);
        }
        assert_eq!(builder.len(), 2);

        let tree = builder.build();
        tree.assert_valid();
        assert_eq!(tree.total_weight(), 3.0);
        let items: Vec<(f64, f64)> = tree.iter().map(|c| (c.mean, c.weight)).collect();
        assert_eq!(items, vec![(1.0, 1.0), (3.0, 2.0)]);
    }

    #[test]
    fn test_built_tree_accepts_inserts() {
        let mut tree = build(50);
        for i in 0..50 {
            tree.add(f64::from(i) + 0.5, 1.0);
        }
        tree.assert_valid();
        assert_eq!(tree.len(), 100);
    }
}
