//! Weight-augmented red-black tree of centroids
//!
//! Nodes live in an arena (`Vec<Centroid>`) and refer to each other by
//! [`NodeId`]. Every node keeps the total weight of its subtree, so both
//! "which centroid holds rank `w`" and "how much weight sits left of this
//! centroid" are answered by walking a single root-to-leaf path.
//!
//! Nodes are never removed one at a time: compression and merging build a
//! brand new tree through [`SortedBuilder`], so the arena has no free list.

mod builder;
mod centroid;
mod iter;

pub(crate) use builder::SortedBuilder;
pub(crate) use centroid::{Centroid, Color, NodeId};
pub(crate) use iter::Iter;

use core::ops::{Index, IndexMut};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Outcome of [`CentroidTree::get_or_closest`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lookup {
    /// A centroid with exactly the requested mean
    Exact(NodeId),
    /// The tightest neighbours around a mean that is not stored
    Between {
        /// Largest mean strictly less than the probe
        below: Option<NodeId>,
        /// Smallest mean strictly greater than the probe
        above: Option<NodeId>,
    },
}

/// Red-black tree of centroids keyed by mean
#[derive(Debug, Default)]
pub(crate) struct CentroidTree {
    nodes: Vec<Centroid>,
    root: Option<NodeId>,
    min: Option<NodeId>,
    max: Option<NodeId>,
}

impl CentroidTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Assemble a tree from an arena whose links are already consistent
    pub(super) fn from_raw(
        nodes: Vec<Centroid>,
        root: Option<NodeId>,
        min: Option<NodeId>,
        max: Option<NodeId>,
    ) -> Self {
        Self {
            nodes,
            root,
            min,
            max,
        }
    }

    /// Number of centroids
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[inline]
    pub(crate) fn min(&self) -> Option<NodeId> {
        self.min
    }

    #[inline]
    pub(crate) fn max(&self) -> Option<NodeId> {
        self.max
    }

    /// Sum of every centroid's weight
    #[inline]
    pub(crate) fn total_weight(&self) -> f64 {
        self.subtree_weight(self.root)
    }

    #[inline]
    fn subtree_weight(&self, node: Option<NodeId>) -> f64 {
        node.map_or(0.0, |id| self[id].subtree_weight)
    }

    #[inline]
    fn is_red(&self, node: Option<NodeId>) -> bool {
        node.is_some_and(|id| self[id].is_red())
    }

    /// Add `weight` at `mean`.
    ///
    /// An exact mean match on the search path absorbs the weight in place;
    /// otherwise a red leaf is attached and the tree rebalanced.
    pub(crate) fn add(&mut self, mean: f64, weight: f64) -> NodeId {
        let mut parent = None;
        let mut cursor = self.root;

        while let Some(id) = cursor {
            let node = &mut self[id];
            node.subtree_weight += weight;
            if mean == node.mean {
                node.weight += weight;
                return id;
            }
            parent = Some(id);
            cursor = if mean < node.mean { node.left } else { node.right };
        }

        let id = NodeId::new(self.nodes.len());
        let mut leaf = Centroid::new(mean, weight);
        leaf.parent = parent;
        self.nodes.push(leaf);

        match parent {
            None => {
                self.root = Some(id);
                self.min = Some(id);
                self.max = Some(id);
            }
            Some(p) if mean < self[p].mean => {
                self[p].left = Some(id);
                if self.min == Some(p) {
                    self.min = Some(id);
                }
            }
            Some(p) => {
                self[p].right = Some(id);
                if self.max == Some(p) {
                    self.max = Some(id);
                }
            }
        }

        self.fix_after_insert(id);
        id
    }

    /// Blend `delta` weight of `value` into `id` and carry the extra weight
    /// up to the root.
    pub(crate) fn update(&mut self, id: NodeId, delta: f64, value: f64) {
        self[id].absorb(delta, value);

        let mut cursor = Some(id);
        while let Some(node) = cursor {
            self[node].subtree_weight += delta;
            cursor = self[node].parent;
        }
    }

    /// Total weight of every centroid with a smaller mean than `id`
    pub(crate) fn sum_of_left(&self, id: NodeId) -> f64 {
        let mut sum = self.subtree_weight(self[id].left);
        let mut node = id;

        while let Some(parent) = self[node].parent {
            if self[parent].right == Some(node) {
                sum += self[parent].subtree_weight - self[node].subtree_weight;
            }
            node = parent;
        }

        sum
    }

    /// Exact match for `mean`, or the nearest centroid on either side
    pub(crate) fn get_or_closest(&self, mean: f64) -> Lookup {
        let mut below = None;
        let mut above = None;
        let mut cursor = self.root;

        while let Some(id) = cursor {
            let node = &self[id];
            if node.mean == mean {
                return Lookup::Exact(id);
            }
            if node.mean < mean {
                below = Some(id);
                cursor = node.right;
            } else {
                above = Some(id);
                cursor = node.left;
            }
        }

        Lookup::Between { below, above }
    }

    /// Centroid whose rank range contains `target`, with its rank midpoint.
    ///
    /// Targets at or below zero resolve to the minimum centroid and targets
    /// at or past the total weight to the maximum one.
    pub(crate) fn find_by_weight(&self, target: f64) -> Option<(NodeId, f64)> {
        let mut node = self.root?;
        let min = self.min?;
        let max = self.max?;

        if target <= 0.0 {
            return Some((min, self[min].weight / 2.0));
        }

        let total = self[node].subtree_weight;
        if total <= target {
            return Some((max, total - self[max].weight / 2.0));
        }

        let mut before = 0.0;
        loop {
            let current = &self[node];
            let left_weight = before + self.subtree_weight(current.left);

            if left_weight > target {
                if let Some(left) = current.left {
                    node = left;
                    continue;
                }
            } else if left_weight + current.weight < target {
                if let Some(right) = current.right {
                    before = left_weight + current.weight;
                    node = right;
                    continue;
                }
            }

            return Some((node, left_weight + current.weight / 2.0));
        }
    }

    /// In-order predecessor, `None` at the minimum
    pub(crate) fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        if self.min == Some(id) {
            return None;
        }

        if let Some(mut node) = self[id].left {
            while let Some(right) = self[node].right {
                node = right;
            }
            return Some(node);
        }

        let mut node = id;
        while let Some(parent) = self[node].parent {
            if self[parent].right == Some(node) {
                return Some(parent);
            }
            node = parent;
        }
        None
    }

    /// In-order successor, `None` at the maximum
    pub(crate) fn successor(&self, id: NodeId) -> Option<NodeId> {
        if self.max == Some(id) {
            return None;
        }

        if let Some(mut node) = self[id].right {
            while let Some(left) = self[node].left {
                node = left;
            }
            return Some(node);
        }

        let mut node = id;
        while let Some(parent) = self[node].parent {
            if self[parent].left == Some(node) {
                return Some(parent);
            }
            node = parent;
        }
        None
    }

    /// Lazy in-order traversal; every call starts over from the minimum
    pub(crate) fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Apply `f` to every mean. Weights are left alone.
    ///
    /// `f` must be strictly increasing or the ordering invariant breaks.
    pub(crate) fn map_means(&mut self, f: impl Fn(f64) -> f64) {
        for node in &mut self.nodes {
            node.mean = f(node.mean);
        }
    }

    /// Deep-copy the subtree under `id` into `out`, returning the new
    /// subtree root and its leftmost and rightmost nodes.
    fn clone_subtree(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        out: &mut Vec<Centroid>,
    ) -> (NodeId, NodeId, NodeId) {
        let src = &self[id];
        let copy = NodeId::new(out.len());
        out.push(Centroid {
            parent,
            left: None,
            right: None,
            ..src.clone()
        });

        let mut min = copy;
        let mut max = copy;

        if let Some(left) = src.left {
            let (child, lo, _) = self.clone_subtree(left, Some(copy), out);
            out[copy.index()].left = Some(child);
            min = lo;
        }
        if let Some(right) = src.right {
            let (child, _, hi) = self.clone_subtree(right, Some(copy), out);
            out[copy.index()].right = Some(child);
            max = hi;
        }

        (copy, min, max)
    }

    fn rotate_left(&mut self, x: NodeId) {
        let Some(y) = self[x].right else {
            return;
        };

        let y_left = self[y].left;
        let total = self[x].subtree_weight;
        self[x].subtree_weight =
            self[x].weight + self.subtree_weight(self[x].left) + self.subtree_weight(y_left);
        self[y].subtree_weight = total;

        self[x].right = y_left;
        if let Some(child) = y_left {
            self[child].parent = Some(x);
        }

        let x_parent = self[x].parent;
        self[y].parent = x_parent;
        match x_parent {
            None => self.root = Some(y),
            Some(p) if self[p].left == Some(x) => self[p].left = Some(y),
            Some(p) => self[p].right = Some(y),
        }

        self[y].left = Some(x);
        self[x].parent = Some(y);
    }

    fn rotate_right(&mut self, x: NodeId) {
        let Some(y) = self[x].left else {
            return;
        };

        let y_right = self[y].right;
        let total = self[x].subtree_weight;
        self[x].subtree_weight =
            self[x].weight + self.subtree_weight(self[x].right) + self.subtree_weight(y_right);
        self[y].subtree_weight = total;

        self[x].left = y_right;
        if let Some(child) = y_right {
            self[child].parent = Some(x);
        }

        let x_parent = self[x].parent;
        self[y].parent = x_parent;
        match x_parent {
            None => self.root = Some(y),
            Some(p) if self[p].right == Some(x) => self[p].right = Some(y),
            Some(p) => self[p].left = Some(y),
        }

        self[y].right = Some(x);
        self[x].parent = Some(y);
    }

    fn fix_after_insert(&mut self, mut node: NodeId) {
        while let Some(parent) = self[node].parent.filter(|&p| self[p].is_red()) {
            // a red node is never the root, so the grandparent exists
            let Some(grand) = self[parent].parent else {
                break;
            };

            if self[grand].left == Some(parent) {
                let uncle = self[grand].right;
                if self.is_red(uncle) {
                    self.recolor_split(parent, uncle, grand);
                    node = grand;
                    continue;
                }

                if self[parent].right == Some(node) {
                    node = parent;
                    self.rotate_left(node);
                }
                if let Some(parent) = self[node].parent {
                    self[parent].color = Color::Black;
                }
                self[grand].color = Color::Red;
                self.rotate_right(grand);
            } else {
                let uncle = self[grand].left;
                if self.is_red(uncle) {
                    self.recolor_split(parent, uncle, grand);
                    node = grand;
                    continue;
                }

                if self[parent].left == Some(node) {
                    node = parent;
                    self.rotate_right(node);
                }
                if let Some(parent) = self[node].parent {
                    self[parent].color = Color::Black;
                }
                self[grand].color = Color::Red;
                self.rotate_left(grand);
            }
        }

        if let Some(root) = self.root {
            self[root].color = Color::Black;
        }
    }

    /// Push a red uncle/parent pair's redness up to the grandparent
    fn recolor_split(&mut self, parent: NodeId, uncle: Option<NodeId>, grand: NodeId) {
        self[parent].color = Color::Black;
        if let Some(uncle) = uncle {
            self[uncle].color = Color::Black;
        }
        self[grand].color = Color::Red;
    }
}

impl Clone for CentroidTree {
    fn clone(&self) -> Self {
        let Some(root) = self.root else {
            return Self::new();
        };

        let mut nodes = Vec::with_capacity(self.nodes.len());
        let (root, min, max) = self.clone_subtree(root, None, &mut nodes);
        Self::from_raw(nodes, Some(root), Some(min), Some(max))
    }
}

impl Index<NodeId> for CentroidTree {
    type Output = Centroid;

    #[inline]
    fn index(&self, id: NodeId) -> &Centroid {
        &self.nodes[id.index()]
    }
}

impl IndexMut<NodeId> for CentroidTree {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut Centroid {
        &mut self.nodes[id.index()]
    }
}

#[cfg(test)]
impl CentroidTree {
    /// Panic unless every structural invariant holds
    pub(crate) fn assert_valid(&self) {
        let Some(root) = self.root else {
            assert!(self.nodes.is_empty(), "rootless tree holds nodes");
            assert!(self.min.is_none() && self.max.is_none());
            return;
        };

        assert_eq!(self[root].color, Color::Black, "root must be black");
        assert!(self[root].parent.is_none(), "root must have no parent");

        let (reachable, _) = self.check_subtree(root);
        assert_eq!(reachable, self.nodes.len(), "unreachable nodes in arena");

        let means: Vec<f64> = self.iter().map(|c| c.mean).collect();
        assert_eq!(means.len(), self.nodes.len(), "iteration skipped nodes");
        for pair in means.windows(2) {
            assert!(pair[0] < pair[1], "means not strictly increasing: {:?}", pair);
        }

        let mut leftmost = root;
        while let Some(left) = self[leftmost].left {
            leftmost = left;
        }
        let mut rightmost = root;
        while let Some(right) = self[rightmost].right {
            rightmost = right;
        }
        assert_eq!(self.min, Some(leftmost), "min pointer is stale");
        assert_eq!(self.max, Some(rightmost), "max pointer is stale");
    }

    /// Returns (node count, black height) of the subtree
    fn check_subtree(&self, id: NodeId) -> (usize, usize) {
        let node = &self[id];
        let mut count = 1;
        let mut heights = [1usize, 1usize];
        let mut weight = node.weight;

        for (slot, child) in [node.left, node.right].into_iter().enumerate() {
            let Some(child) = child else {
                continue;
            };
            assert_eq!(self[child].parent, Some(id), "parent link mismatch");
            if node.is_red() {
                assert!(!self[child].is_red(), "red node with red child");
            }
            let (n, h) = self.check_subtree(child);
            count += n;
            heights[slot] = h;
            weight += self[child].subtree_weight;
        }

        if let Some(left) = node.left {
            assert!(self[left].mean < node.mean, "left child out of order");
        }
        if let Some(right) = node.right {
            assert!(self[right].mean > node.mean, "right child out of order");
        }

        let tolerance = 1e-9 * weight.abs().max(1.0);
        assert!(
            (node.subtree_weight - weight).abs() <= tolerance,
            "subtree weight {} != {}",
            node.subtree_weight,
            weight
        );
        assert_eq!(heights[0], heights[1], "unequal black height");

        (count, heights[0] + usize::from(!node.is_red()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(means: &[f64]) -> CentroidTree {
        let mut tree = CentroidTree::new();
        for &m in means {
            tree.add(m, 1.0);
        }
        tree
    }

    fn means(tree: &CentroidTree) -> Vec<f64> {
        tree.iter().map(|c| c.mean).collect()
    }

    #[test]
    fn test_empty() {
        let tree = CentroidTree::new();
        tree.assert_valid();
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.total_weight(), 0.0);
        assert!(tree.find_by_weight(1.0).is_none());
        assert_eq!(tree.iter().count(), 0);
        assert_eq!(
            tree.get_or_closest(1.0),
            Lookup::Between {
                below: None,
                above: None
            }
        );
    }

    #[test]
    fn test_ascending_insert_stays_balanced() {
        let values: Vec<f64> = (0..1000).map(f64::from).collect();
        let tree = tree_of(&values);
        tree.assert_valid();
        assert_eq!(tree.len(), 1000);
        assert_eq!(means(&tree), values);
    }

    #[test]
    fn test_descending_and_interleaved_insert() {
        let mut values: Vec<f64> = (0..500).rev().map(f64::from).collect();
        values.extend((0..500).map(|i| f64::from(i) + 0.5));
        let tree = tree_of(&values);
        tree.assert_valid();
        assert_eq!(tree.len(), 1000);
        assert_eq!(tree.total_weight(), 1000.0);
    }

    #[test]
    fn test_exact_match_merges_weight() {
        let mut tree = tree_of(&[1.0, 2.0, 3.0]);
        let id = tree.add(2.0, 4.0);
        tree.assert_valid();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree[id].weight, 5.0);
        assert_eq!(tree.total_weight(), 7.0);
    }

    #[test]
    fn test_min_max_tracking() {
        let tree = tree_of(&[5.0, 3.0, 8.0, 1.0, 9.0, 4.0]);
        assert_eq!(tree.min().map(|id| tree[id].mean), Some(1.0));
        assert_eq!(tree.max().map(|id| tree[id].mean), Some(9.0));
    }

    #[test]
    fn test_get_or_closest() {
        let tree = tree_of(&[10.0, 20.0, 30.0, 40.0]);

        match tree.get_or_closest(30.0) {
            Lookup::Exact(id) => assert_eq!(tree[id].mean, 30.0),
            other => panic!("expected exact match, got {:?}", other),
        }

        match tree.get_or_closest(25.0) {
            Lookup::Between { below, above } => {
                assert_eq!(below.map(|id| tree[id].mean), Some(20.0));
                assert_eq!(above.map(|id| tree[id].mean), Some(30.0));
            }
            other => panic!("expected bracket, got {:?}", other),
        }

        match tree.get_or_closest(5.0) {
            Lookup::Between { below, above } => {
                assert!(below.is_none());
                assert_eq!(above.map(|id| tree[id].mean), Some(10.0));
            }
            other => panic!("expected bracket, got {:?}", other),
        }

        match tree.get_or_closest(45.0) {
            Lookup::Between { below, above } => {
                assert_eq!(below.map(|id| tree[id].mean), Some(40.0));
                assert!(above.is_none());
            }
            other => panic!("expected bracket, got {:?}", other),
        }
    }

    #[test]
    fn test_sum_of_left_matches_prefix_sums() {
        let mut tree = CentroidTree::new();
        for i in 0..200 {
            // scramble insertion order, weight = i + 1
            let key = (i * 37) % 200;
            tree.add(f64::from(key), f64::from(key + 1));
        }
        tree.assert_valid();

        let mut prefix = 0.0;
        let mut cursor = tree.min();
        while let Some(id) = cursor {
            assert_eq!(tree.sum_of_left(id), prefix, "mean {}", tree[id].mean);
            prefix += tree[id].weight;
            cursor = tree.successor(id);
        }
        assert_eq!(prefix, tree.total_weight());
    }

    #[test]
    fn test_find_by_weight() {
        // weights 1, 2, 3, 4 -> ranks [0,1) [1,3) [3,6) [6,10)
        let mut tree = CentroidTree::new();
        for (mean, weight) in [(1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0)] {
            tree.add(mean, weight);
        }

        let (id, point) = tree.find_by_weight(0.0).unwrap();
        assert_eq!((tree[id].mean, point), (1.0, 0.5));

        let (id, point) = tree.find_by_weight(-3.0).unwrap();
        assert_eq!((tree[id].mean, point), (1.0, 0.5));

        let (id, point) = tree.find_by_weight(2.0).unwrap();
        assert_eq!((tree[id].mean, point), (2.0, 2.0));

        let (id, point) = tree.find_by_weight(5.5).unwrap();
        assert_eq!((tree[id].mean, point), (3.0, 4.5));

        let (id, point) = tree.find_by_weight(7.0).unwrap();
        assert_eq!((tree[id].mean, point), (4.0, 8.0));

        let (id, point) = tree.find_by_weight(10.0).unwrap();
        assert_eq!((tree[id].mean, point), (4.0, 8.0));
    }

    #[test]
    fn test_predecessor_successor() {
        let tree = tree_of(&[4.0, 2.0, 6.0, 1.0, 3.0, 5.0, 7.0]);
        let ids: Vec<NodeId> = {
            let mut out = Vec::new();
            let mut cursor = tree.min();
            while let Some(id) = cursor {
                out.push(id);
                cursor = tree.successor(id);
            }
            out
        };
        let walked: Vec<f64> = ids.iter().map(|&id| tree[id].mean).collect();
        assert_eq!(walked, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);

        let mut back = Vec::new();
        let mut cursor = tree.max();
        while let Some(id) = cursor {
            back.push(tree[id].mean);
            cursor = tree.predecessor(id);
        }
        back.reverse();
        assert_eq!(back, walked);
    }

    #[test]
    fn test_update_propagates_to_root() {
        let mut tree = tree_of(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let Lookup::Exact(id) = tree.get_or_closest(5.0) else {
            panic!("5.0 should be stored");
        };
        tree.update(id, 3.0, 5.0);
        tree.assert_valid();
        assert_eq!(tree[id].weight, 4.0);
        assert_eq!(tree.total_weight(), 8.0);

        let Lookup::Exact(id) = tree.get_or_closest(1.0) else {
            panic!("1.0 should be stored");
        };
        tree.update(id, 1.0, 1.5);
        tree.assert_valid();
        assert_eq!(tree[id].mean, 1.25);
        assert_eq!(tree.total_weight(), 9.0);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut tree = tree_of(&[3.0, 1.0, 4.0, 1.5, 9.0, 2.6]);
        let copy = tree.clone();
        copy.assert_valid();
        assert_eq!(means(&copy), means(&tree));

        tree.add(100.0, 1.0);
        tree.map_means(|m| m * 2.0);
        assert_eq!(copy.len(), 6);
        assert_eq!(means(&copy), vec![1.0, 1.5, 2.6, 3.0, 4.0, 9.0]);
    }

    #[test]
    fn test_map_means_keeps_weights() {
        let mut tree = tree_of(&[1.0, 2.0, 3.0]);
        tree.map_means(|m| m + 10.0);
        tree.assert_valid();
        assert_eq!(means(&tree), vec![11.0, 12.0, 13.0]);
        assert_eq!(tree.total_weight(), 3.0);
    }
}
