//! Broadphase collision detection using a dynamic AABB tree.
//!
//! Leaves store enlarged ("fat") boxes so that small movements do not touch
//! the tree. Internal nodes always hold the union of their children and the
//! tree is kept height-balanced with rotations after every insert and removal.

use glam::Vec2;
use tracing::debug;

use super::collider::{Aabb, Line};

/// Total enlargement per axis applied to leaf boxes.
pub const AABB_MARGIN: f32 = 10.0;

/// Depth of the explicit traversal stack.
const QUERY_STACK_SIZE: usize = 256;

/// Index of a node in the tree's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn to_raw(self) -> u32 {
        self.0
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone)]
pub struct TreeNode<T> {
    /// Fat box for leaves, union of the children for internal nodes.
    pub aabb: Aabb,
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    /// Leaves have height 0.
    pub height: u32,
    pub payload: Option<T>,
    next_free: Option<NodeId>,
}

impl<T> TreeNode<T> {
    fn vacant(next_free: Option<NodeId>) -> Self {
        Self {
            aabb: Aabb::default(),
            parent: None,
            left: None,
            right: None,
            height: 0,
            payload: None,
            next_free,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.right.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

enum Visit {
    Descend,
    Skip,
    Stop,
}

/// Incrementally updated bounding volume hierarchy over payloads of type `T`.
#[derive(Debug, Clone)]
pub struct DynamicTree<T> {
    nodes: Vec<TreeNode<T>>,
    root: Option<NodeId>,
    free_list: Option<NodeId>,
    leaf_count: usize,
}

impl<T: Copy> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> DynamicTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            free_list: None,
            leaf_count: 0,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Height of the whole tree; 0 for an empty tree or a single leaf.
    pub fn height(&self) -> u32 {
        self.root.map_or(0, |root| self.nodes[root.index()].height)
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Number of node slots in the pool, used or free.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Panics if `id` is outside the pool.
    pub fn node(&self, id: NodeId) -> &TreeNode<T> {
        &self.nodes[id.index()]
    }

    pub fn payload(&self, id: NodeId) -> Option<T> {
        self.nodes[id.index()].payload
    }

    pub fn fat_aabb(&self, id: NodeId) -> Aabb {
        self.nodes[id.index()].aabb
    }

    /// Insert a leaf for `aabb` and return its node.
    pub fn add_object(&mut self, aabb: Aabb, payload: T) -> NodeId {
        let id = self.allocate_node();
        {
            let node = &mut self.nodes[id.index()];
            node.aabb = aabb.extend(Vec2::splat(AABB_MARGIN));
            node.payload = Some(payload);
            node.height = 0;
        }
        self.insert_leaf(id);
        self.leaf_count += 1;
        id
    }

    /// Move a leaf to `aabb`.
    ///
    /// Returns `false` without touching the tree while the stored fat box still
    /// contains `aabb`; otherwise reinserts the leaf and returns `true`.
    pub fn update_object(&mut self, id: NodeId, aabb: Aabb) -> bool {
        debug_assert!(self.nodes[id.index()].is_leaf(), "update of internal node");
        if self.nodes[id.index()].aabb.contains(&aabb) {
            return false;
        }

        self.remove_leaf(id);
        self.nodes[id.index()].aabb = aabb.extend(Vec2::splat(AABB_MARGIN));
        self.insert_leaf(id);
        true
    }

    pub fn remove_object(&mut self, id: NodeId) {
        debug_assert!(self.nodes[id.index()].payload.is_some(), "removal of free node");
        self.remove_leaf(id);
        self.free_node(id);
        self.leaf_count -= 1;
    }

    /// Call `callback` for each leaf whose fat box overlaps `aabb`.
    ///
    /// Returning `false` from the callback ends the query.
    pub fn query(&self, aabb: &Aabb, mut callback: impl FnMut(T, &Aabb) -> bool) {
        self.traverse(|node| {
            if !node.aabb.intersects(aabb) {
                return Visit::Skip;
            }
            Self::visit_leaf(node, &mut callback)
        });
    }

    /// Call `callback` for each leaf whose fat box is crossed by `line`.
    pub fn query_line(&self, line: &Line, mut callback: impl FnMut(T, &Aabb) -> bool) {
        self.traverse(|node| {
            if !line.intersects_aabb(&node.aabb) {
                return Visit::Skip;
            }
            Self::visit_leaf(node, &mut callback)
        });
    }

    /// Visit every node reachable from the root, depth first.
    pub fn walk_tree(&self, mut callback: impl FnMut(&TreeNode<T>)) {
        self.traverse(|node| {
            callback(node);
            Visit::Descend
        });
    }

    fn visit_leaf(node: &TreeNode<T>, callback: &mut impl FnMut(T, &Aabb) -> bool) -> Visit {
        match node.payload {
            Some(payload) if node.is_leaf() => {
                if callback(payload, &node.aabb) {
                    Visit::Skip
                } else {
                    Visit::Stop
                }
            }
            _ => Visit::Descend,
        }
    }

    fn traverse(&self, mut visit: impl FnMut(&TreeNode<T>) -> Visit) {
        let Some(root) = self.root else {
            return;
        };

        let mut stack = [root; QUERY_STACK_SIZE];
        let mut top = 1;
        while top > 0 {
            top -= 1;
            let node = &self.nodes[stack[top].index()];
            match visit(node) {
                Visit::Stop => return,
                Visit::Skip => {}
                Visit::Descend => {
                    if let (Some(left), Some(right)) = (node.left, node.right) {
                        assert!(top + 2 <= QUERY_STACK_SIZE, "bvh traversal stack overflow");
                        stack[top] = left;
                        stack[top + 1] = right;
                        top += 2;
                    }
                }
            }
        }
    }

    fn insert_leaf(&mut self, leaf: NodeId) {
        let Some(root) = self.root else {
            self.root = Some(leaf);
            self.nodes[leaf.index()].parent = None;
            return;
        };

        let leaf_aabb = self.nodes[leaf.index()].aabb;

        // Find the cheapest sibling.
        let mut index = root;
        while let (Some(left), Some(right)) =
            (self.nodes[index.index()].left, self.nodes[index.index()].right)
        {
            let node_aabb = self.nodes[index.index()].aabb;
            let combined_area = node_aabb.union(&leaf_aabb).area();

            let new_parent_cost = 2.0 * combined_area;
            let push_down_cost = 2.0 * (combined_area - node_aabb.area());

            let cost_left = self.descend_cost(left, &leaf_aabb) + push_down_cost;
            let cost_right = self.descend_cost(right, &leaf_aabb) + push_down_cost;

            if new_parent_cost < cost_left && new_parent_cost < cost_right {
                break;
            }
            index = if cost_left < cost_right { left } else { right };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling.index()].parent;
        let new_parent = self.allocate_node();
        {
            let sibling_node = &self.nodes[sibling.index()];
            let aabb = leaf_aabb.union(&sibling_node.aabb);
            let height = sibling_node.height + 1;

            let node = &mut self.nodes[new_parent.index()];
            node.parent = old_parent;
            node.aabb = aabb;
            node.height = height;
            node.left = Some(sibling);
            node.right = Some(leaf);
        }
        self.replace_child(old_parent, sibling, new_parent);
        self.nodes[sibling.index()].parent = Some(new_parent);
        self.nodes[leaf.index()].parent = Some(new_parent);

        self.sync_hierarchy(Some(new_parent));
    }

    fn descend_cost(&self, child: NodeId, leaf_aabb: &Aabb) -> f32 {
        let node = &self.nodes[child.index()];
        let area = node.aabb.union(leaf_aabb).area();
        if node.is_leaf() {
            area
        } else {
            area - node.aabb.area()
        }
    }

    fn remove_leaf(&mut self, leaf: NodeId) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let Some(parent) = self.nodes[leaf.index()].parent else {
            debug_assert!(false, "detached leaf {leaf:?}");
            return;
        };
        let parent_node = &self.nodes[parent.index()];
        let grand_parent = parent_node.parent;
        let sibling = if parent_node.left == Some(leaf) {
            parent_node.right
        } else {
            parent_node.left
        };
        let Some(sibling) = sibling else {
            debug_assert!(false, "internal node {parent:?} with one child");
            return;
        };

        self.replace_child(grand_parent, parent, sibling);
        self.nodes[sibling.index()].parent = grand_parent;
        self.nodes[leaf.index()].parent = None;
        self.free_node(parent);

        self.sync_hierarchy(grand_parent);
    }

    /// Rebalance and refit every node from `start` up to the root.
    fn sync_hierarchy(&mut self, start: Option<NodeId>) {
        let mut current = start;
        while let Some(id) = current {
            let id = self.balance(id);
            self.refit(id);
            current = self.nodes[id.index()].parent;
        }
    }

    fn refit(&mut self, id: NodeId) {
        let node = &self.nodes[id.index()];
        let (Some(left), Some(right)) = (node.left, node.right) else {
            return;
        };
        let (left, right) = (&self.nodes[left.index()], &self.nodes[right.index()]);
        let height = 1 + left.height.max(right.height);
        let aabb = left.aabb.union(&right.aabb);

        let node = &mut self.nodes[id.index()];
        node.height = height;
        node.aabb = aabb;
    }

    /// Rotate the taller child of `a` up if the heights differ by more than one.
    /// Returns the root of the subtree.
    fn balance(&mut self, a: NodeId) -> NodeId {
        let node = &self.nodes[a.index()];
        let (Some(b), Some(c)) = (node.left, node.right) else {
            return a;
        };
        let height_b = self.nodes[b.index()].height;
        let height_c = self.nodes[c.index()].height;

        if height_c > height_b + 1 {
            self.rotate_up(a, c, Side::Right)
        } else if height_b > height_c + 1 {
            self.rotate_up(a, b, Side::Left)
        } else {
            a
        }
    }

    /// Promote `t`, the child of `a` on `side`, into `a`'s place. `t` keeps its
    /// taller child; `a` takes the other one and is rebalanced in turn.
    fn rotate_up(&mut self, a: NodeId, t: NodeId, side: Side) -> NodeId {
        let t_node = &self.nodes[t.index()];
        let (Some(f), Some(g)) = (t_node.left, t_node.right) else {
            return a;
        };
        let (keep, demote) = if self.nodes[f.index()].height > self.nodes[g.index()].height {
            (f, g)
        } else {
            (g, f)
        };

        let parent = self.nodes[a.index()].parent;
        self.replace_child(parent, a, t);
        {
            let t_node = &mut self.nodes[t.index()];
            t_node.parent = parent;
            t_node.left = Some(a);
            t_node.right = Some(keep);
        }
        {
            let a_node = &mut self.nodes[a.index()];
            a_node.parent = Some(t);
            match side {
                Side::Left => a_node.left = Some(demote),
                Side::Right => a_node.right = Some(demote),
            }
        }
        self.nodes[demote.index()].parent = Some(a);

        let a = self.balance(a);
        self.refit(a);
        self.refit(t);
        t
    }

    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: NodeId) {
        match parent {
            None => self.root = Some(new),
            Some(parent) => {
                let node = &mut self.nodes[parent.index()];
                if node.left == Some(old) {
                    node.left = Some(new);
                } else {
                    debug_assert_eq!(node.right, Some(old));
                    node.right = Some(new);
                }
            }
        }
    }

    fn allocate_node(&mut self) -> NodeId {
        let id = match self.free_list {
            Some(id) => id,
            None => self.grow(),
        };
        self.free_list = self.nodes[id.index()].next_free;
        self.nodes[id.index()] = TreeNode::vacant(None);
        id
    }

    fn free_node(&mut self, id: NodeId) {
        self.nodes[id.index()] = TreeNode::vacant(self.free_list);
        self.free_list = Some(id);
    }

    /// Double the pool and thread the new slots onto the free list.
    fn grow(&mut self) -> NodeId {
        let old = self.nodes.len();
        let new = (old * 2).max(1);
        self.nodes.extend((old..new).map(|i| {
            let next = (i + 1 < new).then(|| NodeId((i + 1) as u32));
            TreeNode::vacant(next)
        }));
        debug!(capacity = new, "bvh node pool grown");
        let first = NodeId(old as u32);
        self.free_list = Some(first);
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn aabb(x: f32, y: f32, w: f32, h: f32) -> Aabb {
        Aabb::new(Vec2::new(x, y), Vec2::new(x + w, y + h))
    }

    /// Check parent links, unions, heights and the balance bound. Returns the
    /// number of leaves.
    fn validate<T: Copy>(tree: &DynamicTree<T>) -> usize {
        fn check<T: Copy>(tree: &DynamicTree<T>, id: NodeId, parent: Option<NodeId>) -> (u32, usize) {
            let node = tree.node(id);
            assert_eq!(node.parent, parent, "parent link of {id:?}");
            if node.is_leaf() {
                assert!(node.left.is_none());
                assert!(node.payload.is_some(), "leaf {id:?} without payload");
                assert_eq!(node.height, 0);
                return (0, 1);
            }
            let (Some(left), Some(right)) = (node.left, node.right) else {
                panic!("internal node {id:?} with one child");
            };
            let (hl, cl) = check(tree, left, Some(id));
            let (hr, cr) = check(tree, right, Some(id));
            assert_eq!(node.height, 1 + hl.max(hr), "height of {id:?}");
            assert!(hl.abs_diff(hr) <= 1, "unbalanced {id:?}: {hl} vs {hr}");
            let union = tree.node(left).aabb.union(&tree.node(right).aabb);
            assert_eq!(node.aabb, union, "union invariant at {id:?}");
            (node.height, cl + cr)
        }

        match tree.root() {
            None => 0,
            Some(root) => check(tree, root, None).1,
        }
    }

    fn collect(tree: &DynamicTree<u32>, query: &Aabb) -> Vec<u32> {
        let mut hits = Vec::new();
        tree.query(query, |payload, _| {
            hits.push(payload);
            true
        });
        hits.sort_unstable();
        hits
    }

    #[test]
    fn test_empty_tree_query() {
        let tree = DynamicTree::<u32>::new();
        assert!(collect(&tree, &aabb(0.0, 0.0, 100.0, 100.0)).is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.root(), None);
    }

    #[test]
    fn test_single_leaf_is_enlarged_root() {
        let mut tree = DynamicTree::new();
        let id = tree.add_object(aabb(0.0, 0.0, 1.0, 1.0), 7u32);
        assert_eq!(tree.root(), Some(id));
        assert_eq!(tree.fat_aabb(id), aabb(-5.0, -5.0, 11.0, 11.0));
        assert_eq!(tree.payload(id), Some(7));
        assert_eq!(validate(&tree), 1);
    }

    #[test]
    fn test_invariants_hold_through_inserts_and_removes() {
        let mut tree = DynamicTree::new();
        let mut ids = Vec::new();
        for i in 0..200u32 {
            let x = (i % 20) as f32 * 13.0;
            let y = (i / 20) as f32 * 17.0;
            ids.push(tree.add_object(aabb(x, y, 4.0, 4.0), i));
            assert_eq!(validate(&tree), tree.leaf_count());
        }
        for id in ids.iter().step_by(3) {
            tree.remove_object(*id);
            assert_eq!(validate(&tree), tree.leaf_count());
        }
        assert_eq!(tree.leaf_count(), 200 - 67);
        // A balanced tree over n leaves stays within the AVL height bound.
        let bound = 1.45 * ((tree.leaf_count() + 2) as f32).log2();
        assert!((tree.height() as f32) <= bound, "height {} > {}", tree.height(), bound);
    }

    #[test]
    fn test_sorted_inserts_stay_balanced() {
        let mut tree = DynamicTree::new();
        for i in 0..512u32 {
            tree.add_object(aabb(i as f32 * 30.0, 0.0, 1.0, 1.0), i);
        }
        validate(&tree);
        assert!(tree.height() <= 13, "height = {}", tree.height());
    }

    #[test]
    fn test_update_hysteresis() {
        let mut tree = DynamicTree::new();
        let id = tree.add_object(aabb(0.0, 0.0, 2.0, 2.0), 1u32);
        tree.add_object(aabb(50.0, 50.0, 2.0, 2.0), 2u32);

        assert!(!tree.update_object(id, aabb(1.0, 1.0, 2.0, 2.0)));
        assert_eq!(tree.fat_aabb(id), aabb(-5.0, -5.0, 12.0, 12.0));

        assert!(tree.update_object(id, aabb(20.0, 0.0, 2.0, 2.0)));
        assert_eq!(tree.fat_aabb(id), aabb(15.0, -5.0, 12.0, 12.0));
        assert_eq!(validate(&tree), 2);
    }

    #[test]
    fn test_query_stops_when_callback_returns_false() {
        let mut tree = DynamicTree::new();
        for i in 0..10u32 {
            tree.add_object(aabb(0.0, 0.0, 1.0, 1.0), i);
        }
        let mut calls = 0;
        tree.query(&aabb(0.0, 0.0, 1.0, 1.0), |_, _| {
            calls += 1;
            calls < 3
        });
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_query_line() {
        let mut tree = DynamicTree::new();
        tree.add_object(aabb(0.0, 0.0, 2.0, 2.0), 1u32);
        tree.add_object(aabb(100.0, 0.0, 2.0, 2.0), 2u32);
        tree.add_object(aabb(50.0, 100.0, 2.0, 2.0), 3u32);

        let mut hits = Vec::new();
        tree.query_line(&Line::new(Vec2::new(-10.0, 1.0), Vec2::new(200.0, 1.0)), |p, _| {
            hits.push(p);
            true
        });
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 2]);
    }

    #[test]
    fn test_pool_doubles_and_reuses_slots() {
        let mut tree = DynamicTree::new();
        assert_eq!(tree.capacity(), 0);
        let a = tree.add_object(aabb(0.0, 0.0, 1.0, 1.0), 0u32);
        assert_eq!(tree.capacity(), 1);
        tree.add_object(aabb(5.0, 0.0, 1.0, 1.0), 1u32);
        // Second leaf plus its parent.
        assert_eq!(tree.capacity(), 4);

        tree.remove_object(a);
        tree.add_object(aabb(9.0, 0.0, 1.0, 1.0), 2u32);
        assert_eq!(tree.capacity(), 4);
        assert_eq!(validate(&tree), 2);
    }

    #[test]
    fn test_walk_tree_visits_every_node() {
        let mut tree = DynamicTree::new();
        for i in 0..33u32 {
            tree.add_object(aabb(i as f32 * 7.0, (i % 5) as f32 * 9.0, 3.0, 3.0), i);
        }
        let mut leaves = 0;
        let mut internal = 0;
        tree.walk_tree(|node| {
            if node.is_leaf() {
                leaves += 1;
            } else {
                internal += 1;
            }
        });
        assert_eq!(leaves, 33);
        assert_eq!(internal, 32);
    }

    #[test]
    fn test_remove_everything() {
        let mut tree = DynamicTree::new();
        let ids: Vec<_> = (0..16u32)
            .map(|i| tree.add_object(aabb(i as f32, 0.0, 1.0, 1.0), i))
            .collect();
        for id in ids {
            tree.remove_object(id);
            validate(&tree);
        }
        assert_eq!(tree.root(), None);
        assert_eq!(tree.leaf_count(), 0);
    }

    fn arb_aabb() -> impl Strategy<Value = Aabb> {
        (-500.0f32..500.0, -500.0f32..500.0, 0.0f32..60.0, 0.0f32..60.0)
            .prop_map(|(x, y, w, h)| aabb(x, y, w, h))
    }

    proptest! {
        #[test]
        fn prop_query_matches_brute_force(
            boxes in prop::collection::vec(arb_aabb(), 1..80),
            moves in prop::collection::vec((any::<prop::sample::Index>(), arb_aabb()), 0..20),
            removals in prop::collection::vec(any::<prop::sample::Index>(), 0..20),
            query in arb_aabb(),
        ) {
            let mut tree = DynamicTree::new();
            let mut live: Vec<(NodeId, u32)> = boxes
                .iter()
                .enumerate()
                .map(|(i, b)| (tree.add_object(*b, i as u32), i as u32))
                .collect();

            for (index, target) in &moves {
                let (id, _) = live[index.index(live.len())];
                tree.update_object(id, *target);
            }
            for index in &removals {
                if live.is_empty() {
                    break;
                }
                let (id, _) = live.swap_remove(index.index(live.len()));
                tree.remove_object(id);
            }

            prop_assert_eq!(validate(&tree), live.len());

            let mut expected: Vec<u32> = live
                .iter()
                .filter(|(id, _)| tree.fat_aabb(*id).intersects(&query))
                .map(|(_, payload)| *payload)
                .collect();
            expected.sort_unstable();
            prop_assert_eq!(collect(&tree, &query), expected);
        }
    }
}
