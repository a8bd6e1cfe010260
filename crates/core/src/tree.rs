//! Hierarchical area/category tree model and sort-order algorithms.
//!
//! Areas and categories are n-ary trees persisted as flat rows with a
//! `parent_id` back-reference. This module owns the pure algorithms over an
//! in-memory snapshot of such a forest:
//!
//! - sibling ordering via fractional sort keys,
//! - materialized lineage paths (`"/rootId/.../id/"`) for subtree queries,
//! - the global pre-order index (`tree_sort_order`) assigned in bulk.
//!
//! The repository layer builds the snapshot, runs these functions and
//! persists exactly the returned change sets, which keeps the algorithms
//! testable without a database.

use std::collections::HashMap;

use rand::Rng;

use crate::types::DbId;

/// Gap between consecutive sibling sort keys when appending or bumping a
/// node past the first/last sibling.
pub const SIBLING_SORT_GAP: f64 = 10.0;

// ---------------------------------------------------------------------------
// Node model
// ---------------------------------------------------------------------------

/// One node of an area/category tree snapshot.
///
/// `children` is the sole ownership edge; `parent_id` is a lookup key only.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub id: DbId,
    pub parent_id: Option<DbId>,
    /// Fractional sibling sort key. Children are ordered ascending by this
    /// value; it is neither contiguous nor integral.
    pub sibling_sort_order: f64,
    /// Global pre-order index across the whole forest. Stale between runs
    /// of [`assign_tree_sort_order`].
    pub tree_sort_order: i32,
    /// Materialized ancestor path, `"/rootId/.../parentId/id/"`. Recomputed
    /// lazily via [`update_lineages`], not on every structural change.
    pub lineage: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(id: DbId) -> Self {
        Self {
            id,
            parent_id: None,
            sibling_sort_order: 0.0,
            tree_sort_order: 0,
            lineage: None,
            children: Vec::new(),
        }
    }

    /// Whether this node is a root of the forest.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Append `child` as the last child of `self`.
    ///
    /// The child's sibling sort key is placed one gap after the current last
    /// child, or seeded with a random value in `[0, 1)` for a first child.
    /// Its `tree_sort_order` gets a placeholder (the last child's, or the
    /// parent's own) until the next global recomputation.
    pub fn append_child(&mut self, mut child: TreeNode) {
        let last = self
            .children
            .last()
            .map(|c| (c.sibling_sort_order, c.tree_sort_order));
        let (sibling_sort, tree_sort) = child_attach_orders(last, self.tree_sort_order);
        child.sibling_sort_order = sibling_sort;
        child.tree_sort_order = tree_sort;
        child.parent_id = Some(self.id);
        self.children.push(child);
    }

    /// Re-sort the direct children by sibling sort key. Ties keep their
    /// current relative order (stable sort).
    pub fn sort_children(&mut self) {
        self.children
            .sort_by(|a, b| a.sibling_sort_order.total_cmp(&b.sibling_sort_order));
    }
}

/// Sort keys for a node being attached as the last child of a parent:
/// `(sibling_sort_order, tree_sort_order placeholder)`.
///
/// `last_child` is the parent's current last child's `(sibling, tree)` sort
/// pair, if any. The placeholder `tree_sort_order` holds until the next
/// global recomputation.
pub fn child_attach_orders(last_child: Option<(f64, i32)>, parent_tree_sort: i32) -> (f64, i32) {
    match last_child {
        Some((sibling_sort, tree_sort)) => (sibling_sort + SIBLING_SORT_GAP, tree_sort),
        None => (rand::rng().random_range(0.0..1.0), parent_tree_sort),
    }
}

// ---------------------------------------------------------------------------
// Forest assembly
// ---------------------------------------------------------------------------

/// Assemble a forest from flat rows.
///
/// Rows whose parent is not part of the input are dropped. Children (and
/// roots) come out sorted by sibling sort key at every level.
pub fn build_forest(rows: Vec<TreeNode>) -> Vec<TreeNode> {
    let mut by_parent: HashMap<Option<DbId>, Vec<TreeNode>> = HashMap::new();
    for row in rows {
        by_parent.entry(row.parent_id).or_default().push(row);
    }

    let mut roots = by_parent.remove(&None).unwrap_or_default();
    for root in &mut roots {
        attach_children(root, &mut by_parent);
    }
    roots.sort_by(|a, b| a.sibling_sort_order.total_cmp(&b.sibling_sort_order));
    roots
}

fn attach_children(node: &mut TreeNode, by_parent: &mut HashMap<Option<DbId>, Vec<TreeNode>>) {
    if let Some(mut children) = by_parent.remove(&Some(node.id)) {
        for child in &mut children {
            attach_children(child, by_parent);
        }
        node.children = children;
        node.sort_children();
    }
}

// ---------------------------------------------------------------------------
// Lineage
// ---------------------------------------------------------------------------

/// Lineage string for a node: `"/{id}/"` for roots, parent lineage plus
/// `"{id}/"` otherwise.
pub fn lineage_of(parent_lineage: Option<&str>, id: DbId) -> String {
    match parent_lineage {
        Some(parent) => format!("{parent}{id}/"),
        None => format!("/{id}/"),
    }
}

/// Recompute lineages across the whole forest, depth-first.
///
/// Returns `(id, new_lineage)` for exactly the nodes whose lineage changed,
/// so a second invocation with no structural change returns an empty set.
pub fn update_lineages(forest: &mut [TreeNode]) -> Vec<(DbId, String)> {
    let mut changed = Vec::new();
    for root in forest.iter_mut() {
        update_node_lineage(root, None, &mut changed);
    }
    changed
}

fn update_node_lineage(
    node: &mut TreeNode,
    parent_lineage: Option<&str>,
    changed: &mut Vec<(DbId, String)>,
) {
    let lineage = lineage_of(parent_lineage, node.id);
    if node.lineage.as_deref() != Some(lineage.as_str()) {
        node.lineage = Some(lineage.clone());
        changed.push((node.id, lineage.clone()));
    }
    for child in &mut node.children {
        update_node_lineage(child, Some(&lineage), changed);
    }
}

// ---------------------------------------------------------------------------
// Sibling reordering
// ---------------------------------------------------------------------------

/// Compute a new sibling sort key that moves the node at `index` one step
/// up or down among `orders` (the current siblings' keys, sorted
/// ascending). Returns `None` when the move is a no-op (already first or
/// last). Sibling keys themselves are never changed.
pub fn sibling_sort_for_move(orders: &[f64], index: usize, move_up: bool) -> Option<f64> {
    let len = orders.len();
    if index >= len {
        return None;
    }

    if move_up {
        match index {
            0 => None,
            1 => Some(orders[0] - SIBLING_SORT_GAP),
            i => Some((orders[i - 1] + orders[i - 2]) / 2.0),
        }
    } else if index + 1 >= len {
        None
    } else if index + 2 == len {
        Some(orders[len - 1] + SIBLING_SORT_GAP)
    } else {
        Some((orders[index + 1] + orders[index + 2]) / 2.0)
    }
}

// ---------------------------------------------------------------------------
// Global tree sort order
// ---------------------------------------------------------------------------

/// Assign the global pre-order index across the forest, starting at 1.
///
/// Roots are visited in sibling sort order; children are assumed sorted
/// (as produced by [`build_forest`]). A node is dirty when its stored
/// `tree_sort_order` differs from the computed index. The returned set
/// contains every dirty node plus all descendants of any dirty node, even
/// those whose own index is unchanged; the caller persists exactly this
/// set.
pub fn assign_tree_sort_order(forest: &mut [TreeNode]) -> Vec<(DbId, i32)> {
    forest.sort_by(|a, b| a.sibling_sort_order.total_cmp(&b.sibling_sort_order));

    let mut updated = Vec::new();
    let mut index = 0;
    for root in forest.iter_mut() {
        assign_node(root, &mut index, false, &mut updated);
    }
    updated
}

fn assign_node(
    node: &mut TreeNode,
    index: &mut i32,
    ancestor_updated: bool,
    updated: &mut Vec<(DbId, i32)>,
) {
    *index += 1;
    let dirty = node.tree_sort_order != *index;
    if dirty {
        node.tree_sort_order = *index;
    }
    let collect = dirty || ancestor_updated;
    if collect {
        updated.push((node.id, *index));
    }
    for child in &mut node.children {
        assign_node(child, index, collect, updated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: DbId, parent_id: Option<DbId>, sort: f64) -> TreeNode {
        TreeNode {
            parent_id,
            sibling_sort_order: sort,
            ..TreeNode::new(id)
        }
    }

    // -----------------------------------------------------------------------
    // append_child
    // -----------------------------------------------------------------------

    #[test]
    fn append_child_after_existing_siblings() {
        let mut parent = node(1, None, 0.0);
        parent.append_child(node(2, None, 0.0));
        parent.append_child(node(3, None, 0.0));

        assert_eq!(parent.children[1].id, 3);
        assert_eq!(parent.children[1].parent_id, Some(1));
        assert!(
            parent.children[1].sibling_sort_order > parent.children[0].sibling_sort_order,
            "new child must sort after every prior sibling"
        );
        assert_eq!(
            parent.children[1].sibling_sort_order,
            parent.children[0].sibling_sort_order + SIBLING_SORT_GAP
        );
    }

    #[test]
    fn append_first_child_seeds_fractional_sort() {
        let mut parent = node(1, None, 0.0);
        parent.append_child(node(2, None, 0.0));

        let seed = parent.children[0].sibling_sort_order;
        assert!((0.0..1.0).contains(&seed));
    }

    #[test]
    fn append_child_inherits_tree_sort_placeholder() {
        let mut parent = node(1, None, 0.0);
        parent.tree_sort_order = 7;
        parent.append_child(node(2, None, 0.0));
        assert_eq!(parent.children[0].tree_sort_order, 7);

        parent.children[0].tree_sort_order = 8;
        parent.append_child(node(3, None, 0.0));
        assert_eq!(parent.children[1].tree_sort_order, 8);
    }

    // -----------------------------------------------------------------------
    // Lineage
    // -----------------------------------------------------------------------

    #[test]
    fn lineage_shapes() {
        assert_eq!(lineage_of(None, 12), "/12/");
        assert_eq!(lineage_of(Some("/12/"), 34), "/12/34/");
    }

    #[test]
    fn update_lineages_full_chain() {
        let mut forest = build_forest(vec![
            node(1, None, 0.0),
            node(2, Some(1), 10.0),
            node(3, Some(2), 10.0),
        ]);
        let changed = update_lineages(&mut forest);

        assert_eq!(changed.len(), 3);
        assert_eq!(forest[0].lineage.as_deref(), Some("/1/"));
        assert_eq!(forest[0].children[0].lineage.as_deref(), Some("/1/2/"));
        assert_eq!(
            forest[0].children[0].children[0].lineage.as_deref(),
            Some("/1/2/3/")
        );
    }

    #[test]
    fn update_lineages_is_idempotent() {
        let mut forest = build_forest(vec![
            node(1, None, 0.0),
            node(2, Some(1), 10.0),
            node(3, Some(1), 20.0),
        ]);
        assert_eq!(update_lineages(&mut forest).len(), 3);
        assert!(update_lineages(&mut forest).is_empty());
    }

    #[test]
    fn update_lineages_only_returns_changed_subtree() {
        let mut forest = build_forest(vec![
            node(1, None, 0.0),
            node(2, Some(1), 10.0),
            node(3, None, 5.0),
        ]);
        update_lineages(&mut forest);

        // Reparent node 3 under node 2; only node 3's lineage changes.
        let mut rows: Vec<TreeNode> = vec![
            forest[0].clone(),
            forest[0].children[0].clone(),
            forest[1].clone(),
        ];
        for row in &mut rows {
            row.children.clear();
        }
        rows[2].parent_id = Some(2);

        let mut forest = build_forest(rows);
        let changed = update_lineages(&mut forest);
        assert_eq!(changed, vec![(3, "/1/2/3/".to_string())]);
    }

    // -----------------------------------------------------------------------
    // Sibling reordering
    // -----------------------------------------------------------------------

    #[test]
    fn move_up_first_is_noop() {
        assert_eq!(sibling_sort_for_move(&[10.0, 20.0], 0, true), None);
    }

    #[test]
    fn move_up_second_goes_before_first() {
        // Two children at 10 and 20: moving the second up lands at 0.
        assert_eq!(sibling_sort_for_move(&[10.0, 20.0], 1, true), Some(0.0));
    }

    #[test]
    fn move_up_middle_averages_the_two_preceding() {
        let orders = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(sibling_sort_for_move(&orders, 2, true), Some(15.0));
    }

    #[test]
    fn move_down_last_is_noop() {
        assert_eq!(sibling_sort_for_move(&[10.0, 20.0], 1, false), None);
    }

    #[test]
    fn move_down_penultimate_goes_past_last() {
        assert_eq!(
            sibling_sort_for_move(&[10.0, 20.0, 30.0], 1, false),
            Some(30.0 + SIBLING_SORT_GAP)
        );
    }

    #[test]
    fn move_down_middle_averages_the_two_following() {
        let orders = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(sibling_sort_for_move(&orders, 1, false), Some(35.0));
    }

    // -----------------------------------------------------------------------
    // Tree sort order
    // -----------------------------------------------------------------------

    #[test]
    fn preorder_assignment_over_forest() {
        // Roots [A, B], A has children [A1, A2]: expect A=1, A1=2, A2=3, B=4.
        let mut forest = build_forest(vec![
            node(1, None, 0.0),
            node(2, Some(1), 10.0),
            node(3, Some(1), 20.0),
            node(4, None, 5.0),
        ]);
        let updated = assign_tree_sort_order(&mut forest);

        assert_eq!(updated, vec![(1, 1), (2, 2), (3, 3), (4, 4)]);
    }

    #[test]
    fn second_run_with_no_change_updates_nothing() {
        let mut forest = build_forest(vec![
            node(1, None, 0.0),
            node(2, Some(1), 10.0),
            node(3, None, 5.0),
        ]);
        assert!(!assign_tree_sort_order(&mut forest).is_empty());
        assert!(assign_tree_sort_order(&mut forest).is_empty());
    }

    #[test]
    fn dirty_ancestor_collects_clean_descendants() {
        let mut forest = build_forest(vec![
            node(1, None, 0.0),
            node(2, Some(1), 10.0),
            node(3, Some(2), 10.0),
        ]);
        assign_tree_sort_order(&mut forest);

        // Nudge only the root's stored index; both descendants keep correct
        // values but must still be collected.
        forest[0].tree_sort_order = 99;
        let updated = assign_tree_sort_order(&mut forest);
        assert_eq!(updated, vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn roots_ordered_by_sibling_sort() {
        let mut forest = build_forest(vec![node(1, None, 20.0), node(2, None, 10.0)]);
        let updated = assign_tree_sort_order(&mut forest);
        assert_eq!(updated, vec![(2, 1), (1, 2)]);
    }

    #[test]
    fn build_forest_drops_orphans() {
        let forest = build_forest(vec![node(1, None, 0.0), node(2, Some(99), 0.0)]);
        assert_eq!(forest.len(), 1);
        assert!(forest[0].children.is_empty());
    }
}
