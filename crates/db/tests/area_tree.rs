//! Integration tests for the area tree-mutation operations.
//!
//! Exercises the repository layer against a real database:
//! - Two-phase create (lineage embeds the generated id)
//! - Move with the global lineage refresh
//! - Sibling reordering, including the unsupported root case
//! - Idempotent lineage recomputation
//! - The timestamp-gated global tree-sort recomputation

use sqlx::PgPool;

use navwarn_db::models::area::{CreateArea, DescInput, UpdateArea};
use navwarn_db::repositories::AreaRepo;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_root(sort_order: f64) -> CreateArea {
    CreateArea {
        sibling_sort_order: Some(sort_order),
        ..CreateArea::default()
    }
}

fn new_child(parent_id: i64, name: &str) -> CreateArea {
    CreateArea {
        parent_id: Some(parent_id),
        descs: vec![DescInput {
            lang: "en".to_string(),
            name: name.to_string(),
        }],
        ..CreateArea::default()
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_writes_lineage_in_second_phase(pool: PgPool) {
    let root = AreaRepo::create(&pool, &new_root(0.0)).await.unwrap();
    assert_eq!(
        root.area.lineage.as_deref(),
        Some(format!("/{}/", root.area.id).as_str())
    );

    let child = AreaRepo::create(&pool, &new_child(root.area.id, "Kattegat"))
        .await
        .unwrap();
    assert_eq!(child.area.parent_id, Some(root.area.id));
    assert_eq!(
        child.area.lineage.as_deref(),
        Some(format!("/{}/{}/", root.area.id, child.area.id).as_str())
    );
    assert_eq!(child.descs.len(), 1);
    assert_eq!(child.descs[0].name, "Kattegat");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn children_append_with_increasing_sort_keys(pool: PgPool) {
    let root = AreaRepo::create(&pool, &new_root(0.0)).await.unwrap();
    let first = AreaRepo::create(&pool, &new_child(root.area.id, "A"))
        .await
        .unwrap();
    let second = AreaRepo::create(&pool, &new_child(root.area.id, "B"))
        .await
        .unwrap();

    assert!(first.area.sibling_sort_order < second.area.sibling_sort_order);
    assert_eq!(
        second.area.sibling_sort_order,
        first.area.sibling_sort_order + 10.0
    );
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn identical_update_persists_nothing(pool: PgPool) {
    let root = AreaRepo::create(&pool, &new_root(0.0)).await.unwrap();
    let area = AreaRepo::create(&pool, &new_child(root.area.id, "Skagerrak"))
        .await
        .unwrap();

    let update = UpdateArea {
        descs: Some(vec![DescInput {
            lang: "en".to_string(),
            name: "Skagerrak".to_string(),
        }]),
        ..UpdateArea::default()
    };
    let unchanged = AreaRepo::update(&pool, area.area.id, &update).await.unwrap();
    assert_eq!(unchanged.area.updated_at, area.area.updated_at);

    let update = UpdateArea {
        descs: Some(vec![DescInput {
            lang: "en".to_string(),
            name: "Skagerrak W".to_string(),
        }]),
        ..UpdateArea::default()
    };
    let changed = AreaRepo::update(&pool, area.area.id, &update).await.unwrap();
    assert_eq!(changed.descs[0].name, "Skagerrak W");
    assert!(changed.area.updated_at > area.area.updated_at);
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn move_to_current_parent_is_a_noop(pool: PgPool) {
    let root = AreaRepo::create(&pool, &new_root(0.0)).await.unwrap();
    let child = AreaRepo::create(&pool, &new_child(root.area.id, "A"))
        .await
        .unwrap();

    let moved = AreaRepo::move_area(&pool, child.area.id, Some(root.area.id))
        .await
        .unwrap();
    assert!(!moved);

    let reloaded = AreaRepo::find_by_id(&pool, child.area.id).await.unwrap().unwrap();
    assert_eq!(reloaded.updated_at, child.area.updated_at);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn move_refreshes_lineages_globally(pool: PgPool) {
    let root_a = AreaRepo::create(&pool, &new_root(0.0)).await.unwrap();
    let root_b = AreaRepo::create(&pool, &new_root(10.0)).await.unwrap();
    let child = AreaRepo::create(&pool, &new_child(root_a.area.id, "A"))
        .await
        .unwrap();
    let grandchild = AreaRepo::create(&pool, &new_child(child.area.id, "A1"))
        .await
        .unwrap();

    let moved = AreaRepo::move_area(&pool, child.area.id, Some(root_b.area.id))
        .await
        .unwrap();
    assert!(moved);

    let child = AreaRepo::find_by_id(&pool, child.area.id).await.unwrap().unwrap();
    let grandchild = AreaRepo::find_by_id(&pool, grandchild.area.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(child.parent_id, Some(root_b.area.id));
    assert_eq!(
        child.lineage.as_deref(),
        Some(format!("/{}/{}/", root_b.area.id, child.id).as_str())
    );
    assert_eq!(
        grandchild.lineage.as_deref(),
        Some(format!("/{}/{}/{}/", root_b.area.id, child.id, grandchild.id).as_str())
    );
}

// ---------------------------------------------------------------------------
// Sibling reordering
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_child_moves_before_first(pool: PgPool) {
    let root = AreaRepo::create(&pool, &new_root(0.0)).await.unwrap();
    let child1 = AreaRepo::create(&pool, &new_child(root.area.id, "A"))
        .await
        .unwrap();
    let child2 = AreaRepo::create(&pool, &new_child(root.area.id, "B"))
        .await
        .unwrap();

    // Pin the keys so the expected result is exact.
    let pin = |sort| UpdateArea {
        sibling_sort_order: Some(sort),
        ..UpdateArea::default()
    };
    AreaRepo::update(&pool, child1.area.id, &pin(10.0)).await.unwrap();
    AreaRepo::update(&pool, child2.area.id, &pin(20.0)).await.unwrap();

    let changed = AreaRepo::change_sort_order(&pool, child2.area.id, true)
        .await
        .unwrap();
    assert!(changed);

    let child2 = AreaRepo::find_by_id(&pool, child2.area.id).await.unwrap().unwrap();
    assert_eq!(child2.sibling_sort_order, 0.0);

    // Sibling keys are never touched.
    let child1 = AreaRepo::find_by_id(&pool, child1.area.id).await.unwrap().unwrap();
    assert_eq!(child1.sibling_sort_order, 10.0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn root_reordering_is_unsupported(pool: PgPool) {
    let root = AreaRepo::create(&pool, &new_root(0.0)).await.unwrap();
    AreaRepo::create(&pool, &new_root(10.0)).await.unwrap();

    let changed = AreaRepo::change_sort_order(&pool, root.area.id, false)
        .await
        .unwrap();
    assert!(!changed);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn first_child_move_up_is_a_noop(pool: PgPool) {
    let root = AreaRepo::create(&pool, &new_root(0.0)).await.unwrap();
    let child = AreaRepo::create(&pool, &new_child(root.area.id, "A"))
        .await
        .unwrap();
    AreaRepo::create(&pool, &new_child(root.area.id, "B"))
        .await
        .unwrap();

    let changed = AreaRepo::change_sort_order(&pool, child.area.id, true)
        .await
        .unwrap();
    assert!(!changed);
}

// ---------------------------------------------------------------------------
// Lineage recomputation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_lineages_is_idempotent(pool: PgPool) {
    let root = AreaRepo::create(&pool, &new_root(0.0)).await.unwrap();
    AreaRepo::create(&pool, &new_child(root.area.id, "A"))
        .await
        .unwrap();

    // Creation already wrote consistent lineages, so a full pass persists
    // nothing.
    assert_eq!(AreaRepo::update_lineages(&pool).await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Tree sort recomputation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn recompute_assigns_preorder_and_gates_reruns(pool: PgPool) {
    let root_a = AreaRepo::create(&pool, &new_root(0.0)).await.unwrap();
    let a1 = AreaRepo::create(&pool, &new_child(root_a.area.id, "A1"))
        .await
        .unwrap();
    let a2 = AreaRepo::create(&pool, &new_child(root_a.area.id, "A2"))
        .await
        .unwrap();
    let root_b = AreaRepo::create(&pool, &new_root(5.0)).await.unwrap();

    let updated = AreaRepo::recompute_tree_sort_order(&pool).await.unwrap();
    assert!(updated);

    let sort_of = |id| {
        let pool = pool.clone();
        async move {
            AreaRepo::find_by_id(&pool, id)
                .await
                .unwrap()
                .unwrap()
                .tree_sort_order
        }
    };
    assert_eq!(sort_of(root_a.area.id).await, 1);
    assert_eq!(sort_of(a1.area.id).await, 2);
    assert_eq!(sort_of(a2.area.id).await, 3);
    assert_eq!(sort_of(root_b.area.id).await, 4);

    // No structural change: the second run updates nothing.
    let updated = AreaRepo::recompute_tree_sort_order(&pool).await.unwrap();
    assert!(!updated);

    // And the third run short-circuits on the timestamp gate.
    let updated = AreaRepo::recompute_tree_sort_order(&pool).await.unwrap();
    assert!(!updated);
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_requires_children_gone_first(pool: PgPool) {
    let root = AreaRepo::create(&pool, &new_root(0.0)).await.unwrap();
    let child = AreaRepo::create(&pool, &new_child(root.area.id, "A"))
        .await
        .unwrap();

    // A live child blocks the delete on the parent FK.
    assert!(AreaRepo::delete(&pool, root.area.id).await.is_err());

    assert!(AreaRepo::delete(&pool, child.area.id).await.unwrap());
    assert!(AreaRepo::delete(&pool, root.area.id).await.unwrap());
    assert!(!AreaRepo::delete(&pool, root.area.id).await.unwrap());
}
