//! PositionManager contract tests.
//!
//! These tests verify the observable ordering behavior of every operation.
//! Each storage implementation should run these tests.

use std::sync::Arc;

use sortable::query::{Column, Direction};
use sortable::{GroupValues, MoveOutcome, NewRow, PositionManager, RowKey, SortOrder};

use super::Fixture;

fn manager<F: Fixture>(fixture: &F) -> PositionManager {
    PositionManager::new(fixture.config(), fixture.store())
}

fn list(id: i64) -> GroupValues {
    GroupValues::new().with("list_id", id)
}

fn null_list() -> GroupValues {
    GroupValues::new().with("list_id", Option::<i64>::None)
}

fn key(id: i64) -> RowKey {
    RowKey::Int(id)
}

/// Rows 1..=n in `list_id`, positioned 1..=n.
async fn seed<F: Fixture>(fixture: &F, list_id: i64, n: i64) {
    for id in 1..=n {
        let key = list_id * 100 + id;
        fixture
            .insert(key, Some(list_id), id, &format!("task {key}"))
            .await;
    }
}

async fn positions<F: Fixture>(fixture: &F, ids: &[i64]) -> Vec<i64> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        out.push(
            fixture
                .position(*id)
                .await
                .unwrap_or_else(|| panic!("row {id} should exist")),
        );
    }
    out
}

async fn keys_in_order(manager: &PositionManager, group: &GroupValues) -> Vec<RowKey> {
    manager
        .ordered(group)
        .await
        .expect("ordered should succeed")
        .into_iter()
        .map(|r| r.key)
        .collect()
}

// =============================================================================
// Walkthrough
// =============================================================================

pub async fn test_walkthrough<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 3).await;
    let manager = manager(fixture);

    let outcome = manager.move_up(&key(103)).await.unwrap();
    assert_eq!(outcome, MoveOutcome::Moved);
    assert_eq!(positions(fixture, &[101, 102, 103]).await, vec![1, 3, 2]);

    let outcome = manager.move_to_top(&key(103)).await.unwrap();
    assert_eq!(outcome, MoveOutcome::Moved);
    assert_eq!(positions(fixture, &[101, 102, 103]).await, vec![2, 4, 1]);

    let ranked = manager
        .sort(&SortOrder::default(), Some(&list(1)))
        .await
        .unwrap();
    assert_eq!(ranked, 3);
    assert_eq!(positions(fixture, &[101, 102, 103]).await, vec![1, 2, 3]);
}

// =============================================================================
// Adjacent moves
// =============================================================================

pub async fn test_move_up_swaps_with_previous<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 4).await;
    let manager = manager(fixture);

    assert!(manager.move_up(&key(103)).await.unwrap().is_moved());
    assert_eq!(
        positions(fixture, &[101, 102, 103, 104]).await,
        vec![1, 3, 2, 4],
        "only the two swapped rows change"
    );
}

pub async fn test_move_down_swaps_with_next<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 4).await;
    let manager = manager(fixture);

    assert!(manager.move_down(&key(102)).await.unwrap().is_moved());
    assert_eq!(
        positions(fixture, &[101, 102, 103, 104]).await,
        vec![1, 3, 2, 4]
    );
}

pub async fn test_boundaries_are_no_ops<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 3).await;
    let manager = manager(fixture);

    assert_eq!(
        manager.move_up(&key(101)).await.unwrap(),
        MoveOutcome::AtBoundary
    );
    assert_eq!(
        manager.move_down(&key(103)).await.unwrap(),
        MoveOutcome::AtBoundary
    );
    assert_eq!(positions(fixture, &[101, 102, 103]).await, vec![1, 2, 3]);
}

pub async fn test_moves_skip_gaps<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 3).await;
    fixture.remove(102).await;
    let manager = manager(fixture);

    assert!(manager.move_up(&key(103)).await.unwrap().is_moved());
    assert_eq!(positions(fixture, &[101, 103]).await, vec![3, 1]);
}

pub async fn test_multi_step_moves<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 5).await;
    let manager = manager(fixture);

    assert!(manager.move_up_by(&key(105), 3).await.unwrap().is_moved());
    assert_eq!(
        keys_in_order(&manager, &list(1)).await,
        vec![key(101), key(105), key(102), key(103), key(104)]
    );

    assert!(manager.move_down_by(&key(101), 99).await.unwrap().is_moved());
    assert_eq!(
        keys_in_order(&manager, &list(1)).await,
        vec![key(105), key(102), key(103), key(104), key(101)]
    );

    assert_eq!(
        manager.move_down_by(&key(101), 0).await.unwrap(),
        MoveOutcome::InvalidInput
    );
}

// =============================================================================
// Top and end
// =============================================================================

pub async fn test_move_to_top_preserves_relative_order<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 4).await;
    let manager = manager(fixture);

    assert!(manager.move_to_top(&key(104)).await.unwrap().is_moved());
    assert_eq!(
        keys_in_order(&manager, &list(1)).await,
        vec![key(104), key(101), key(102), key(103)]
    );
    assert_eq!(manager.min_position(&list(1)).await.unwrap(), 1);
}

pub async fn test_move_to_top_of_head_keeps_order<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 3).await;
    let manager = manager(fixture);

    assert!(manager.move_to_top(&key(101)).await.unwrap().is_moved());
    assert_eq!(
        keys_in_order(&manager, &list(1)).await,
        vec![key(101), key(102), key(103)]
    );
    assert_eq!(positions(fixture, &[101, 102, 103]).await, vec![1, 3, 4]);
}

pub async fn test_move_to_end<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 3).await;
    let manager = manager(fixture);

    assert!(manager.move_to_end(&key(101)).await.unwrap().is_moved());
    assert_eq!(positions(fixture, &[101, 102, 103]).await, vec![4, 2, 3]);
    assert_eq!(
        keys_in_order(&manager, &list(1)).await,
        vec![key(102), key(103), key(101)]
    );
}

// =============================================================================
// Inputs
// =============================================================================

pub async fn test_unknown_and_blank_keys<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 2).await;
    let manager = manager(fixture);

    assert_eq!(
        manager.move_to_top(&key(999)).await.unwrap(),
        MoveOutcome::NotFound
    );
    assert_eq!(
        manager.move_down(&key(999)).await.unwrap(),
        MoveOutcome::NotFound
    );
    assert_eq!(
        manager.move_to_end(&key(0)).await.unwrap(),
        MoveOutcome::InvalidInput
    );
    assert_eq!(positions(fixture, &[101, 102]).await, vec![1, 2]);
}

// =============================================================================
// Groups
// =============================================================================

pub async fn test_groups_are_independent<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 3).await;
    seed(fixture, 2, 3).await;
    let manager = manager(fixture);

    assert!(manager.move_to_top(&key(103)).await.unwrap().is_moved());
    assert!(manager.move_up(&key(102)).await.unwrap().is_moved());
    assert_eq!(
        manager.move_up(&key(201)).await.unwrap(),
        MoveOutcome::AtBoundary,
        "first row of list 2 has no predecessor in its own group"
    );

    assert_eq!(positions(fixture, &[201, 202, 203]).await, vec![1, 2, 3]);
}

pub async fn test_null_group_is_a_group<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 2).await;
    fixture.insert(901, None, 1, "loose a").await;
    fixture.insert(902, None, 2, "loose b").await;
    let manager = manager(fixture);

    assert!(manager.move_up(&key(902)).await.unwrap().is_moved());
    assert_eq!(positions(fixture, &[901, 902]).await, vec![2, 1]);
    assert_eq!(positions(fixture, &[101, 102]).await, vec![1, 2]);

    assert_eq!(manager.max_position(&null_list()).await.unwrap(), 3);
}

// =============================================================================
// Placement
// =============================================================================

pub async fn test_placement_in_empty_and_populated_groups<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 3).await;
    let manager = manager(fixture);

    assert_eq!(manager.max_position(&list(1)).await.unwrap(), 4);
    assert_eq!(manager.min_position(&list(1)).await.unwrap(), 1);
    assert_eq!(manager.max_position(&list(5)).await.unwrap(), 1);
    assert_eq!(manager.min_position(&list(5)).await.unwrap(), 0);

    let mut row = NewRow::new()
        .with_field("list_id", 1)
        .with_field("title", "appended");
    let assigned = manager.assign_initial_position(&mut row).await.unwrap();
    assert_eq!(assigned, Some(4));

    fixture.insert(104, Some(1), 4, "appended").await;
    assert_eq!(manager.max_position(&list(1)).await.unwrap(), 5);
}

// =============================================================================
// Resequencing
// =============================================================================

pub async fn test_sort_closes_gaps<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    fixture.insert(101, Some(1), 7, "a").await;
    fixture.insert(102, Some(1), 3, "b").await;
    fixture.insert(103, Some(1), 3, "c").await;
    fixture.insert(104, Some(1), 40, "d").await;
    fixture.insert(201, Some(2), 9, "other").await;
    let manager = manager(fixture);

    let by_position = SortOrder::position_asc();
    assert_eq!(manager.sort(&by_position, Some(&list(1))).await.unwrap(), 4);

    // Ties on position fall back to key order.
    assert_eq!(
        positions(fixture, &[101, 102, 103, 104]).await,
        vec![3, 1, 2, 4]
    );
    assert_eq!(fixture.position(201).await, Some(9), "other group untouched");
}

pub async fn test_sort_by_field_descending<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    fixture.insert(101, Some(1), 1, "alpha").await;
    fixture.insert(102, Some(1), 2, "gamma").await;
    fixture.insert(103, Some(1), 3, "beta").await;
    let manager = manager(fixture);

    let order = SortOrder::by(Column::Field("title".into()), Direction::Desc);
    manager.sort(&order, Some(&list(1))).await.unwrap();

    assert_eq!(positions(fixture, &[101, 102, 103]).await, vec![3, 1, 2]);
}

pub async fn test_sort_whole_collection<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 2).await;
    seed(fixture, 2, 2).await;
    let manager = manager(fixture);

    assert_eq!(manager.sort(&SortOrder::default(), None).await.unwrap(), 4);
    assert_eq!(
        positions(fixture, &[101, 102, 201, 202]).await,
        vec![1, 2, 3, 4]
    );
}

pub async fn test_sort_by_nullable_field_puts_null_lowest<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    fixture.insert(201, Some(2), 5, "b").await;
    fixture.insert(901, None, 7, "n").await;
    fixture.insert(101, Some(1), 3, "a").await;
    let manager = manager(fixture);

    let asc = SortOrder::by(Column::Field("list_id".into()), Direction::Asc);
    assert_eq!(manager.sort(&asc, None).await.unwrap(), 3);
    assert_eq!(positions(fixture, &[901, 101, 201]).await, vec![1, 2, 3]);

    let desc = SortOrder::by(Column::Field("list_id".into()), Direction::Desc);
    manager.sort(&desc, None).await.unwrap();
    assert_eq!(positions(fixture, &[201, 101, 901]).await, vec![1, 2, 3]);
}

// =============================================================================
// Concurrency
// =============================================================================

pub async fn test_concurrent_moves_keep_positions_distinct<F: Fixture>(fixture: &F) {
    fixture.reset().await;
    seed(fixture, 1, 6).await;
    let manager = Arc::new(manager(fixture));

    let mut handles = Vec::new();
    for round in 0..4 {
        for id in 101..=106 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                if (id + round) % 2 == 0 {
                    manager.move_up(&RowKey::Int(id)).await
                } else {
                    manager.move_to_top(&RowKey::Int(id)).await
                }
            }));
        }
    }
    for outcome in futures::future::join_all(handles).await {
        outcome.expect("task should not panic").expect("move should succeed");
    }

    let mut seen = positions(fixture, &[101, 102, 103, 104, 105, 106]).await;
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 6, "no two rows share a position");

    manager
        .sort(&SortOrder::position_asc(), Some(&list(1)))
        .await
        .unwrap();
    let mut ranked = positions(fixture, &[101, 102, 103, 104, 105, 106]).await;
    ranked.sort_unstable();
    assert_eq!(ranked, vec![1, 2, 3, 4, 5, 6]);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all PositionManager contract tests against a fixture.
#[macro_export]
macro_rules! run_position_manager_tests {
    ($fixture:expr) => {
        use $crate::positioning::position_manager_tests::*;

        test_walkthrough($fixture).await;
        println!("  test_walkthrough: PASSED");

        // adjacent moves
        test_move_up_swaps_with_previous($fixture).await;
        println!("  test_move_up_swaps_with_previous: PASSED");

        test_move_down_swaps_with_next($fixture).await;
        println!("  test_move_down_swaps_with_next: PASSED");

        test_boundaries_are_no_ops($fixture).await;
        println!("  test_boundaries_are_no_ops: PASSED");

        test_moves_skip_gaps($fixture).await;
        println!("  test_moves_skip_gaps: PASSED");

        test_multi_step_moves($fixture).await;
        println!("  test_multi_step_moves: PASSED");

        // top and end
        test_move_to_top_preserves_relative_order($fixture).await;
        println!("  test_move_to_top_preserves_relative_order: PASSED");

        test_move_to_top_of_head_keeps_order($fixture).await;
        println!("  test_move_to_top_of_head_keeps_order: PASSED");

        test_move_to_end($fixture).await;
        println!("  test_move_to_end: PASSED");

        test_unknown_and_blank_keys($fixture).await;
        println!("  test_unknown_and_blank_keys: PASSED");

        // groups
        test_groups_are_independent($fixture).await;
        println!("  test_groups_are_independent: PASSED");

        test_null_group_is_a_group($fixture).await;
        println!("  test_null_group_is_a_group: PASSED");

        // placement
        test_placement_in_empty_and_populated_groups($fixture).await;
        println!("  test_placement_in_empty_and_populated_groups: PASSED");

        // resequencing
        test_sort_closes_gaps($fixture).await;
        println!("  test_sort_closes_gaps: PASSED");

        test_sort_by_field_descending($fixture).await;
        println!("  test_sort_by_field_descending: PASSED");

        test_sort_whole_collection($fixture).await;
        println!("  test_sort_whole_collection: PASSED");

        test_sort_by_nullable_field_puts_null_lowest($fixture).await;
        println!("  test_sort_by_nullable_field_puts_null_lowest: PASSED");

        test_concurrent_moves_keep_positions_distinct($fixture).await;
        println!("  test_concurrent_moves_keep_positions_distinct: PASSED");
    };
}
