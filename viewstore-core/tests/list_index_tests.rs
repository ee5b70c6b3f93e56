//! Behavior of list indexes over snapshots and forks

use proptest::prelude::*;
use viewstore_core::storage::{ListIndex, StorageError, StorageResult};
use viewstore_core::test_utils::{
    assert_concurrent_modification, assert_invalidated, collect_ok, committed_list, isolated_db,
    list_with, string_values,
};

const LIST_NAME: &str = "test_list";

fn counter<V>(list: &ListIndex<V>) -> u64
where
    V: viewstore_core::storage::StorageValue,
{
    list.view().tracker().current_count(list.view().id(), list.address())
}

#[test]
fn test_add_get_last_pop_session() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list: ListIndex<String> = ListIndex::new(LIST_NAME, &fork).unwrap();

    list.push("v1".to_string()).unwrap();
    list.push("v2".to_string()).unwrap();

    assert_eq!(list.last().unwrap(), "v2");
    assert_eq!(list.pop().unwrap(), "v2");
    assert_eq!(list.len().unwrap(), 1);
    assert_eq!(list.get(0).unwrap(), "v1");
}

#[test]
fn test_last_of_empty_list() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list: ListIndex<String> = ListIndex::new(LIST_NAME, &fork).unwrap();

    assert!(matches!(list.last(), Err(StorageError::EmptyCollection(_))));
    assert!(matches!(list.pop(), Err(StorageError::EmptyCollection(_))));
}

#[test]
fn test_set_replaces_without_resizing() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(3)).unwrap();

    list.set(1, "replaced".to_string()).unwrap();

    assert_eq!(list.get(1).unwrap(), "replaced");
    assert_eq!(list.len().unwrap(), 3);
}

#[test]
fn test_set_never_appends() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list: ListIndex<String> = ListIndex::new(LIST_NAME, &fork).unwrap();

    assert_eq!(
        list.set(0, "v1".to_string()),
        Err(StorageError::OutOfBounds { index: 0, size: 0 })
    );

    list.push("v1".to_string()).unwrap();
    assert!(matches!(
        list.set(1, "v2".to_string()),
        Err(StorageError::OutOfBounds { index: 1, size: 1 })
    ));
    assert_eq!(list.len().unwrap(), 1);
}

#[test]
fn test_extend_empty_is_a_no_op() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(2)).unwrap();
    let before = counter(&list);

    list.extend(Vec::<String>::new()).unwrap();

    assert_eq!(list.len().unwrap(), 2);
    assert_eq!(counter(&list), before);
}

#[test]
fn test_extend_with_absent_element_changes_nothing() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(1)).unwrap();
    let before = counter(&list);

    let result = list.extend(vec![Some("a".to_string()), None]);

    assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
    assert_eq!(list.len().unwrap(), 1);
    assert_eq!(counter(&list), before);
    assert_eq!(collect_ok(list.iter().unwrap()), vec!["v1".to_string()]);
}

#[test]
fn test_truncate_shrinks_but_never_grows() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(4)).unwrap();

    list.truncate(10u64).unwrap();
    assert_eq!(list.len().unwrap(), 4);

    list.truncate(4u64).unwrap();
    assert_eq!(list.len().unwrap(), 4);

    list.truncate(2u64).unwrap();
    assert_eq!(collect_ok(list.iter().unwrap()), string_values(2));

    list.truncate(0u64).unwrap();
    assert!(list.is_empty().unwrap());
}

#[test]
fn test_truncate_negative_size() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(2)).unwrap();

    assert!(matches!(list.truncate(-1i32), Err(StorageError::InvalidArgument(_))));
    assert_eq!(list.len().unwrap(), 2);
}

#[test]
fn test_clear_empty_list_is_allowed_on_fork() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list: ListIndex<String> = ListIndex::new(LIST_NAME, &fork).unwrap();

    list.clear().unwrap();

    assert!(list.is_empty().unwrap());
    assert_eq!(counter(&list), 0);
}

#[test]
fn test_clear_removes_all_elements() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(3)).unwrap();

    list.clear().unwrap();

    assert!(list.is_empty().unwrap());
    assert!(matches!(list.get(0), Err(StorageError::OutOfBounds { .. })));
    list.push("again".to_string()).unwrap();
    assert_eq!(collect_ok(list.iter().unwrap()), vec!["again".to_string()]);
}

#[test]
fn test_snapshot_rejects_every_write() {
    let db = isolated_db();
    let snapshot = committed_list(&db, LIST_NAME, string_values(2)).unwrap();
    let list: ListIndex<String> = ListIndex::new(LIST_NAME, &snapshot).unwrap();

    let unsupported = |result: StorageResult<()>| {
        assert!(matches!(result, Err(StorageError::UnsupportedOperation(_))), "{:?}", result);
    };
    unsupported(list.push("v3".to_string()));
    unsupported(list.extend(vec!["v3".to_string()]));
    unsupported(list.set(0, "x".to_string()));
    unsupported(list.clear());
    unsupported(list.truncate(1u64));
    assert!(matches!(list.pop(), Err(StorageError::UnsupportedOperation(_))));

    assert_eq!(collect_ok(list.iter().unwrap()), string_values(2));
    assert_eq!(counter(&list), 0);
}

#[test]
fn test_snapshot_rejects_clear_even_when_empty() {
    let db = isolated_db();
    let snapshot = db.create_snapshot();
    let list: ListIndex<String> = ListIndex::new(LIST_NAME, &snapshot).unwrap();

    assert!(matches!(list.clear(), Err(StorageError::UnsupportedOperation(_))));
}

#[test]
fn test_iterator_fails_after_push() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(2)).unwrap();

    let mut iter = list.iter().unwrap();
    assert_eq!(iter.next().unwrap().unwrap(), "v1");
    list.push("v3".to_string()).unwrap();

    assert_invalidated(&mut iter);
}

#[test]
fn test_iterator_fails_after_set() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(2)).unwrap();

    let mut iter = list.iter().unwrap();
    list.set(1, "x".to_string()).unwrap();

    assert_invalidated(&mut iter);
}

#[test]
fn test_alias_modification_invalidates_iterator() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list1 = list_with(LIST_NAME, &fork, string_values(2)).unwrap();
    let list2: ListIndex<String> = ListIndex::new(LIST_NAME, &fork).unwrap();

    let mut iter = list1.iter().unwrap();
    list2.push("v3".to_string()).unwrap();

    assert_invalidated(&mut iter);
    assert_eq!(list1.len().unwrap(), 3);
}

#[test]
fn test_other_list_does_not_invalidate_iterator() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list1 = list_with("list_1", &fork, string_values(2)).unwrap();
    let list2: ListIndex<String> = ListIndex::new("list_2", &fork).unwrap();

    let iter = list1.iter().unwrap();
    list2.push("other".to_string()).unwrap();

    assert_eq!(collect_ok(iter), string_values(2));
}

#[test]
fn test_same_list_in_another_fork_does_not_invalidate_iterator() {
    let db = isolated_db();
    let fork1 = db.create_fork();
    let fork2 = db.create_fork();
    let list1 = list_with(LIST_NAME, &fork1, string_values(2)).unwrap();
    let list2: ListIndex<String> = ListIndex::new(LIST_NAME, &fork2).unwrap();

    let iter = list1.iter().unwrap();
    list2.push("elsewhere".to_string()).unwrap();

    assert_eq!(collect_ok(iter), string_values(2));
}

#[test]
fn test_iterator_over_snapshot() {
    let db = isolated_db();
    let snapshot = committed_list(&db, LIST_NAME, string_values(3)).unwrap();
    let list: ListIndex<String> = ListIndex::new(LIST_NAME, &snapshot).unwrap();

    assert_eq!(collect_ok(list.iter().unwrap()), string_values(3));
}

#[test]
fn test_stream_binds_late() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(2)).unwrap();

    let stream = list.stream();
    list.push("v3".to_string()).unwrap();

    assert_eq!(collect_ok(stream), string_values(3));
}

#[test]
fn test_stream_sees_replacement_before_evaluation() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(2)).unwrap();

    let stream = list.stream();
    list.set(0, "first".to_string()).unwrap();

    assert_eq!(collect_ok(stream), vec!["first".to_string(), "v2".to_string()]);
}

#[test]
fn test_stream_modified_by_its_own_pipeline_fails() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(2)).unwrap();
    let size = list.len().unwrap() as usize;

    let result: StorageResult<Vec<String>> = list
        .stream()
        .map(|item| {
            let item = item?;
            list.push(item.clone())?;
            Ok(item)
        })
        .take(size)
        .collect();

    assert_concurrent_modification(result);
}

#[test]
fn test_stream_modified_during_evaluation_fails() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(3)).unwrap();

    let mut stream = list.stream();
    assert_eq!(stream.next().unwrap().unwrap(), "v1");
    list.truncate(1u64).unwrap();

    assert_invalidated(&mut stream);
}

#[test]
fn test_released_view_is_reported() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(2)).unwrap();
    let mut iter = list.iter().unwrap();

    fork.release();

    assert!(matches!(list.len(), Err(StorageError::ResourceMisuse(_))));
    assert!(matches!(list.push("x".to_string()), Err(StorageError::ResourceMisuse(_))));
    assert!(matches!(iter.next(), Some(Err(StorageError::ResourceMisuse(_)))));
    assert!(matches!(
        ListIndex::<String>::new(LIST_NAME, &fork),
        Err(StorageError::ResourceMisuse(_))
    ));
}

#[test]
fn test_iterator_outlives_its_proxy() {
    let db = isolated_db();
    let fork = db.create_fork();
    let iter = {
        let list = list_with(LIST_NAME, &fork, string_values(2)).unwrap();
        list.iter().unwrap()
    };

    assert_eq!(collect_ok(iter), string_values(2));
}

#[test]
fn test_rollback_invalidates_open_iterators() {
    let db = isolated_db();
    let fork = db.create_fork();
    let list = list_with(LIST_NAME, &fork, string_values(2)).unwrap();
    fork.checkpoint().unwrap();
    list.push("v3".to_string()).unwrap();

    let mut iter = list.iter().unwrap();
    fork.rollback().unwrap();

    assert_invalidated(&mut iter);
    assert_eq!(collect_ok(list.iter().unwrap()), string_values(2));
}

#[test]
fn test_merged_list_is_visible_to_new_snapshots_only() {
    let db = isolated_db();
    let before = db.create_snapshot();
    let snapshot = committed_list(&db, LIST_NAME, string_values(2)).unwrap();

    let old: ListIndex<String> = ListIndex::new(LIST_NAME, &before).unwrap();
    let new: ListIndex<String> = ListIndex::new(LIST_NAME, &snapshot).unwrap();

    assert!(old.is_empty().unwrap());
    assert_eq!(new.len().unwrap(), 2);
}

proptest! {
    #[test]
    fn prop_set_keeps_size(values in prop::collection::vec(any::<u32>(), 1..20), pick in any::<prop::sample::Index>(), x in any::<u32>()) {
        let db = isolated_db();
        let fork = db.create_fork();
        let list = list_with("prop_list", &fork, values.clone()).unwrap();
        let i = pick.index(values.len()) as u64;

        list.set(i, x).unwrap();

        prop_assert_eq!(list.get(i).unwrap(), x);
        prop_assert_eq!(list.len().unwrap(), values.len() as u64);
    }

    #[test]
    fn prop_truncate_never_grows(values in prop::collection::vec(any::<u8>(), 0..20), new_len in 0u64..30) {
        let db = isolated_db();
        let fork = db.create_fork();
        let list = list_with("prop_list", &fork, values.clone()).unwrap();
        let before = values.len() as u64;

        list.truncate(new_len).unwrap();

        let expected = before.min(new_len);
        prop_assert_eq!(list.len().unwrap(), expected);
        prop_assert_eq!(collect_ok(list.iter().unwrap()), values[..expected as usize].to_vec());
    }
}
