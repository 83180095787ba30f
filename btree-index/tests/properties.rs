use std::fs;
use std::sync::Arc;

use buffer_pool_manager::api::BufferPoolManager;
use buffer_pool_manager::disk_manager::DiskManager;
use buffer_pool_manager::pool::SimpleBufferPoolManager;
use btree_index::{BPlusTree, BPlusTreeScan, IndexError, IndexKey, RelationScan, RelationScanError, RowId, ScanOp};
use test_case::test_case;

struct BytesRelation {
    records: Vec<(RowId, [u8; 4])>,
    position: usize,
}

impl BytesRelation {
    fn sequential(n: i32) -> Self {
        let records = (0..n)
            .map(|i| (RowId { page_id: i as usize, slot_index: 0 }, i.to_le_bytes()))
            .collect();
        Self { records, position: 0 }
    }
}

impl RelationScan for BytesRelation {
    fn scan_next(&mut self) -> Result<RowId, RelationScanError> {
        if self.position >= self.records.len() {
            return Err(RelationScanError::EndOfFile);
        }
        let rid = self.records[self.position].0;
        self.position += 1;
        Ok(rid)
    }

    fn get_record(&self) -> &[u8] {
        &self.records[self.position - 1].1
    }
}

fn fresh_bpm(db_file: &str, pool_size: usize) -> Arc<dyn BufferPoolManager> {
    let _ = fs::remove_file(db_file);
    let disk_manager = Arc::new(DiskManager::new(db_file, false).unwrap());
    Arc::new(SimpleBufferPoolManager::new(pool_size, disk_manager))
}

#[test]
fn bulk_load_from_relation_scan_indexes_every_record() {
    let db_file = "test_properties_bulk_load.db";
    let bpm = fresh_bpm(db_file, 200);
    let mut relation = BytesRelation::sequential(9999);

    let tree = BPlusTree::create(bpm, "items".to_string(), 0, &mut relation).unwrap();

    for i in 0..9999 {
        let rid = tree.search(&IndexKey::Integer(i)).unwrap();
        assert_eq!(rid, RowId { page_id: i as usize, slot_index: 0 });
    }

    fs::remove_file(db_file).unwrap();
}

#[test]
fn range_scan_over_bulk_loaded_relation_returns_expected_window() {
    let db_file = "test_properties_scan_window.db";
    let bpm = fresh_bpm(db_file, 200);
    let mut relation = BytesRelation::sequential(9999);
    let tree = BPlusTree::create(bpm, "items".to_string(), 0, &mut relation).unwrap();

    let mut scan = BPlusTreeScan::start(&tree, IndexKey::Integer(2500), ScanOp::Gte, IndexKey::Integer(7500), ScanOp::Lt)
        .unwrap();

    let mut rids = Vec::new();
    while let Ok(rid) = scan.scan_next() {
        rids.push(rid);
    }
    scan.end().unwrap();

    assert_eq!(rids.len(), 5000);
    assert_eq!(rids[0], RowId { page_id: 2500, slot_index: 0 });
    assert_eq!(rids[4999], RowId { page_id: 7499, slot_index: 0 });

    fs::remove_file(db_file).unwrap();
}

#[test]
fn close_then_reopen_preserves_all_entries() {
    let db_file = "test_properties_reopen.db";
    let bpm = fresh_bpm(db_file, 200);

    let meta_page_id = {
        let mut relation = BytesRelation::sequential(3000);
        let tree = BPlusTree::create(bpm.clone(), "accounts".to_string(), 0, &mut relation).unwrap();
        let meta_page_id = tree.meta_page_id();
        tree.close().unwrap();
        meta_page_id
    };

    let reopened = BPlusTree::open(bpm, meta_page_id, "accounts", 0).unwrap();
    for i in 0..3000 {
        assert_eq!(reopened.search(&IndexKey::Integer(i)).unwrap(), RowId { page_id: i as usize, slot_index: 0 });
    }

    fs::remove_file(db_file).unwrap();
}

#[test]
fn insertions_well_past_a_single_leaf_capacity_stay_searchable() {
    let db_file = "test_properties_many_splits.db";
    let bpm = fresh_bpm(db_file, 300);
    let mut relation = BytesRelation { records: Vec::new(), position: 0 };
    let tree = BPlusTree::create(bpm, "widgets".to_string(), 0, &mut relation).unwrap();

    let original_root = tree.root_page_id().unwrap();

    for i in 0..5000 {
        tree.insert_entry(IndexKey::Integer(i), RowId { page_id: i as usize, slot_index: 0 }).unwrap();
    }

    assert_ne!(tree.root_page_id().unwrap(), original_root, "root should have changed after splits propagated");

    for i in 0..5000 {
        assert_eq!(tree.search(&IndexKey::Integer(i)).unwrap(), RowId { page_id: i as usize, slot_index: 0 });
    }

    fs::remove_file(db_file).unwrap();
}

#[test_case(IndexKey::Integer(5), ScanOp::Gt, IndexKey::Integer(15), ScanOp::Lt, 9 ; "gt and lt")]
#[test_case(IndexKey::Integer(5), ScanOp::Gte, IndexKey::Integer(15), ScanOp::Lte, 11 ; "gte and lte")]
#[test_case(IndexKey::Integer(5), ScanOp::Gt, IndexKey::Integer(15), ScanOp::Lte, 10 ; "gt and lte")]
#[test_case(IndexKey::Integer(5), ScanOp::Gte, IndexKey::Integer(15), ScanOp::Lt, 10 ; "gte and lt")]
fn scan_operator_combinations_yield_expected_counts(
    low_val: IndexKey,
    low_op: ScanOp,
    high_val: IndexKey,
    high_op: ScanOp,
    expected_count: usize,
) {
    let db_file = format!("test_properties_opcombo_{low_op:?}_{high_op:?}.db");
    let bpm = fresh_bpm(&db_file, 100);
    let mut relation = BytesRelation::sequential(50);
    let tree = BPlusTree::create(bpm, "rows".to_string(), 0, &mut relation).unwrap();

    let mut scan = BPlusTreeScan::start(&tree, low_val, low_op, high_val, high_op).unwrap();
    let mut count = 0;
    while scan.scan_next().is_ok() {
        count += 1;
    }
    scan.end().unwrap();

    assert_eq!(count, expected_count);

    fs::remove_file(&db_file).unwrap();
}

#[test]
fn duplicate_keys_are_all_returned_by_a_covering_scan() {
    let db_file = "test_properties_duplicates.db";
    let bpm = fresh_bpm(db_file, 100);
    let mut relation = BytesRelation { records: Vec::new(), position: 0 };
    let tree = BPlusTree::create(bpm, "rows".to_string(), 0, &mut relation).unwrap();

    for slot in 0..5 {
        tree.insert_entry(IndexKey::Integer(7), RowId { page_id: 1, slot_index: slot }).unwrap();
    }

    let mut scan = BPlusTreeScan::start(&tree, IndexKey::Integer(7), ScanOp::Gte, IndexKey::Integer(7), ScanOp::Lte)
        .unwrap();
    let mut count = 0;
    while scan.scan_next().is_ok() {
        count += 1;
    }
    scan.end().unwrap();

    assert_eq!(count, 5);

    fs::remove_file(db_file).unwrap();
}

#[test]
fn open_with_wrong_relation_name_is_rejected() {
    let db_file = "test_properties_bad_info.db";
    let bpm = fresh_bpm(db_file, 100);

    let meta_page_id = {
        let mut relation = BytesRelation::sequential(10);
        let tree = BPlusTree::create(bpm.clone(), "orders".to_string(), 0, &mut relation).unwrap();
        let meta_page_id = tree.meta_page_id();
        tree.close().unwrap();
        meta_page_id
    };

    let err = BPlusTree::open(bpm, meta_page_id, "not_orders", 0).unwrap_err();
    assert!(matches!(err, IndexError::BadIndexInfo));

    fs::remove_file(db_file).unwrap();
}
