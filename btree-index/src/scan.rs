//! Range scans over the leaf sibling chain.
//!
//! Between `start` and `end`, exactly one leaf page is pinned at any given
//! moment. Each [`BPlusTreeScan`] only stores the pinned page's id, not a
//! live guard, since a guard borrowing from the same `Arc<dyn
//! BufferPoolManager>` this struct also owns would be self-referential. The
//! pin is instead tracked manually: a guard is fetched and its backing byte
//! buffer released via `PageGuard::leak_pin` (keeping the pool's pin count
//! incremented without a borrow outliving this function, and without
//! stranding the guard's private page copy), and the matching decrement
//! happens later via an explicit `unpin_page` call.
use std::cmp::Ordering;
use std::ops::DerefMut;
use std::sync::Arc;

use buffer_pool_manager::api::{BufferPoolManager, PageGuard, PageId, INVALID_PAGE_ID};

use crate::bptree::BPlusTree;
use crate::error::IndexError;
use crate::key::{IndexKey, KeyType};
use crate::node::BPlusTreeNode;
use crate::relation::RowId;

/// A scan comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOp {
    /// Strictly greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Strictly less than.
    Lt,
    /// Less than or equal to.
    Lte,
}

/// A positioned range scan over a [`BPlusTree`]'s leaf chain.
pub struct BPlusTreeScan {
    bpm: Arc<dyn BufferPoolManager>,
    key_type: KeyType,
    active: bool,
    current_leaf: Option<PageId>,
    next_entry: usize,
    high_val: IndexKey,
    high_op: ScanOp,
}

impl BPlusTreeScan {
    /// Starts a range scan over `tree`. `low_op` must be [`ScanOp::Gt`] or
    /// [`ScanOp::Gte`], and `high_op` must be [`ScanOp::Lt`] or
    /// [`ScanOp::Lte`]; any other combination is [`IndexError::BadOpcodes`].
    /// `low_val` must not exceed `high_val`.
    pub fn start(
        tree: &BPlusTree,
        low_val: IndexKey,
        low_op: ScanOp,
        high_val: IndexKey,
        high_op: ScanOp,
    ) -> Result<Self, IndexError> {
        if !matches!(low_op, ScanOp::Gt | ScanOp::Gte) || !matches!(high_op, ScanOp::Lt | ScanOp::Lte) {
            return Err(IndexError::BadOpcodes);
        }
        if low_val.compare(&high_val) == Ordering::Greater {
            return Err(IndexError::BadScanRange);
        }

        let bpm = tree.bpm();
        let key_type = tree.key_type();
        let (mut leaf_page_id, _) = tree.descend_to_leaf(&low_val)?;

        loop {
            let mut guard = bpm.fetch_page(leaf_page_id)?;
            let leaf = BPlusTreeNode::new(guard.deref_mut(), key_type);

            let count = leaf.key_count() as usize;
            let index = position_in_leaf(&leaf, &low_val, low_op);
            let next_leaf_page_id = leaf.next_leaf();
            drop(leaf);

            if index < count {
                guard.leak_pin();
                return Ok(Self {
                    bpm,
                    key_type,
                    active: true,
                    current_leaf: Some(leaf_page_id),
                    next_entry: index,
                    high_val,
                    high_op,
                });
            }

            drop(guard);
            if next_leaf_page_id == INVALID_PAGE_ID {
                return Ok(Self {
                    bpm,
                    key_type,
                    active: true,
                    current_leaf: None,
                    next_entry: 0,
                    high_val,
                    high_op,
                });
            }
            leaf_page_id = next_leaf_page_id;
        }
    }

    /// Returns the next matching RowId, or [`IndexError::IndexScanCompleted`]
    /// once the high bound has been passed or the leaf chain is exhausted.
    pub fn scan_next(&mut self) -> Result<RowId, IndexError> {
        if !self.active {
            return Err(IndexError::ScanNotInitialized);
        }
        let Some(leaf_page_id) = self.current_leaf else {
            return Err(IndexError::IndexScanCompleted);
        };

        let mut guard = self.bpm.fetch_page(leaf_page_id)?;
        let leaf = BPlusTreeNode::new(guard.deref_mut(), self.key_type);

        let key = leaf.get_key(self.next_entry);
        if self.exceeds_high(&key) {
            drop(leaf);
            drop(guard);
            self.bpm.unpin_page(leaf_page_id, false)?;
            self.current_leaf = None;
            return Err(IndexError::IndexScanCompleted);
        }

        let rid = leaf.get_value(self.next_entry);
        let count = leaf.key_count() as usize;
        let next_index = self.next_entry + 1;
        let next_leaf_page_id = leaf.next_leaf();
        drop(leaf);
        drop(guard);

        if next_index < count {
            self.next_entry = next_index;
            return Ok(rid);
        }

        self.bpm.unpin_page(leaf_page_id, false)?;
        if next_leaf_page_id == INVALID_PAGE_ID {
            self.current_leaf = None;
        } else {
            let sibling_guard = self.bpm.fetch_page(next_leaf_page_id)?;
            sibling_guard.leak_pin();
            self.current_leaf = Some(next_leaf_page_id);
            self.next_entry = 0;
        }

        Ok(rid)
    }

    /// Ends the scan, releasing the pinned leaf if one is held.
    pub fn end(&mut self) -> Result<(), IndexError> {
        if !self.active {
            return Err(IndexError::ScanNotInitialized);
        }
        if let Some(leaf_page_id) = self.current_leaf.take() {
            self.bpm.unpin_page(leaf_page_id, false)?;
        }
        self.active = false;
        Ok(())
    }

    fn exceeds_high(&self, key: &IndexKey) -> bool {
        match self.high_op {
            ScanOp::Lt => key.compare(&self.high_val) != Ordering::Less,
            ScanOp::Lte => key.compare(&self.high_val) == Ordering::Greater,
            _ => unreachable!("high_op is validated to be Lt or Lte in start()"),
        }
    }
}

impl Drop for BPlusTreeScan {
    fn drop(&mut self) {
        if let Some(leaf_page_id) = self.current_leaf.take() {
            let _ = self.bpm.unpin_page(leaf_page_id, false);
        }
    }
}

/// Finds the first index in `leaf` satisfying `low_op` relative to
/// `low_val`. Keys are sorted, so the predicate is monotonic and the first
/// index where it holds is where it holds from then on.
fn position_in_leaf(leaf: &BPlusTreeNode, low_val: &IndexKey, low_op: ScanOp) -> usize {
    let count = leaf.key_count() as usize;
    for i in 0..count {
        let key = leaf.get_key(i);
        let keep = match low_op {
            ScanOp::Gt => key.compare(low_val) == Ordering::Greater,
            ScanOp::Gte => key.compare(low_val) != Ordering::Less,
            _ => unreachable!("low_op is validated to be Gt or Gte in start()"),
        };
        if keep {
            return i;
        }
    }
    count
}
