//! The B+ tree engine: descent, insertion with propagated splits, point
//! search, and the bulk-load path used to build an index over an existing
//! relation.
use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use buffer_pool_manager::api::{BufferPoolManager, PageId, PAGE_SIZE};

use crate::error::IndexError;
use crate::key::{IndexKey, KeyType};
use crate::metadata::IndexMetadata;
use crate::node::BPlusTreeNode;
use crate::relation::{RelationScan, RelationScanError, RowId};

/// The page id the metadata page is always allocated at on a freshly
/// created index, and thus the fixed id `construct` probes to decide
/// whether an index already exists for a given buffer pool manager.
const META_PAGE_ID: PageId = 1;

/// A disk-backed B+ tree index over a single fixed-width key column.
pub struct BPlusTree {
    bpm: Arc<dyn BufferPoolManager>,
    metadata_page_id: PageId,
    relation_name: String,
    attr_byte_offset: u32,
    key_type: KeyType,
    leaf_max_size: u16,
    internal_max_size: u16,
}

impl BPlusTree {
    /// Constructs an index over `relation_name`, probing whether one
    /// already exists and opening it if so, or bulk-loading a new one from
    /// `scan` otherwise. Also returns the canonical index name
    /// `"<relation_name>.<attr_byte_offset>"`. Callers that already know
    /// which path they want can still call `open`/`create` directly; this
    /// is the single entry point for the common "construct" case where the
    /// decision belongs to the index, not the caller.
    pub fn construct<S: RelationScan>(
        bpm: Arc<dyn BufferPoolManager>,
        relation_name: String,
        attr_byte_offset: u32,
        scan: &mut S,
    ) -> Result<(Self, String), IndexError> {
        let index_name = format!("{relation_name}.{attr_byte_offset}");

        let tree = match bpm.fetch_page(META_PAGE_ID) {
            Ok(meta_page) => {
                drop(meta_page);
                Self::open(bpm, META_PAGE_ID, &relation_name, attr_byte_offset)?
            }
            Err(_) => Self::create(bpm, relation_name, attr_byte_offset, scan)?,
        };

        Ok((tree, index_name))
    }

    /// Builds a new index from scratch, bulk-loading it from `scan` by
    /// reading the indexed attribute out of each record at
    /// `attr_byte_offset`.
    pub fn create<S: RelationScan>(
        bpm: Arc<dyn BufferPoolManager>,
        relation_name: String,
        attr_byte_offset: u32,
        scan: &mut S,
    ) -> Result<Self, IndexError> {
        let key_type = KeyType::Integer;

        let mut metadata_page = bpm.new_page()?;
        let metadata_page_id = metadata_page.page_id();

        let mut root_page = bpm.new_page()?;
        let root_page_id = root_page.page_id();
        {
            let mut root_node = BPlusTreeNode::new(root_page.deref_mut(), key_type);
            root_node.initialize(root_page_id, true);
        }
        drop(root_page);

        let metadata = IndexMetadata::new(root_page_id, relation_name.clone(), attr_byte_offset, key_type, PAGE_SIZE);
        let serialized = metadata.serialize();
        metadata_page.deref_mut()[0..serialized.len()].copy_from_slice(&serialized);
        drop(metadata_page);

        let tree = Self {
            bpm,
            metadata_page_id,
            relation_name,
            attr_byte_offset,
            key_type,
            leaf_max_size: metadata.leaf_max_size,
            internal_max_size: metadata.internal_max_size,
        };

        loop {
            match scan.scan_next() {
                Ok(rid) => {
                    let attr_bytes = &scan.get_record()[attr_byte_offset as usize..];
                    let key = IndexKey::deserialize(attr_bytes, &key_type);
                    tree.insert_entry(key, rid)?;
                }
                Err(RelationScanError::EndOfFile) => break,
            }
        }

        Ok(tree)
    }

    /// Opens an existing index, verifying the persisted metadata matches
    /// the caller-supplied relation name and attribute offset.
    pub fn open(
        bpm: Arc<dyn BufferPoolManager>,
        metadata_page_id: PageId,
        relation_name: &str,
        attr_byte_offset: u32,
    ) -> Result<Self, IndexError> {
        let metadata = Self::load_metadata_at(&bpm, metadata_page_id)?;

        if metadata.relation_name != relation_name || metadata.attr_byte_offset != attr_byte_offset {
            return Err(IndexError::BadIndexInfo);
        }

        Ok(Self {
            bpm,
            metadata_page_id,
            relation_name: metadata.relation_name,
            attr_byte_offset: metadata.attr_byte_offset,
            key_type: metadata.key_type,
            leaf_max_size: metadata.leaf_max_size,
            internal_max_size: metadata.internal_max_size,
        })
    }

    /// Flushes every page this index has touched.
    pub fn close(&self) -> Result<(), IndexError> {
        self.bpm.flush_all_pages()?;
        Ok(())
    }

    /// Returns the current root page id, read fresh from the metadata page.
    pub fn root_page_id(&self) -> Result<PageId, IndexError> {
        Ok(self.load_metadata()?.root_page_id)
    }

    /// Returns the page id of this index's metadata page.
    pub fn meta_page_id(&self) -> PageId {
        self.metadata_page_id
    }

    /// Returns the name of the relation this index was built over.
    pub fn relation_name(&self) -> &str {
        &self.relation_name
    }

    pub(crate) fn bpm(&self) -> Arc<dyn BufferPoolManager> {
        self.bpm.clone()
    }

    pub(crate) fn key_type(&self) -> KeyType {
        self.key_type
    }

    fn load_metadata(&self) -> Result<IndexMetadata, IndexError> {
        Self::load_metadata_at(&self.bpm, self.metadata_page_id)
    }

    fn load_metadata_at(bpm: &Arc<dyn BufferPoolManager>, metadata_page_id: PageId) -> Result<IndexMetadata, IndexError> {
        let metadata_page = bpm.fetch_page(metadata_page_id)?;
        let metadata = IndexMetadata::deserialize(metadata_page.deref());
        Ok(metadata)
    }

    fn update_root(&self, new_root_page_id: PageId) -> Result<(), IndexError> {
        let mut metadata = self.load_metadata()?;
        metadata.root_page_id = new_root_page_id;

        let mut metadata_page = self.bpm.fetch_page(self.metadata_page_id)?;
        let serialized = metadata.serialize();
        metadata_page.deref_mut()[0..serialized.len()].copy_from_slice(&serialized);
        Ok(())
    }

    /// Walks from the root to the leaf that would contain `key`, recording
    /// the page ids of every internal node visited along the way. The
    /// ancestor path lets a split propagate upward without needing parent
    /// pointers stored in each node.
    pub(crate) fn descend_to_leaf(&self, key: &IndexKey) -> Result<(PageId, Vec<PageId>), IndexError> {
        let metadata = self.load_metadata()?;
        let mut current_page_id = metadata.root_page_id;
        let mut ancestors = Vec::new();

        loop {
            let mut page_guard = self.bpm.fetch_page(current_page_id)?;
            let node = BPlusTreeNode::new(page_guard.deref_mut(), self.key_type);

            if node.is_leaf() {
                drop(node);
                drop(page_guard);
                return Ok((current_page_id, ancestors));
            }

            let child_index = match node.binary_search(key) {
                Ok(i) => i + 1,
                Err(i) => i,
            };
            let child_page_id = node.get_child(child_index);
            drop(node);
            drop(page_guard);

            ancestors.push(current_page_id);
            current_page_id = child_page_id;
        }
    }

    /// Looks up a single key, returning the RowId it maps to.
    pub fn search(&self, key: &IndexKey) -> Result<RowId, IndexError> {
        let (leaf_page_id, _) = self.descend_to_leaf(key)?;

        let mut leaf_guard = self.bpm.fetch_page(leaf_page_id)?;
        let leaf = BPlusTreeNode::new(leaf_guard.deref_mut(), self.key_type);

        match leaf.binary_search(key) {
            Ok(index) => Ok(leaf.get_value(index)),
            Err(_) => Err(IndexError::NoSuchKeyFound),
        }
    }

    /// Inserts a key/RowId pair. Duplicate keys are permitted and simply
    /// add another entry.
    pub fn insert_entry(&self, key: IndexKey, rid: RowId) -> Result<(), IndexError> {
        let (leaf_page_id, ancestors) = self.descend_to_leaf(&key)?;

        let mut leaf_guard = self.bpm.fetch_page(leaf_page_id)?;
        let mut leaf = BPlusTreeNode::new(leaf_guard.deref_mut(), self.key_type);

        let insert_index = match leaf.binary_search(&key) {
            Ok(i) => i + 1,
            Err(i) => i,
        };

        if !leaf.is_full(self.leaf_max_size) {
            leaf.insert_at(insert_index, &key, rid);
            return Ok(());
        }

        drop(leaf);
        drop(leaf_guard);
        self.split_leaf_and_insert(leaf_page_id, key, rid, ancestors)
    }

    fn split_leaf_and_insert(
        &self,
        leaf_page_id: PageId,
        key: IndexKey,
        rid: RowId,
        ancestors: Vec<PageId>,
    ) -> Result<(), IndexError> {
        let mut old_guard = self.bpm.fetch_page(leaf_page_id)?;
        let mut new_guard = self.bpm.new_page()?;
        let new_leaf_page_id = new_guard.page_id();

        let old_count = {
            let old_node = BPlusTreeNode::new(old_guard.deref_mut(), self.key_type);
            old_node.key_count() as usize
        };
        let split_point = old_count / 2;

        {
            let mut new_node = BPlusTreeNode::new(new_guard.deref_mut(), self.key_type);
            new_node.initialize(new_leaf_page_id, true);
        }

        let moved: Vec<(IndexKey, RowId)> = {
            let old_node = BPlusTreeNode::new(old_guard.deref_mut(), self.key_type);
            (split_point..old_count).map(|i| (old_node.get_key(i), old_node.get_value(i))).collect()
        };

        {
            let mut new_node = BPlusTreeNode::new(new_guard.deref_mut(), self.key_type);
            for (i, (k, v)) in moved.iter().enumerate() {
                new_node.insert_at(i, k, *v);
            }
        }

        let old_next_leaf = {
            let mut old_node = BPlusTreeNode::new(old_guard.deref_mut(), self.key_type);
            let next = old_node.next_leaf();
            old_node.set_key_count(split_point as u16);
            next
        };

        {
            let mut new_node = BPlusTreeNode::new(new_guard.deref_mut(), self.key_type);
            new_node.set_next_leaf(old_next_leaf);
        }
        {
            let mut old_node = BPlusTreeNode::new(old_guard.deref_mut(), self.key_type);
            old_node.set_next_leaf(new_leaf_page_id);
        }

        let split_key = {
            let new_node = BPlusTreeNode::new(new_guard.deref_mut(), self.key_type);
            new_node.get_key(0)
        };

        let target_is_new_leaf = key.compare(&split_key) != Ordering::Less;
        if target_is_new_leaf {
            let mut new_node = BPlusTreeNode::new(new_guard.deref_mut(), self.key_type);
            let insert_index = match new_node.binary_search(&key) {
                Ok(i) => i + 1,
                Err(i) => i,
            };
            new_node.insert_at(insert_index, &key, rid);
        } else {
            let mut old_node = BPlusTreeNode::new(old_guard.deref_mut(), self.key_type);
            let insert_index = match old_node.binary_search(&key) {
                Ok(i) => i + 1,
                Err(i) => i,
            };
            old_node.insert_at(insert_index, &key, rid);
        }

        drop(old_guard);
        drop(new_guard);

        self.insert_into_parent(leaf_page_id, split_key, new_leaf_page_id, ancestors, 0)
    }

    /// Propagates a split's promoted key up the recorded ancestor path,
    /// splitting internal nodes as needed and finally replacing the root if
    /// the split reaches the top of the tree.
    fn insert_into_parent(
        &self,
        left_page_id: PageId,
        up_key: IndexKey,
        right_page_id: PageId,
        mut ancestors: Vec<PageId>,
        child_level: u32,
    ) -> Result<(), IndexError> {
        let Some(parent_page_id) = ancestors.pop() else {
            return self.replace_root(left_page_id, up_key, right_page_id, child_level);
        };

        let mut parent_guard = self.bpm.fetch_page(parent_page_id)?;
        let mut parent = BPlusTreeNode::new(parent_guard.deref_mut(), self.key_type);

        if !parent.is_full(self.internal_max_size) {
            let insert_index = match parent.binary_search(&up_key) {
                Ok(i) => i + 1,
                Err(i) => i,
            };
            parent.insert_key_child(insert_index, &up_key, right_page_id);
            return Ok(());
        }

        let level = parent.level();
        drop(parent);
        drop(parent_guard);

        let (median_key, new_sibling_page_id) =
            self.split_internal_with_new_entry(parent_page_id, up_key, right_page_id)?;

        self.insert_into_parent(parent_page_id, median_key, new_sibling_page_id, ancestors, level)
    }

    /// Splits a full internal node after logically inserting `up_key` and
    /// `right_child` into its sorted key/child sequence, then promotes the
    /// median of the combined sequence.
    fn split_internal_with_new_entry(
        &self,
        old_page_id: PageId,
        up_key: IndexKey,
        right_child: PageId,
    ) -> Result<(IndexKey, PageId), IndexError> {
        let mut old_guard = self.bpm.fetch_page(old_page_id)?;

        let (mut keys, mut children, level, n_int) = {
            let old_node = BPlusTreeNode::new(old_guard.deref_mut(), self.key_type);
            let n = old_node.key_count() as usize;
            let keys: Vec<IndexKey> = (0..n).map(|i| old_node.get_key(i)).collect();
            let children: Vec<PageId> = (0..=n).map(|i| old_node.get_child(i)).collect();
            (keys, children, old_node.level(), n)
        };

        let pos = match keys.binary_search_by(|k| k.compare(&up_key)) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        keys.insert(pos, up_key);
        children.insert(pos + 1, right_child);

        // Median position is taken over the combined N_INT+1-key sequence,
        // at N_INT/2 using the pre-insertion key count.
        let median_idx = n_int / 2;
        let median_key = keys[median_idx];

        let left_keys = &keys[..median_idx];
        let left_children = &children[..=median_idx];
        let right_keys = &keys[median_idx + 1..];
        let right_children = &children[median_idx + 1..];

        {
            let mut old_node = BPlusTreeNode::new(old_guard.deref_mut(), self.key_type);
            old_node.set_key_count(0);
            old_node.set_child(0, left_children[0]);
            for (i, k) in left_keys.iter().enumerate() {
                old_node.insert_key_child(i, k, left_children[i + 1]);
            }
        }
        drop(old_guard);

        let mut new_guard = self.bpm.new_page()?;
        let new_page_id = new_guard.page_id();
        {
            let mut new_node = BPlusTreeNode::new(new_guard.deref_mut(), self.key_type);
            new_node.initialize(new_page_id, false);
            new_node.set_level(level);
            new_node.set_child(0, right_children[0]);
            for (i, k) in right_keys.iter().enumerate() {
                new_node.insert_key_child(i, k, right_children[i + 1]);
            }
        }
        drop(new_guard);

        Ok((median_key, new_page_id))
    }

    /// Allocates a brand new root above `left_page_id`/`right_page_id` when
    /// a split has propagated past the top of the tree.
    fn replace_root(
        &self,
        left_page_id: PageId,
        up_key: IndexKey,
        right_page_id: PageId,
        child_level: u32,
    ) -> Result<(), IndexError> {
        let mut new_root_guard = self.bpm.new_page()?;
        let new_root_page_id = new_root_guard.page_id();

        let mut new_root = BPlusTreeNode::new(new_root_guard.deref_mut(), self.key_type);
        new_root.initialize(new_root_page_id, false);
        new_root.set_level(child_level + 1);
        new_root.set_child(0, left_page_id);
        new_root.insert_key_child(0, &up_key, right_page_id);
        drop(new_root);
        drop(new_root_guard);

        self.update_root(new_root_page_id)
    }

    /// Finds the leftmost leaf in the tree, the starting point for a
    /// full forward scan.
    pub(crate) fn find_leftmost_leaf(&self) -> Result<PageId, IndexError> {
        let metadata = self.load_metadata()?;
        let mut current_page_id = metadata.root_page_id;

        loop {
            let mut page_guard = self.bpm.fetch_page(current_page_id)?;
            let node = BPlusTreeNode::new(page_guard.deref_mut(), self.key_type);

            if node.is_leaf() {
                drop(node);
                drop(page_guard);
                return Ok(current_page_id);
            }

            let child = node.get_child(0);
            drop(node);
            drop(page_guard);
            current_page_id = child;
        }
    }
}

impl Drop for BPlusTree {
    fn drop(&mut self) {
        let _ = self.bpm.flush_all_pages();
    }
}
