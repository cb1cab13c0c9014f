//! The volume inode and its two-level sparse block index.
//!
//! A volume's logical block space starts out backed by a dense `direct`
//! array living inside the inode itself. Once an insert would index past
//! that array's capacity, [`set_vid`] promotes the inode in place: the
//! direct array is rehomed into a freshly allocated indirect node (an
//! object of its own, kind BTREE) and the inode's index region is
//! reinterpreted as a short list of root entries, each covering one
//! fixed-size chunk of the index space.

use crate::error::{Error, Result};
use crate::limits::{GatewayLimits, MAX_CHILDREN, MAX_VDI_LEN};
use crate::oid::pack_btree;
use crate::store::ObjectStore;

const INDEX_MAGIC: u16 = 0x6274;

/// A pointer stored inside an indirect node: block index → VID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafEntry {
    pub idx: u32,
    pub vid: u32,
}

/// A pointer stored inside the inode's root, once promoted: the highest
/// index covered by `child_oid`'s chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RootEntry {
    pub max_idx: u32,
    pub child_oid: u64,
}

/// Shared header of a root or an indirect node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexHeader {
    pub magic: u16,
    pub depth: u16,
    pub entries: u32,
}

/// An indirect index node: its own on-disk object, holding leaf entries
/// sorted by `idx`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndirectNode {
    pub header: IndexHeader,
    pub entries: Vec<LeafEntry>,
}

impl IndirectNode {
    fn empty() -> Self {
        IndirectNode {
            header: IndexHeader {
                magic: INDEX_MAGIC,
                depth: 1,
                entries: 0,
            },
            entries: Vec::new(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.entries.len() * 8);
        buf.extend_from_slice(&self.header.magic.to_le_bytes());
        buf.extend_from_slice(&self.header.depth.to_le_bytes());
        buf.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for e in &self.entries {
            buf.extend_from_slice(&e.idx.to_le_bytes());
            buf.extend_from_slice(&e.vid.to_le_bytes());
        }
        buf
    }

    fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < 8 {
            return Err(Error::Corrupt("indirect node header truncated"));
        }
        let magic = u16::from_le_bytes([buf[0], buf[1]]);
        if magic != INDEX_MAGIC {
            return Err(Error::Corrupt("bad index header magic"));
        }
        let depth = u16::from_le_bytes([buf[2], buf[3]]);
        let count = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
        let mut entries = Vec::with_capacity(count);
        let mut off = 8;
        for _ in 0..count {
            if off + 8 > buf.len() {
                return Err(Error::Corrupt("indirect node entries truncated"));
            }
            let idx = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
            let vid = u32::from_le_bytes(buf[off + 4..off + 8].try_into().unwrap());
            entries.push(LeafEntry { idx, vid });
            off += 8;
        }
        Ok(IndirectNode {
            header: IndexHeader {
                magic,
                depth,
                entries: count as u32,
            },
            entries,
        })
    }
}

/// The inode's index region, either the dense legacy form (depth 1) or the
/// promoted root form (depth 2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexBody {
    /// `direct[idx]` holds the VID of block `idx` directly. `0` is a hole.
    Direct(Vec<u32>),
    /// Each entry covers one `n_direct`-sized chunk of the index space, in
    /// ascending `max_idx` order.
    Root(Vec<RootEntry>),
}

impl IndexBody {
    pub fn depth(&self) -> u16 {
        match self {
            IndexBody::Direct(_) => 1,
            IndexBody::Root(_) => 2,
        }
    }
}

/// A visited entry of the index tree, for [`walk_index`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexEntry {
    Leaf { idx: u32, vid: u32 },
    Internal { max_idx: u32, child_oid: u64 },
}

/// The volume inode: metadata record plus the root of its sparse index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inode {
    pub name: String,
    pub tag: String,
    pub create_time: u64,
    pub snap_time: u64,
    pub vm_clock_ns: u64,
    pub vdi_size: u64,
    pub vm_state_size: u64,
    pub copy_policy: u8,
    pub store_policy: u8,
    pub nr_copies: u8,
    pub block_size_shift: u8,
    pub snap_id: u32,
    pub vdi_id: u32,
    pub parent_vdi_id: u32,
    pub child_vdi_id: Vec<u32>,
    pub btree_counter: u32,
    pub index: IndexBody,
    pub gref: Vec<(i32, i32)>,
}

impl Inode {
    /// Builds a freshly formatted inode for a new volume: depth-1 index,
    /// no holes filled in, no children.
    pub fn new(name: &str, vdi_id: u32, vdi_size: u64, create_time: u64, limits: &GatewayLimits) -> Self {
        Inode {
            name: name.to_string(),
            tag: String::new(),
            create_time,
            snap_time: 0,
            vm_clock_ns: 0,
            vdi_size,
            vm_state_size: 0,
            copy_policy: 0,
            store_policy: 1,
            nr_copies: 1,
            block_size_shift: 22,
            snap_id: 0,
            vdi_id,
            parent_vdi_id: 0,
            child_vdi_id: vec![0; MAX_CHILDREN],
            btree_counter: 0,
            index: IndexBody::Direct(vec![0; limits.n_direct as usize]),
            gref: vec![(0, 0); limits.n_direct as usize],
        }
    }

    /// Encodes the inode to its on-disk byte representation at `limits`'
    /// scale.
    pub fn to_bytes(&self, limits: &GatewayLimits) -> Vec<u8> {
        let mut buf = Vec::with_capacity(limits.inode_encoded_size() as usize);
        push_fixed_str(&mut buf, &self.name, MAX_VDI_LEN);
        push_fixed_str(&mut buf, &self.tag, MAX_VDI_LEN);
        buf.extend_from_slice(&self.create_time.to_le_bytes());
        buf.extend_from_slice(&self.snap_time.to_le_bytes());
        buf.extend_from_slice(&self.vm_clock_ns.to_le_bytes());
        buf.extend_from_slice(&self.vdi_size.to_le_bytes());
        buf.extend_from_slice(&self.vm_state_size.to_le_bytes());
        buf.push(self.copy_policy);
        buf.push(self.store_policy);
        buf.push(self.nr_copies);
        buf.push(self.block_size_shift);
        buf.extend_from_slice(&self.snap_id.to_le_bytes());
        buf.extend_from_slice(&self.vdi_id.to_le_bytes());
        buf.extend_from_slice(&self.parent_vdi_id.to_le_bytes());
        for &c in &self.child_vdi_id {
            buf.extend_from_slice(&c.to_le_bytes());
        }
        buf.extend_from_slice(&self.index.depth().to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        let root_entries = match &self.index {
            IndexBody::Root(v) => v.len() as u32,
            IndexBody::Direct(_) => 0,
        };
        buf.extend_from_slice(&root_entries.to_le_bytes());
        buf.extend_from_slice(&self.btree_counter.to_le_bytes());

        let mut index_region = vec![0u8; (limits.n_direct * 4) as usize];
        match &self.index {
            IndexBody::Direct(arr) => {
                for (i, &v) in arr.iter().enumerate() {
                    index_region[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
                }
            }
            IndexBody::Root(entries) => {
                let mut off = 0;
                for e in entries {
                    index_region[off..off + 4].copy_from_slice(&e.max_idx.to_le_bytes());
                    index_region[off + 4..off + 12].copy_from_slice(&e.child_oid.to_le_bytes());
                    off += 12;
                }
            }
        }
        buf.extend_from_slice(&index_region);

        for &(gen, count) in &self.gref {
            buf.extend_from_slice(&gen.to_le_bytes());
            buf.extend_from_slice(&count.to_le_bytes());
        }
        buf
    }

    /// Decodes an inode encoded by [`Inode::to_bytes`] at `limits`' scale.
    pub fn from_bytes(buf: &[u8], limits: &GatewayLimits) -> Result<Self> {
        if (buf.len() as u64) < limits.inode_encoded_size() {
            return Err(Error::Corrupt("inode record truncated"));
        }
        let mut off = 0;
        let name = pop_fixed_str(buf, &mut off, MAX_VDI_LEN);
        let tag = pop_fixed_str(buf, &mut off, MAX_VDI_LEN);
        let create_time = pop_u64(buf, &mut off);
        let snap_time = pop_u64(buf, &mut off);
        let vm_clock_ns = pop_u64(buf, &mut off);
        let vdi_size = pop_u64(buf, &mut off);
        let vm_state_size = pop_u64(buf, &mut off);
        let copy_policy = pop_u8(buf, &mut off);
        let store_policy = pop_u8(buf, &mut off);
        let nr_copies = pop_u8(buf, &mut off);
        let block_size_shift = pop_u8(buf, &mut off);
        let snap_id = pop_u32(buf, &mut off);
        let vdi_id = pop_u32(buf, &mut off);
        let parent_vdi_id = pop_u32(buf, &mut off);
        let child_vdi_id = (0..MAX_CHILDREN).map(|_| pop_u32(buf, &mut off)).collect();
        let depth = pop_u16(buf, &mut off);
        let _pad = pop_u16(buf, &mut off);
        let root_entries = pop_u32(buf, &mut off);
        let btree_counter = pop_u32(buf, &mut off);

        let index_region_start = off;
        let index_region_len = (limits.n_direct * 4) as usize;
        let index_region = &buf[index_region_start..index_region_start + index_region_len];
        off += index_region_len;

        let index = match depth {
            1 => {
                let arr = index_region
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
                    .collect();
                IndexBody::Direct(arr)
            }
            2 => {
                let mut entries = Vec::with_capacity(root_entries as usize);
                let mut roff = 0;
                for _ in 0..root_entries {
                    let max_idx =
                        u32::from_le_bytes(index_region[roff..roff + 4].try_into().unwrap());
                    let child_oid =
                        u64::from_le_bytes(index_region[roff + 4..roff + 12].try_into().unwrap());
                    entries.push(RootEntry { max_idx, child_oid });
                    roff += 12;
                }
                IndexBody::Root(entries)
            }
            _ => return Err(Error::Corrupt("impossible index tree depth")),
        };

        let gref = (0..limits.n_direct)
            .map(|_| {
                let gen = pop_i32(buf, &mut off);
                let count = pop_i32(buf, &mut off);
                (gen, count)
            })
            .collect();

        Ok(Inode {
            name,
            tag,
            create_time,
            snap_time,
            vm_clock_ns,
            vdi_size,
            vm_state_size,
            copy_policy,
            store_policy,
            nr_copies,
            block_size_shift,
            snap_id,
            vdi_id,
            parent_vdi_id,
            child_vdi_id,
            btree_counter,
            index,
            gref,
        })
    }
}

fn push_fixed_str(buf: &mut Vec<u8>, s: &str, width: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(width);
    buf.extend_from_slice(&bytes[..n]);
    buf.resize(buf.len() + (width - n), 0);
}

fn pop_fixed_str(buf: &[u8], off: &mut usize, width: usize) -> String {
    let field = &buf[*off..*off + width];
    *off += width;
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn pop_u8(buf: &[u8], off: &mut usize) -> u8 {
    let v = buf[*off];
    *off += 1;
    v
}

fn pop_u16(buf: &[u8], off: &mut usize) -> u16 {
    let v = u16::from_le_bytes(buf[*off..*off + 2].try_into().unwrap());
    *off += 2;
    v
}

fn pop_u32(buf: &[u8], off: &mut usize) -> u32 {
    let v = u32::from_le_bytes(buf[*off..*off + 4].try_into().unwrap());
    *off += 4;
    v
}

fn pop_i32(buf: &[u8], off: &mut usize) -> i32 {
    let v = i32::from_le_bytes(buf[*off..*off + 4].try_into().unwrap());
    *off += 4;
    v
}

fn pop_u64(buf: &[u8], off: &mut usize) -> u64 {
    let v = u64::from_le_bytes(buf[*off..*off + 8].try_into().unwrap());
    *off += 8;
    v
}

fn load_indirect(store: &dyn ObjectStore, oid: u64, limits: &GatewayLimits) -> Result<IndirectNode> {
    let mut buf = vec![0u8; limits.block_size as usize];
    store.read_object(oid, &mut buf, 0)?;
    IndirectNode::from_bytes(&buf)
}

fn store_indirect(
    store: &mut dyn ObjectStore,
    oid: u64,
    node: &IndirectNode,
    limits: &GatewayLimits,
    create: bool,
) -> Result<()> {
    let mut buf = node.to_bytes();
    buf.resize(limits.block_size as usize, 0);
    if create {
        store.create_object(oid, &buf)
    } else {
        store.write_object(oid, &buf, 0, false)
    }
}

fn upsert_leaf(node: &mut IndirectNode, idx: u32, vid: u32) {
    match node.entries.binary_search_by_key(&idx, |e| e.idx) {
        Ok(pos) => {
            if vid == 0 {
                node.entries.remove(pos);
            } else {
                node.entries[pos].vid = vid;
            }
        }
        Err(pos) => {
            if vid != 0 {
                node.entries.insert(pos, LeafEntry { idx, vid });
            }
        }
    }
    node.header.entries = node.entries.len() as u32;
}

/// Promotes a depth-1 inode in place: the direct array is rehomed into a
/// freshly allocated indirect node covering chunk 0, and the index becomes
/// a single-entry root. No-op if already promoted.
fn promote(inode: &mut Inode, store: &mut dyn ObjectStore, limits: &GatewayLimits) -> Result<()> {
    let arr = match &inode.index {
        IndexBody::Direct(_) => {
            match std::mem::replace(&mut inode.index, IndexBody::Root(Vec::new())) {
                IndexBody::Direct(arr) => arr,
                IndexBody::Root(_) => unreachable!("just matched Direct above"),
            }
        }
        IndexBody::Root(_) => return Ok(()),
    };
    let entries: Vec<LeafEntry> = arr
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v != 0)
        .map(|(i, &v)| LeafEntry { idx: i as u32, vid: v })
        .collect();
    let oid = pack_btree(inode.vdi_id, inode.btree_counter);
    inode.btree_counter += 1;
    let node = IndirectNode {
        header: IndexHeader {
            magic: INDEX_MAGIC,
            depth: 1,
            entries: entries.len() as u32,
        },
        entries,
    };
    store_indirect(store, oid, &node, limits, true)?;
    let max_idx = limits.n_direct as u32 - 1;
    inode.index = IndexBody::Root(vec![RootEntry { max_idx, child_oid: oid }]);
    Ok(())
}

/// Looks up the VID backing block `idx`. Returns `0` for a hole.
pub fn get_vid(inode: &Inode, idx: u32, store: &dyn ObjectStore, limits: &GatewayLimits) -> Result<u32> {
    match &inode.index {
        IndexBody::Direct(arr) => Ok(arr.get(idx as usize).copied().unwrap_or(0)),
        IndexBody::Root(entries) => {
            let pos = entries.partition_point(|e| e.max_idx < idx);
            let entry = match entries.get(pos) {
                Some(entry) => entry,
                None => return Ok(0),
            };
            let chunk_start = entry.max_idx as u64 + 1 - limits.n_direct;
            if (idx as u64) < chunk_start {
                return Ok(0);
            }
            let node = load_indirect(store, entry.child_oid, limits)?;
            Ok(node
                .entries
                .binary_search_by_key(&idx, |e| e.idx)
                .ok()
                .map(|p| node.entries[p].vid)
                .unwrap_or(0))
        }
    }
}

/// Assigns `vid` to block `idx`, promoting the index and/or allocating a
/// new indirect node as needed. Setting the same value again is a no-op
/// that still touches the same slot (the caller is expected to re-persist
/// the inode regardless).
pub fn set_vid(
    inode: &mut Inode,
    idx: u32,
    vid: u32,
    store: &mut dyn ObjectStore,
    limits: &GatewayLimits,
) -> Result<()> {
    if let IndexBody::Direct(arr) = &mut inode.index {
        if (idx as u64) < limits.n_direct {
            if (idx as usize) >= arr.len() {
                arr.resize(limits.n_direct as usize, 0);
            }
            arr[idx as usize] = vid;
            return Ok(());
        }
        promote(inode, store, limits)?;
    }

    let chunk_index = idx as u64 / limits.n_direct;
    let chunk_max_idx = (((chunk_index + 1) * limits.n_direct) - 1) as u32;
    let entries = match &mut inode.index {
        IndexBody::Root(e) => e,
        IndexBody::Direct(_) => unreachable!("promoted above"),
    };
    match entries.binary_search_by_key(&chunk_max_idx, |e| e.max_idx) {
        Ok(pos) => {
            let child_oid = entries[pos].child_oid;
            let mut node = load_indirect(store, child_oid, limits)?;
            upsert_leaf(&mut node, idx, vid);
            store_indirect(store, child_oid, &node, limits, false)?;
        }
        Err(pos) => {
            let oid = pack_btree(inode.vdi_id, inode.btree_counter);
            inode.btree_counter += 1;
            let mut node = IndirectNode::empty();
            if vid != 0 {
                node.entries.push(LeafEntry { idx, vid });
                node.header.entries = 1;
            }
            store_indirect(store, oid, &node, limits, true)?;
            let entries = match &mut inode.index {
                IndexBody::Root(e) => e,
                IndexBody::Direct(_) => unreachable!("promoted above"),
            };
            entries.insert(pos, RootEntry { max_idx: chunk_max_idx, child_oid: oid });
        }
    }
    Ok(())
}

/// Assigns `vid` to every block in `start..=end`. Used by volume
/// formatting.
pub fn set_vid_range(
    inode: &mut Inode,
    start: u32,
    end: u32,
    vid: u32,
    store: &mut dyn ObjectStore,
    limits: &GatewayLimits,
) -> Result<()> {
    for idx in start..=end {
        set_vid(inode, idx, vid, store, limits)?;
    }
    Ok(())
}

/// Visits every `(idx, vid)` pair reachable from `inode`'s index, in
/// ascending `idx` order, plus an `Internal` entry per root pointer when
/// the index has been promoted. Most callers only care about `Leaf`.
pub fn walk_index(
    inode: &Inode,
    store: &dyn ObjectStore,
    limits: &GatewayLimits,
    mut visit: impl FnMut(IndexEntry),
) -> Result<()> {
    match &inode.index {
        IndexBody::Direct(arr) => {
            for (i, &v) in arr.iter().enumerate() {
                if v != 0 {
                    visit(IndexEntry::Leaf { idx: i as u32, vid: v });
                }
            }
        }
        IndexBody::Root(entries) => {
            for e in entries {
                visit(IndexEntry::Internal { max_idx: e.max_idx, child_oid: e.child_oid });
                let node = load_indirect(store, e.child_oid, limits)?;
                for leaf in &node.entries {
                    if leaf.vid != 0 {
                        visit(IndexEntry::Leaf { idx: leaf.idx, vid: leaf.vid });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Options for [`inode_write`]; folds the source's `flags`/`create`/
/// `direct` parameters into the one bit the abstract `ObjectStore` trait
/// actually needs.
#[derive(Clone, Copy, Debug, Default)]
pub struct InodeWriteOptions {
    pub create: bool,
}

/// Loads volume `vid`'s inode from the backing store.
pub fn load_inode(store: &dyn ObjectStore, vid: u32, limits: &GatewayLimits) -> Result<Inode> {
    let mut buf = vec![0u8; limits.inode_encoded_size() as usize];
    store.read_object(crate::oid::pack_inode(vid), &mut buf, 0)?;
    Inode::from_bytes(&buf, limits)
}

/// Persists `inode` through the backing store.
pub fn inode_write(
    inode: &Inode,
    store: &mut dyn ObjectStore,
    limits: &GatewayLimits,
    opts: InodeWriteOptions,
) -> Result<()> {
    let oid = crate::oid::pack_inode(inode.vdi_id);
    let bytes = inode.to_bytes(limits);
    if opts.create {
        store.create_object(oid, &bytes)
    } else {
        store.write_object(oid, &bytes, 0, false)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::InMemoryStore;

    fn test_limits() -> GatewayLimits {
        GatewayLimits::scaled(256, 8)
    }

    #[test]
    fn get_set_round_trip() {
        let limits = test_limits();
        let mut store = InMemoryStore::new();
        let mut inode = Inode::new("vol", 1, 1 << 40, 0, &limits);
        set_vid(&mut inode, 3, 42, &mut store, &limits).unwrap();
        assert_eq!(get_vid(&inode, 3, &store, &limits).unwrap(), 42);
        assert_eq!(get_vid(&inode, 4, &store, &limits).unwrap(), 0);
    }

    #[test]
    fn set_vid_range_covers_inclusive_bounds() {
        let limits = test_limits();
        let mut store = InMemoryStore::new();
        let mut inode = Inode::new("vol", 1, 1 << 40, 0, &limits);
        set_vid_range(&mut inode, 1, 4, 7, &mut store, &limits).unwrap();
        for idx in 1..=4 {
            assert_eq!(get_vid(&inode, idx, &store, &limits).unwrap(), 7);
        }
        assert_eq!(get_vid(&inode, 0, &store, &limits).unwrap(), 0);
        assert_eq!(get_vid(&inode, 5, &store, &limits).unwrap(), 0);
    }

    #[test]
    fn promotion_round_trip_matches_reference_map() {
        let limits = test_limits();
        let mut store = InMemoryStore::new();
        let mut inode = Inode::new("vol", 1, 1 << 40, 0, &limits);
        let mut reference = std::collections::BTreeMap::new();

        for (idx, vid) in [(0u32, 11u32), (2, 22), (5, 55), (9, 99), (17, 171)] {
            set_vid(&mut inode, idx, vid, &mut store, &limits).unwrap();
            reference.insert(idx, vid);
        }

        assert_eq!(inode.index.depth(), 2, "insert beyond n_direct must promote");

        let mut walked = std::collections::BTreeMap::new();
        walk_index(&inode, &store, &limits, |e| {
            if let IndexEntry::Leaf { idx, vid } = e {
                walked.insert(idx, vid);
            }
        })
        .unwrap();
        assert_eq!(walked, reference);

        for (&idx, &vid) in &reference {
            assert_eq!(get_vid(&inode, idx, &store, &limits).unwrap(), vid);
        }
    }

    #[test]
    fn setting_zero_clears_a_promoted_leaf() {
        let limits = test_limits();
        let mut store = InMemoryStore::new();
        let mut inode = Inode::new("vol", 1, 1 << 40, 0, &limits);
        set_vid(&mut inode, 20, 5, &mut store, &limits).unwrap();
        assert_eq!(get_vid(&inode, 20, &store, &limits).unwrap(), 5);
        set_vid(&mut inode, 20, 0, &mut store, &limits).unwrap();
        assert_eq!(get_vid(&inode, 20, &store, &limits).unwrap(), 0);
    }

    #[test]
    fn encode_decode_round_trip() {
        let limits = test_limits();
        let mut store = InMemoryStore::new();
        let mut inode = Inode::new("myvol", 3, 1 << 30, 123, &limits);
        set_vid(&mut inode, 1, 9, &mut store, &limits).unwrap();
        let bytes = inode.to_bytes(&limits);
        let decoded = Inode::from_bytes(&bytes, &limits).unwrap();
        assert_eq!(decoded.name, "myvol");
        assert_eq!(decoded.vdi_id, 3);
        assert_eq!(decoded.create_time, 123);
        assert_eq!(get_vid(&decoded, 1, &store, &limits).unwrap(), 9);
    }

    #[test]
    fn inode_write_persists_through_the_store() {
        let limits = test_limits();
        let mut store = InMemoryStore::new();
        let inode = Inode::new("vol", 7, 1 << 30, 0, &limits);
        inode_write(&inode, &mut store, &limits, InodeWriteOptions { create: true }).unwrap();
        let mut buf = vec![0u8; limits.inode_encoded_size() as usize];
        store
            .read_object(crate::oid::pack_inode(7), &mut buf, 0)
            .unwrap();
        let decoded = Inode::from_bytes(&buf, &limits).unwrap();
        assert_eq!(decoded.vdi_id, 7);
    }
}
