//! Open-addressed bucket placement inside an account's hyper-volume.
//!
//! A bucket record is a fixed-size [`BucketInode`] slot; insertion and
//! deletion both probe `(h + i) mod max_buckets`, treating a fully
//! occupied data object as a unit to skip over (a full object, by
//! construction, contains no hole to land on).

use crate::error::{Error, Result};
use crate::inode::{get_vid, inode_write, set_vid, Inode, InodeWriteOptions};
use crate::limits::GatewayLimits;
use crate::oalloc::Allocator;
use crate::oid::pack_data;
use crate::store::ObjectStore;

/// A bucket's directory entry, one slot among `buckets_per_obj` packed
/// into each data object of the account volume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketInode {
    pub bucket_name: String,
    pub obj_count: u64,
    pub bytes_used: u64,
    /// VID of the hyper-volume holding this bucket's onode index. `0`
    /// means the slot is free.
    pub onode_vid: u32,
    /// VID of the hyper-volume holding this bucket's object payloads.
    pub data_vid: u32,
}

impl BucketInode {
    fn free() -> Self {
        BucketInode {
            bucket_name: String::new(),
            obj_count: 0,
            bytes_used: 0,
            onode_vid: 0,
            data_vid: 0,
        }
    }

    pub fn is_free(&self) -> bool {
        self.onode_vid == 0
    }

    pub(crate) fn to_bytes(&self, limits: &GatewayLimits) -> Vec<u8> {
        let mut buf = vec![0u8; limits.bucket_inode_size() as usize];
        let name = self.bucket_name.as_bytes();
        let n = name.len().min(limits.max_bucket_name);
        buf[..n].copy_from_slice(&name[..n]);
        let mut off = limits.max_bucket_name;
        buf[off..off + 8].copy_from_slice(&self.obj_count.to_le_bytes());
        off += 8;
        buf[off..off + 8].copy_from_slice(&self.bytes_used.to_le_bytes());
        off += 8;
        buf[off..off + 4].copy_from_slice(&self.onode_vid.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.data_vid.to_le_bytes());
        buf
    }

    pub(crate) fn from_bytes(buf: &[u8], limits: &GatewayLimits) -> Self {
        let name_field = &buf[..limits.max_bucket_name];
        let end = name_field.iter().position(|&b| b == 0).unwrap_or(name_field.len());
        let bucket_name = String::from_utf8_lossy(&name_field[..end]).into_owned();
        let mut off = limits.max_bucket_name;
        let obj_count = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
        off += 8;
        let bytes_used = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
        off += 8;
        let onode_vid = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let data_vid = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        BucketInode { bucket_name, obj_count, bytes_used, onode_vid, data_vid }
    }
}

/// Outcome of a single-slot bucket insertion attempt.
pub enum AddOutcome {
    Created { slot: u64, onode_vid: u32, data_vid: u32 },
    ObjectFull,
}

/// Reads the data object backing `data_index` of `account_inode`'s index,
/// or an all-free buffer if that slot is still a hole.
fn read_bucket_data_object(
    account_inode: &Inode,
    data_index: u64,
    store: &dyn ObjectStore,
    limits: &GatewayLimits,
) -> Result<(Vec<u8>, bool)> {
    let vid = get_vid(account_inode, data_index as u32, store, limits)?;
    let mut buf = vec![0u8; limits.block_size as usize];
    if vid == 0 {
        Ok((buf, true))
    } else {
        let oid = pack_data(account_inode.vdi_id, data_index as u32);
        store.read_object(oid, &mut buf, 0)?;
        Ok((buf, false))
    }
}

/// Attempts to place `bucket_name` at probe slot `idx`. On success, creates
/// the bucket's two child hyper-volumes and initializes their allocator.
pub fn add_bucket(
    account_inode: &mut Inode,
    idx: u64,
    bucket_name: &str,
    store: &mut dyn ObjectStore,
    allocator: &mut Allocator,
    limits: &GatewayLimits,
) -> Result<AddOutcome> {
    let buckets_per_obj = limits.buckets_per_obj();
    let data_index = idx / buckets_per_obj;
    let offset = (idx % buckets_per_obj) as usize;
    let slot_size = limits.bucket_inode_size() as usize;

    let (mut buf, needs_create) = read_bucket_data_object(account_inode, data_index, store, limits)?;

    let mut found = None;
    for i in offset..buckets_per_obj as usize {
        let rec = BucketInode::from_bytes(&buf[i * slot_size..(i + 1) * slot_size], limits);
        if rec.is_free() {
            found = Some(i);
            break;
        }
    }
    let i = match found {
        Some(i) => i,
        None => return Ok(AddOutcome::ObjectFull),
    };

    let onode_vol = format!("{}/{}", account_inode.name, bucket_name);
    let data_vol = format!("{}/{}/allocator", account_inode.name, bucket_name);
    let onode_vid = store.new_volume(
        &onode_vol,
        limits.max_blocks * limits.block_size,
        account_inode.nr_copies,
        account_inode.copy_policy,
        1,
    )?;
    let data_vid = store.new_volume(
        &data_vol,
        limits.max_blocks * limits.block_size,
        account_inode.nr_copies,
        account_inode.copy_policy,
        1,
    )?;
    allocator.oalloc_init(data_vid, limits.max_blocks);

    let onode_vol_inode = Inode::new(&onode_vol, onode_vid, limits.max_blocks * limits.block_size, 0, limits);
    inode_write(&onode_vol_inode, store, limits, InodeWriteOptions { create: true })?;

    let record = BucketInode {
        bucket_name: bucket_name.to_string(),
        obj_count: 0,
        bytes_used: 0,
        onode_vid,
        data_vid,
    };
    let record_bytes = record.to_bytes(limits);
    buf[i * slot_size..(i + 1) * slot_size].copy_from_slice(&record_bytes);

    let oid = pack_data(account_inode.vdi_id, data_index as u32);
    if needs_create {
        store.create_object(oid, &buf)?;
        set_vid(account_inode, data_index as u32, account_inode.vdi_id, store, limits)?;
        inode_write(account_inode, store, limits, InodeWriteOptions { create: false })?;
    } else {
        store.write_object(oid, &record_bytes, (i * slot_size) as u64, false)?;
    }

    Ok(AddOutcome::Created { slot: i as u64, onode_vid, data_vid })
}

/// Probes `account_inode`'s bucket-name hash space for a free slot and
/// places `bucket_name` there.
pub fn create_bucket(
    account_inode: &mut Inode,
    bucket_name: &str,
    store: &mut dyn ObjectStore,
    allocator: &mut Allocator,
    limits: &GatewayLimits,
) -> Result<()> {
    if lookup_bucket(&account_inode.name, bucket_name, store).is_ok() {
        return Err(Error::AlreadyExists);
    }
    let h = crate::hash::sd_hash(bucket_name.as_bytes());
    let max_buckets = limits.max_buckets();
    let buckets_per_obj = limits.buckets_per_obj();
    let mut i = 0u64;
    while i < max_buckets {
        let idx = (h + i) % max_buckets;
        match add_bucket(account_inode, idx, bucket_name, store, allocator, limits)? {
            AddOutcome::Created { .. } => return Ok(()),
            AddOutcome::ObjectFull => i += buckets_per_obj,
        }
    }
    crate::sdkv_warn!("no free bucket slot for {}/{}", account_inode.name, bucket_name);
    Err(Error::NoSpace)
}

/// Resolves a bucket's onode-volume VID directly by its composed name,
/// mirroring the backing store's own name index rather than re-deriving
/// the probe sequence.
pub fn lookup_bucket(account_name: &str, bucket_name: &str, store: &dyn ObjectStore) -> Result<u32> {
    let full_name = format!("{account_name}/{bucket_name}");
    store.lookup_volume_by_name(&full_name).map_err(|_| Error::NotFound)
}

/// Outcome of a single-slot bucket deletion attempt.
enum RemoveOutcome {
    Removed,
    NotInThisObject,
}

fn remove_bucket_at(
    account_inode: &mut Inode,
    idx: u64,
    bucket_name: &str,
    store: &mut dyn ObjectStore,
    limits: &GatewayLimits,
) -> Result<RemoveOutcome> {
    let buckets_per_obj = limits.buckets_per_obj() as usize;
    let data_index = idx / limits.buckets_per_obj();
    let slot_size = limits.bucket_inode_size() as usize;

    let vid = get_vid(account_inode, data_index as u32, store, limits)?;
    if vid == 0 {
        return Ok(RemoveOutcome::NotInThisObject);
    }
    let oid = pack_data(account_inode.vdi_id, data_index as u32);
    let mut buf = vec![0u8; limits.block_size as usize];
    store.read_object(oid, &mut buf, 0)?;

    let mut found = None;
    let mut empty_slots = 0usize;
    for i in 0..buckets_per_obj {
        let rec = BucketInode::from_bytes(&buf[i * slot_size..(i + 1) * slot_size], limits);
        if rec.is_free() {
            empty_slots += 1;
            continue;
        }
        if rec.bucket_name == bucket_name {
            found = Some(i);
        }
    }
    let found_idx = match found {
        Some(i) => i,
        None => return Ok(RemoveOutcome::NotInThisObject),
    };

    store.delete_volume(&format!("{}/{}", account_inode.name, bucket_name))?;
    store.delete_volume(&format!("{}/{}/allocator", account_inode.name, bucket_name))?;

    if empty_slots == buckets_per_obj - 1 {
        store.discard_object(oid)?;
        set_vid(account_inode, data_index as u32, 0, store, limits)?;
        inode_write(account_inode, store, limits, InodeWriteOptions { create: false })?;
    } else {
        let cleared = BucketInode::free().to_bytes(limits);
        store.write_object(oid, &cleared, (found_idx * slot_size) as u64, false)?;
    }
    Ok(RemoveOutcome::Removed)
}

/// Probes `account_inode`'s bucket-name hash space for `bucket_name` and
/// removes it, cascading the bucket's two child hyper-volumes.
pub fn delete_bucket(
    account_inode: &mut Inode,
    bucket_name: &str,
    store: &mut dyn ObjectStore,
    limits: &GatewayLimits,
) -> Result<()> {
    let h = crate::hash::sd_hash(bucket_name.as_bytes());
    let max_buckets = limits.max_buckets();
    let buckets_per_obj = limits.buckets_per_obj();
    let mut i = 0u64;
    while i < max_buckets {
        let idx = (h + i) % max_buckets;
        match remove_bucket_at(account_inode, idx, bucket_name, store, limits)? {
            RemoveOutcome::Removed => return Ok(()),
            RemoveOutcome::NotInThisObject => i += buckets_per_obj,
        }
    }
    crate::sdkv_debug!("bucket {}/{} not found for deletion", account_inode.name, bucket_name);
    Err(Error::NotFound)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::InMemoryStore;

    fn setup() -> (InMemoryStore, Allocator, GatewayLimits, Inode) {
        let limits = GatewayLimits::scaled(4096, 16);
        let mut store = InMemoryStore::new();
        let allocator = Allocator::new();
        let vdi_id = store.new_volume("coly", limits.max_blocks * limits.block_size, 1, 0, 1).unwrap();
        let inode = Inode::new("coly", vdi_id, limits.max_blocks * limits.block_size, 0, &limits);
        inode_write(&inode, &mut store, &limits, InodeWriteOptions { create: true }).unwrap();
        (store, allocator, limits, inode)
    }

    #[test]
    fn create_then_lookup_round_trips() {
        let (mut store, mut allocator, limits, mut inode) = setup();
        create_bucket(&mut inode, "fruit", &mut store, &mut allocator, &limits).unwrap();
        let vid = lookup_bucket("coly", "fruit", &store).unwrap();
        assert_ne!(vid, 0);
    }

    #[test]
    fn duplicate_bucket_name_is_rejected() {
        let (mut store, mut allocator, limits, mut inode) = setup();
        create_bucket(&mut inode, "fruit", &mut store, &mut allocator, &limits).unwrap();
        let err = create_bucket(&mut inode, "fruit", &mut store, &mut allocator, &limits).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists));
    }

    #[test]
    fn independent_placement_survives_hash_collisions() {
        let (mut store, mut allocator, limits, mut inode) = setup();
        create_bucket(&mut inode, "jetta", &mut store, &mut allocator, &limits).unwrap();
        create_bucket(&mut inode, "volvo", &mut store, &mut allocator, &limits).unwrap();
        let a = lookup_bucket("coly", "jetta", &store).unwrap();
        let b = lookup_bucket("coly", "volvo", &store).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn delete_then_lookup_not_found() {
        let (mut store, mut allocator, limits, mut inode) = setup();
        create_bucket(&mut inode, "fruit", &mut store, &mut allocator, &limits).unwrap();
        delete_bucket(&mut inode, "fruit", &mut store, &limits).unwrap();
        assert!(lookup_bucket("coly", "fruit", &store).is_err());
    }
}
