//! The account layer: an account is a hyper-volume whose index slots hold
//! [`BucketInode`](crate::bucket::BucketInode) records.

use crate::bucket::BucketInode;
use crate::error::Result;
use crate::inode::{walk_index, Inode, IndexEntry, InodeWriteOptions};
use crate::limits::GatewayLimits;
use crate::oid::pack_data;
use crate::store::ObjectStore;

/// Creates a hyper-volume named `account` with store-policy "hyper" and
/// persists its freshly formatted inode.
pub fn create_account(
    account: &str,
    create_time: u64,
    store: &mut dyn ObjectStore,
    limits: &GatewayLimits,
) -> Result<Inode> {
    let vdi_size = limits.max_blocks * limits.block_size;
    let vdi_id = store.new_volume(account, vdi_size, 1, 0, 1)?;
    let inode = Inode::new(account, vdi_id, vdi_size, create_time, limits);
    crate::inode::inode_write(&inode, store, limits, InodeWriteOptions { create: true })?;
    Ok(inode)
}

/// Deletes the account's own volume. Does not cascade to its buckets: they
/// hold independent volumes named `account/bucket` and
/// `account/bucket/allocator`, which become orphaned until cleaned up
/// through [`crate::bucket::delete_bucket`] or an offline tool.
pub fn delete_account(account: &str, store: &mut dyn ObjectStore) -> Result<()> {
    store.delete_volume(account)
}

/// Visits every live bucket slot of `account_inode`, invoking `cb` with its
/// name.
pub fn list_buckets(
    account_inode: &Inode,
    store: &dyn ObjectStore,
    limits: &GatewayLimits,
    mut cb: impl FnMut(&str),
) -> Result<()> {
    let mut visited_objects = std::collections::HashSet::new();
    walk_index(account_inode, store, limits, |entry| {
        if let IndexEntry::Leaf { idx, vid: _ } = entry {
            visited_objects.insert(idx);
        }
    })?;

    let slot_size = limits.bucket_inode_size() as usize;
    let buckets_per_obj = limits.buckets_per_obj() as usize;
    let mut buf = vec![0u8; limits.block_size as usize];
    let mut err = None;
    for data_index in visited_objects {
        let oid = pack_data(account_inode.vdi_id, data_index);
        if let Err(e) = store.read_object(oid, &mut buf, 0) {
            err = Some(e);
            break;
        }
        for i in 0..buckets_per_obj {
            let rec = BucketInode::from_bytes(&buf[i * slot_size..(i + 1) * slot_size], limits);
            if !rec.is_free() {
                cb(&rec.bucket_name);
            }
        }
    }
    match err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Counts non-free `BucketInode` slots by walking the index and scanning
/// every visited data object.
pub fn read_account(account_inode: &Inode, store: &dyn ObjectStore, limits: &GatewayLimits) -> Result<u64> {
    let mut count = 0u64;
    list_buckets(account_inode, store, limits, |_| count += 1)?;
    Ok(count)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bucket::create_bucket;
    use crate::oalloc::Allocator;
    use crate::testutil::InMemoryStore;

    #[test]
    fn create_account_persists_a_readable_inode() {
        let limits = GatewayLimits::scaled(4096, 16);
        let mut store = InMemoryStore::new();
        let inode = create_account("coly", 0, &mut store, &limits).unwrap();
        assert_eq!(inode.name, "coly");
        assert_eq!(read_account(&inode, &store, &limits).unwrap(), 0);
    }

    #[test]
    fn list_buckets_reports_every_live_slot() {
        let limits = GatewayLimits::scaled(4096, 16);
        let mut store = InMemoryStore::new();
        let mut allocator = Allocator::new();
        let mut inode = create_account("coly", 0, &mut store, &limits).unwrap();
        create_bucket(&mut inode, "jetta", &mut store, &mut allocator, &limits).unwrap();
        create_bucket(&mut inode, "volvo", &mut store, &mut allocator, &limits).unwrap();

        let mut seen = Vec::new();
        list_buckets(&inode, &store, &limits, |name| seen.push(name.to_string())).unwrap();
        seen.sort();
        assert_eq!(seen, vec!["jetta".to_string(), "volvo".to_string()]);
        assert_eq!(read_account(&inode, &store, &limits).unwrap(), 2);
    }

    #[test]
    fn delete_account_removes_its_volume_but_not_its_buckets() {
        let limits = GatewayLimits::scaled(4096, 16);
        let mut store = InMemoryStore::new();
        let mut allocator = Allocator::new();
        let mut inode = create_account("coly", 0, &mut store, &limits).unwrap();
        create_bucket(&mut inode, "jetta", &mut store, &mut allocator, &limits).unwrap();

        delete_account("coly", &mut store).unwrap();
        assert!(store.lookup_volume_by_name("coly").is_err());
        assert!(store.lookup_volume_by_name("coly/jetta").is_ok());
    }
}
