//! Constants and scale parameters for the gateway's on-disk structures.
//!
//! The production values come straight from the object space layout in
//! the data model: a 4 MiB block, a `2^20`-entry direct index and a
//! `2^32`-block address space adding up to a 16 PiB logical volume. Tests
//! build a [`GatewayLimits`] with much smaller numbers so they don't have
//! to allocate megabyte-sized arrays to exercise the placement algorithms.

/// Number of bits of a VID (volume ID).
pub const VID_BITS: u32 = 24;
/// Maximum number of volumes the backing store can hand out.
pub const MAX_VOLUMES: u64 = 1 << VID_BITS;

/// Number of snapshot children tracked by a volume inode.
pub const MAX_CHILDREN: usize = 1024;
/// Byte length of the inode's `name`/`tag` fields.
pub const MAX_VDI_LEN: usize = 256;
/// `sha1` field width, rounded up from 20 to a multiple of 8.
pub const SHA1_DIGEST_SIZE: usize = 24;

/// Default byte length of a bucket name (`SD_MAX_BUCKET_NAME`).
///
/// Not specified by the on-disk protocol header available to this crate;
/// chosen so that `"account/bucket"` (joined with a separator) always fits
/// inside [`MAX_VDI_LEN`] when both components are full length.
pub const DEFAULT_MAX_BUCKET_NAME: usize = 128;

/// Default byte length of an object name.
pub const DEFAULT_MAX_OBJECT_NAME: usize = 1024;

/// Default block size: 4 MiB (`block_size_shift` of 22).
pub const DEFAULT_BLOCK_SIZE: u64 = 1 << 22;
/// Default direct/gref index cardinality: `2^20`.
pub const DEFAULT_N_DIRECT: u64 = 1 << 20;
/// Default address space width: `2^32` blocks.
pub const DEFAULT_MAX_BLOCKS: u64 = 1 << 32;

/// Scale parameters shared by every structure in this crate.
///
/// [`GatewayLimits::default`] reproduces the real, specification-mandated
/// sizes (a 16 PiB logical volume). Tests should build a scaled-down
/// instance with [`GatewayLimits::scaled`] instead of allocating
/// production-sized arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatewayLimits {
    /// Size in bytes of one data block.
    pub block_size: u64,
    /// Cardinality of the inode's direct/gref arrays.
    pub n_direct: u64,
    /// Width of the global block-index address space.
    pub max_blocks: u64,
    /// Byte length of a bucket name record.
    pub max_bucket_name: usize,
    /// Byte length of an object name record.
    pub max_object_name: usize,
}

impl Default for GatewayLimits {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            n_direct: DEFAULT_N_DIRECT,
            max_blocks: DEFAULT_MAX_BLOCKS,
            max_bucket_name: DEFAULT_MAX_BUCKET_NAME,
            max_object_name: DEFAULT_MAX_OBJECT_NAME,
        }
    }
}

impl GatewayLimits {
    /// Builds a scaled-down limit set for tests: `n_direct` and `max_blocks`
    /// are both set to `small`, and the block size is shrunk to `block_size`
    /// bytes. Name lengths are left at their production values since they
    /// are cheap regardless of scale.
    pub fn scaled(block_size: u64, small: u64) -> Self {
        Self {
            block_size,
            n_direct: small,
            max_blocks: small,
            ..Self::default()
        }
    }

    /// Byte size of one [`crate::inode::BucketInode`] record: fixed at
    /// `2 * max_bucket_name` so that a data block holds a whole number of
    /// records.
    pub fn bucket_inode_size(&self) -> u64 {
        (self.max_bucket_name * 2) as u64
    }

    /// Number of `BucketInode` slots held by one data object.
    pub fn buckets_per_obj(&self) -> u64 {
        self.block_size / self.bucket_inode_size()
    }

    /// Maximum number of buckets an account's hyper-volume can hold.
    pub fn max_buckets(&self) -> u64 {
        (self.max_blocks * self.block_size) / self.bucket_inode_size()
    }

    /// Byte size of the inline capacity of an onode: one block minus the
    /// fixed 4096-byte header.
    pub fn inline_cap(&self) -> u64 {
        self.block_size.saturating_sub(ONODE_HEADER_SIZE as u64)
    }

    /// Encoded byte length of an [`crate::inode::Inode`] record at this
    /// scale.
    ///
    /// The fixed header (name, tag, timestamps, snapshot linkage, child
    /// list) is scale-independent; the index/gref region grows with
    /// `n_direct` since it is reinterpreted in place as the volume's depth
    /// grows from a dense direct array to a sparse root-entry list — its
    /// encoded length never changes across that promotion.
    pub fn inode_encoded_size(&self) -> u64 {
        const FIXED_HEADER: u64 = 2 * MAX_VDI_LEN as u64 // name + tag
            + 8 * 5 // create_time, snap_ctime, vm_clock_nsec, vdi_size, vm_state_size
            + 4 // copy_policy + store_policy + nr_copies + block_size_shift
            + 4 * 3 // snap_id, vdi_id, parent_vdi_id
            + 4 * MAX_CHILDREN as u64 // child_vdi_id
            + 4 // depth (u16) + padding (u16)
            + 4 // root_entries, valid only at depth 2
            + 4; // btree_counter
        const PER_SLOT: u64 = 4 // data_vdi_id / root-entry slot
            + 8; // generation_reference
        FIXED_HEADER + self.n_direct * PER_SLOT
    }
}

/// Fixed, padded size of an onode header (see the data model's §3.5).
pub const ONODE_HEADER_SIZE: usize = 4096;

/// Fixed byte size of a per-volume attribute record.
///
/// Not specified by the on-disk protocol header available to this crate;
/// chosen as a conservative fixed slot big enough to hold a key name and a
/// short inline value.
pub const ATTR_RECORD_SIZE: u64 = 1024;
