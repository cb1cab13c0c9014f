//! The 64-bit object-ID namespace.
//!
//! Bit layout, MSB first: a kind flag in bits 63..59 (at most one set),
//! a 24-bit volume ID in bits 55..32 (bits 58..56 reserved), and a 32-bit
//! index in bits 31..0 (block index for data objects, or an attribute/
//! btree sub-id otherwise).

use crate::limits::{GatewayLimits, ATTR_RECORD_SIZE};

const VDI_BIT: u64 = 1 << 63;
const VMSTATE_BIT: u64 = 1 << 62;
const ATTR_BIT: u64 = 1 << 61;
const BTREE_BIT: u64 = 1 << 60;
const LEDGER_BIT: u64 = 1 << 59;
const VID_SHIFT: u32 = 32;
const VID_MASK: u64 = 0x00FF_FFFF;
const IDX_MASK: u64 = 0xFFFF_FFFF;

/// The kind an OID's flag bits classify it as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OidKind {
    /// A volume's inode (and the root of its sparse index).
    Inode,
    /// A VM-state blob.
    VmState,
    /// A per-volume attribute record.
    Attr,
    /// An indirect node of a volume's sparse index.
    Btree,
    /// A ledger-format object, overlaid on the data space.
    Ledger,
    /// A data block of a volume.
    Data,
}

/// Packs a data-block OID for block `idx` of volume `vid`.
pub fn pack_data(vid: u32, idx: u32) -> u64 {
    ((vid as u64 & VID_MASK) << VID_SHIFT) | idx as u64
}

/// Packs the OID naming volume `vid`'s inode.
pub fn pack_inode(vid: u32) -> u64 {
    VDI_BIT | ((vid as u64 & VID_MASK) << VID_SHIFT)
}

/// Packs the OID naming attribute `attr_id` of volume `vid`.
pub fn pack_attr(vid: u32, attr_id: u32) -> u64 {
    ATTR_BIT | ((vid as u64 & VID_MASK) << VID_SHIFT) | attr_id as u64
}

/// Packs the OID naming indirect index node `node_id` of volume `vid`.
pub fn pack_btree(vid: u32, node_id: u32) -> u64 {
    BTREE_BIT | ((vid as u64 & VID_MASK) << VID_SHIFT) | node_id as u64
}

/// Packs the OID naming VM-state block `idx` of volume `vid`.
pub fn pack_vmstate(vid: u32, idx: u32) -> u64 {
    VMSTATE_BIT | ((vid as u64 & VID_MASK) << VID_SHIFT) | idx as u64
}

/// Tells whether `oid` names a volume inode.
pub fn is_inode(oid: u64) -> bool {
    oid & VDI_BIT != 0
}

/// Tells whether `oid` names a VM-state blob.
pub fn is_vmstate(oid: u64) -> bool {
    oid & VMSTATE_BIT != 0
}

/// Tells whether `oid` names a per-volume attribute record.
pub fn is_attr(oid: u64) -> bool {
    oid & ATTR_BIT != 0
}

/// Tells whether `oid` names an indirect index node.
pub fn is_btree(oid: u64) -> bool {
    oid & BTREE_BIT != 0
}

/// Tells whether `oid` names a ledger-format object.
pub fn is_ledger(oid: u64) -> bool {
    oid & LEDGER_BIT != 0
}

/// Tells whether `oid` names a plain data block: none of the other kind
/// bits are set.
pub fn is_data(oid: u64) -> bool {
    !is_inode(oid) && !is_vmstate(oid) && !is_attr(oid) && !is_btree(oid) && !is_ledger(oid)
}

/// Classifies `oid` by its kind flags. Kind classification is total: every
/// OID falls into exactly one variant.
pub fn classify(oid: u64) -> OidKind {
    if is_inode(oid) {
        OidKind::Inode
    } else if is_vmstate(oid) {
        OidKind::VmState
    } else if is_attr(oid) {
        OidKind::Attr
    } else if is_btree(oid) {
        OidKind::Btree
    } else if is_ledger(oid) {
        OidKind::Ledger
    } else {
        OidKind::Data
    }
}

/// Extracts the 24-bit volume ID from bits 55..32.
pub fn oid_to_vid(oid: u64) -> u32 {
    ((oid >> VID_SHIFT) & VID_MASK) as u32
}

/// Extracts the low 32-bit index: the block index for a data OID, or the
/// attribute/btree sub-id otherwise.
pub fn data_oid_to_idx(oid: u64) -> u32 {
    (oid & IDX_MASK) as u32
}

/// Returns the canonical on-store byte length for `oid`'s kind. Never
/// returns 0.
pub fn object_size(oid: u64, limits: &GatewayLimits) -> u64 {
    match classify(oid) {
        OidKind::Inode => limits.inode_encoded_size(),
        OidKind::Attr => ATTR_RECORD_SIZE,
        OidKind::Btree | OidKind::VmState | OidKind::Ledger | OidKind::Data => limits.block_size,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn data_oid_round_trips() {
        for vid in [0u32, 1, 42, 0xFFFFFF] {
            for idx in [0u32, 1, 1024, u32::MAX] {
                let oid = pack_data(vid, idx);
                assert_eq!(oid_to_vid(oid), vid);
                assert_eq!(data_oid_to_idx(oid), idx);
                assert!(is_data(oid));
            }
        }
    }

    #[test]
    fn kind_flags_are_mutually_exclusive_and_total() {
        let vid = 7;
        let cases = [
            (pack_inode(vid), OidKind::Inode),
            (pack_vmstate(vid, 3), OidKind::VmState),
            (pack_attr(vid, 3), OidKind::Attr),
            (pack_btree(vid, 3), OidKind::Btree),
            (pack_data(vid, 3), OidKind::Data),
        ];
        for (oid, kind) in cases {
            assert_eq!(classify(oid), kind);
            let flags = [
                is_inode(oid),
                is_vmstate(oid),
                is_attr(oid),
                is_btree(oid),
                is_ledger(oid),
            ];
            let set_count = flags.iter().filter(|b| **b).count();
            if kind == OidKind::Data {
                assert_eq!(set_count, 0);
            } else {
                assert_eq!(set_count, 1);
            }
        }
    }

    #[test]
    fn object_size_never_zero() {
        let limits = GatewayLimits::default();
        let vid = 9;
        for oid in [
            pack_inode(vid),
            pack_attr(vid, 1),
            pack_btree(vid, 1),
            pack_vmstate(vid, 1),
            pack_data(vid, 1),
        ] {
            assert!(object_size(oid, &limits) > 0);
        }
    }

    #[test]
    fn vid_is_masked_to_24_bits() {
        let oid = pack_data(0x01FF_FFFF, 0);
        assert_eq!(oid_to_vid(oid), 0x00FF_FFFF);
    }
}
