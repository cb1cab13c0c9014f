//! FNV-1a derived hashing used to place names and OIDs into open-addressed
//! slots.
//!
//! Two independent code paths — one over raw bytes, one over a `u64`
//! processed LSB-first — must agree bit-for-bit on the same input; that
//! invariant is checked by `bytewise_and_u64_forms_agree` below.

/// 64-bit FNV-1a non-zero initial basis.
pub const FNV1A_64_INIT: u64 = 0xcbf2_9ce4_8422_2325;
/// 64-bit Fowler/Noll/Vo FNV prime.
pub const FNV_64_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Folds `buf` through one FNV-1a round starting from `seed`.
pub fn fnv_1a_buf(buf: &[u8], seed: u64) -> u64 {
    let mut h = seed;
    for &b in buf {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_64_PRIME);
    }
    h
}

/// Folds the 8 bytes of `word`, taken LSB-first, through one FNV-1a round
/// starting from `seed`. Produces the same result as
/// `fnv_1a_buf(&word.to_le_bytes(), seed)` but avoids building the byte
/// array.
pub fn fnv_1a_u64(word: u64, seed: u64) -> u64 {
    let mut h = seed;
    for shift in (0..64).step_by(8) {
        h ^= (word >> shift) & 0xff;
        h = h.wrapping_mul(FNV_64_PRIME);
    }
    h
}

/// Remixes a hash value through one extra FNV-1a round keyed on itself.
fn remix(h: u64) -> u64 {
    fnv_1a_u64(h, h)
}

/// Stable 64-bit hash of an arbitrary byte string, used to place bucket and
/// object names in their respective open-addressed index spaces.
pub fn sd_hash(buf: &[u8]) -> u64 {
    remix(fnv_1a_buf(buf, FNV1A_64_INIT))
}

/// Stable 64-bit hash of an OID, bit-identical to `sd_hash` applied to the
/// OID's little-endian byte representation.
pub fn sd_hash_oid(oid: u64) -> u64 {
    remix(fnv_1a_u64(oid, FNV1A_64_INIT))
}

/// Hashes a volume name into 24-bit volume-ID space. Deliberately not
/// remixed, for backward compatibility with the original placement scheme.
pub fn sd_hash_vdi_name(name: &[u8], vid_space: u64) -> u64 {
    fnv_1a_buf(name, FNV1A_64_INIT) % vid_space
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::limits::MAX_VOLUMES;

    #[test]
    fn bytewise_and_u64_forms_agree() {
        let words: [u64; 5] = [0, 1, 0xdead_beef_cafe_babe, u64::MAX, 0x0102_0304_0506_0708];
        for &w in &words {
            let buf = w.to_le_bytes();
            assert_eq!(
                fnv_1a_buf(&buf, FNV1A_64_INIT),
                fnv_1a_u64(w, FNV1A_64_INIT)
            );
        }
    }

    #[test]
    fn sd_hash_matches_sd_hash_oid() {
        let oid = 0x0011_2233_4455_6677u64;
        let buf = oid.to_le_bytes();
        assert_eq!(sd_hash(&buf), sd_hash_oid(oid));
    }

    #[test]
    fn sd_hash_vdi_name_fits_vid_space() {
        for name in ["", "a", "coly", "a-very-long-account-name-indeed"] {
            assert!(sd_hash_vdi_name(name.as_bytes(), MAX_VOLUMES) < MAX_VOLUMES);
        }
    }

    #[test]
    fn sd_hash_is_deterministic() {
        assert_eq!(sd_hash(b"apple"), sd_hash(b"apple"));
        assert_ne!(sd_hash(b"apple"), sd_hash(b"pear"));
    }
}
