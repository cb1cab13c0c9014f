//! Object placement inside a bucket: the onode header/body record and the
//! probe-based create/read/update/delete/list operations over a bucket's
//! onode volume (`V_on`) and data volume (`V_data`).
//!
//! Unlike [`crate::bucket`], each onode occupies a whole index slot of its
//! own (`idx` in `V_on`'s sparse index maps 1:1 to one onode record) rather
//! than being packed several-to-a-block; a bucket can therefore hold up to
//! `limits.max_blocks` live objects before the probe sequence saturates.

use crate::error::{Error, Result};
use crate::hash::sd_hash;
use crate::inode::{get_vid, inode_write, load_inode, set_vid, walk_index, IndexEntry, InodeWriteOptions};
use crate::limits::{GatewayLimits, ONODE_HEADER_SIZE, SHA1_DIGEST_SIZE};
use crate::oalloc::Allocator;
use crate::oid::pack_data;
use crate::store::{ObjectStore, RequestSink, Status};
use crate::util::ceil_div;

/// One contiguous run of blocks in a bucket's data volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    pub start: u64,
    pub count: u64,
}

impl Extent {
    fn to_bytes(self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&self.start.to_le_bytes());
        buf[8..].copy_from_slice(&self.count.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Self {
        let start = u64::from_le_bytes(buf[..8].try_into().unwrap());
        let count = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        Extent { start, count }
    }
}

/// The fixed, [`ONODE_HEADER_SIZE`]-padded prefix of an onode record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnodeHeader {
    pub name: String,
    pub sha1: [u8; SHA1_DIGEST_SIZE],
    pub size: u64,
    pub ctime: u64,
    pub mtime: u64,
    pub data_vid: u32,
    pub nr_extent: u32,
    pub inlined: bool,
}

impl OnodeHeader {
    fn free() -> Self {
        OnodeHeader {
            name: String::new(),
            sha1: [0; SHA1_DIGEST_SIZE],
            size: 0,
            ctime: 0,
            mtime: 0,
            data_vid: 0,
            nr_extent: 0,
            inlined: false,
        }
    }

    fn is_free(&self) -> bool {
        self.name.is_empty()
    }

    fn to_bytes(&self, limits: &GatewayLimits) -> Vec<u8> {
        let mut buf = vec![0u8; ONODE_HEADER_SIZE];
        let name = self.name.as_bytes();
        let n = name.len().min(limits.max_object_name);
        buf[..n].copy_from_slice(&name[..n]);
        let mut off = limits.max_object_name;
        buf[off..off + SHA1_DIGEST_SIZE].copy_from_slice(&self.sha1);
        off += SHA1_DIGEST_SIZE;
        buf[off..off + 8].copy_from_slice(&self.size.to_le_bytes());
        off += 8;
        buf[off..off + 8].copy_from_slice(&self.ctime.to_le_bytes());
        off += 8;
        buf[off..off + 8].copy_from_slice(&self.mtime.to_le_bytes());
        off += 8;
        buf[off..off + 4].copy_from_slice(&self.data_vid.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.nr_extent.to_le_bytes());
        off += 4;
        buf[off] = self.inlined as u8;
        buf
    }

    fn from_bytes(buf: &[u8], limits: &GatewayLimits) -> Result<Self> {
        if buf.len() < ONODE_HEADER_SIZE {
            return Err(Error::Corrupt("onode header truncated"));
        }
        let name_field = &buf[..limits.max_object_name];
        let end = name_field.iter().position(|&b| b == 0).unwrap_or(name_field.len());
        let name = String::from_utf8_lossy(&name_field[..end]).into_owned();
        let mut off = limits.max_object_name;
        let mut sha1 = [0u8; SHA1_DIGEST_SIZE];
        sha1.copy_from_slice(&buf[off..off + SHA1_DIGEST_SIZE]);
        off += SHA1_DIGEST_SIZE;
        let size = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
        off += 8;
        let ctime = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
        off += 8;
        let mtime = u64::from_le_bytes(buf[off..off + 8].try_into().unwrap());
        off += 8;
        let data_vid = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let nr_extent = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let inlined = buf[off] != 0;
        Ok(OnodeHeader { name, sha1, size, ctime, mtime, data_vid, nr_extent, inlined })
    }
}

/// An onode's body: either the inline payload or its extent table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OnodeBody {
    Inline(Vec<u8>),
    Extents(Vec<Extent>),
}

/// A whole onode record: header plus body, as written in one shot on create
/// and overwrite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Onode {
    pub header: OnodeHeader,
    pub body: OnodeBody,
}

impl Onode {
    fn to_bytes(&self, limits: &GatewayLimits) -> Vec<u8> {
        let mut buf = self.header.to_bytes(limits);
        match &self.body {
            OnodeBody::Inline(bytes) => buf.extend_from_slice(bytes),
            OnodeBody::Extents(extents) => {
                for e in extents {
                    buf.extend_from_slice(&e.to_bytes());
                }
            }
        }
        buf
    }
}

/// Reads exactly `buf.len()` bytes from `sink`, erroring on a short stream.
fn read_exact_from_sink(sink: &mut dyn RequestSink, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = sink.read_body_chunk(&mut buf[filled..])?;
        if n == 0 {
            return Err(Error::Invalid("request body ended before content-length"));
        }
        filled += n;
    }
    Ok(())
}

/// Creates or overwrites object `name` in the bucket whose onode volume is
/// `onode_vid` and whose data volume is `data_vid`, reading exactly
/// `body_len` bytes from `sink`.
///
/// Bodies at or under `limits.inline_cap()` are stored inline in the onode;
/// larger bodies are streamed straight to freshly reserved blocks of
/// `data_vid` and recorded as one extent.
pub fn create_object(
    onode_vid: u32,
    data_vid: u32,
    name: &str,
    sink: &mut dyn RequestSink,
    body_len: u64,
    now: u64,
    store: &mut dyn ObjectStore,
    allocator: &mut Allocator,
    limits: &GatewayLimits,
) -> Result<()> {
    let inline = body_len <= limits.inline_cap();
    let body = if inline {
        let mut buf = vec![0u8; body_len as usize];
        read_exact_from_sink(sink, &mut buf)?;
        OnodeBody::Inline(buf)
    } else {
        let count = ceil_div(body_len, limits.block_size);
        let start = allocator.oalloc_new_prepare(data_vid, count)?;
        let mut remaining = body_len;
        for block in start..start + count {
            let chunk_len = remaining.min(limits.block_size) as usize;
            let mut buf = vec![0u8; chunk_len];
            read_exact_from_sink(sink, &mut buf)?;
            store.write_object(pack_data(data_vid, block as u32), &buf, 0, true)?;
            remaining -= chunk_len as u64;
        }
        allocator.oalloc_new_finish(data_vid, start, count)?;
        OnodeBody::Extents(vec![Extent { start, count }])
    };

    let nr_extent = match &body {
        OnodeBody::Extents(v) => v.len() as u32,
        OnodeBody::Inline(_) => 0,
    };
    let onode = Onode {
        header: OnodeHeader {
            name: name.to_string(),
            sha1: [0; SHA1_DIGEST_SIZE],
            size: body_len,
            ctime: now,
            mtime: now,
            data_vid,
            nr_extent,
            inlined: inline,
        },
        body,
    };
    let full_bytes = onode.to_bytes(limits);

    let mut on_inode = load_inode(store, onode_vid, limits)?;
    let h = sd_hash(name.as_bytes());
    for i in 0..limits.max_blocks {
        let idx = ((h + i) % limits.max_blocks) as u32;
        let slot_vid = get_vid(&on_inode, idx, store, limits)?;
        if slot_vid == 0 {
            store.create_object(pack_data(onode_vid, idx), &full_bytes)?;
            set_vid(&mut on_inode, idx, onode_vid, store, limits)?;
            inode_write(&on_inode, store, limits, InodeWriteOptions { create: false })?;
            sink.set_status(Status::Created);
            return Ok(());
        }

        let mut hdr_buf = vec![0u8; ONODE_HEADER_SIZE];
        store.read_object(pack_data(onode_vid, idx), &mut hdr_buf, 0)?;
        let existing = OnodeHeader::from_bytes(&hdr_buf, limits)?;
        if existing.is_free() || existing.name == name {
            store.write_object(pack_data(onode_vid, idx), &full_bytes, 0, false)?;
            sink.set_status(Status::Created);
            return Ok(());
        }
        // Conflict: slot taken by a different name. Continue probing.
    }
    crate::sdkv_warn!("onode volume {} has no free slot for {}", onode_vid, name);
    sink.set_status(Status::ServiceUnavailable);
    Err(Error::NoSpace)
}

/// Reads object `name` back from the bucket whose onode volume is
/// `onode_vid`, streaming its body to `sink` and setting its status.
pub fn read_object(
    onode_vid: u32,
    name: &str,
    store: &dyn ObjectStore,
    sink: &mut dyn RequestSink,
    limits: &GatewayLimits,
) -> Result<()> {
    let on_inode = load_inode(store, onode_vid, limits)?;
    let h = sd_hash(name.as_bytes());
    for i in 0..limits.max_blocks {
        let idx = ((h + i) % limits.max_blocks) as u32;
        let slot_vid = get_vid(&on_inode, idx, store, limits)?;
        if slot_vid == 0 {
            continue;
        }
        let oid = pack_data(onode_vid, idx);
        let mut hdr_buf = vec![0u8; ONODE_HEADER_SIZE];
        store.read_object(oid, &mut hdr_buf, 0)?;
        let header = OnodeHeader::from_bytes(&hdr_buf, limits)?;
        if header.name != name {
            continue;
        }

        sink.set_status(Status::Ok);
        if header.inlined {
            let mut buf = vec![0u8; header.size as usize];
            store.read_object(oid, &mut buf, ONODE_HEADER_SIZE as u64)?;
            sink.write_body_chunk(&buf)?;
        } else {
            let mut ext_buf = vec![0u8; header.nr_extent as usize * 16];
            store.read_object(oid, &mut ext_buf, ONODE_HEADER_SIZE as u64)?;
            let mut remaining = header.size;
            for chunk in ext_buf.chunks_exact(16) {
                let extent = Extent::from_bytes(chunk);
                for block in extent.start..extent.start + extent.count {
                    let len = remaining.min(limits.block_size) as usize;
                    let mut buf = vec![0u8; len];
                    store.read_object(pack_data(header.data_vid, block as u32), &mut buf, 0)?;
                    sink.write_body_chunk(&buf)?;
                    remaining -= len as u64;
                }
            }
        }
        return Ok(());
    }
    crate::sdkv_debug!("object {} not found in onode volume {}", name, onode_vid);
    sink.set_status(Status::NotFound);
    Err(Error::NotFound)
}

/// Updates object `name`, implemented as delete-then-create: the source's
/// in-place update only ever rewrote the inline body, silently losing any
/// extent payload on a body that had outgrown it.
pub fn update_object(
    onode_vid: u32,
    data_vid: u32,
    name: &str,
    sink: &mut dyn RequestSink,
    body_len: u64,
    now: u64,
    store: &mut dyn ObjectStore,
    allocator: &mut Allocator,
    limits: &GatewayLimits,
) -> Result<()> {
    delete_object(onode_vid, name, sink, store, allocator, limits)?;
    let result = create_object(onode_vid, data_vid, name, sink, body_len, now, store, allocator, limits);
    if result.is_ok() {
        sink.set_status(Status::Accepted);
    }
    result
}

/// Deletes object `name`: the name is cleared and persisted before the
/// extent table is read and freed, so a concurrent reader never observes a
/// live name pointing at recycled blocks.
pub fn delete_object(
    onode_vid: u32,
    name: &str,
    sink: &mut dyn RequestSink,
    store: &mut dyn ObjectStore,
    allocator: &mut Allocator,
    limits: &GatewayLimits,
) -> Result<()> {
    let on_inode = load_inode(store, onode_vid, limits)?;
    let h = sd_hash(name.as_bytes());
    for i in 0..limits.max_blocks {
        let idx = ((h + i) % limits.max_blocks) as u32;
        let slot_vid = get_vid(&on_inode, idx, store, limits)?;
        if slot_vid == 0 {
            continue;
        }
        let oid = pack_data(onode_vid, idx);
        let mut hdr_buf = vec![0u8; ONODE_HEADER_SIZE];
        store.read_object(oid, &mut hdr_buf, 0)?;
        let header = OnodeHeader::from_bytes(&hdr_buf, limits)?;
        if header.name != name {
            continue;
        }

        store.write_object(oid, &OnodeHeader::free().to_bytes(limits), 0, false)?;

        if !header.inlined {
            let mut ext_buf = vec![0u8; header.nr_extent as usize * 16];
            store.read_object(oid, &mut ext_buf, ONODE_HEADER_SIZE as u64)?;
            for chunk in ext_buf.chunks_exact(16) {
                let extent = Extent::from_bytes(chunk);
                allocator.oalloc_free(header.data_vid, extent.start, extent.count)?;
            }
        }
        sink.set_status(Status::NoContent);
        return Ok(());
    }
    sink.set_status(Status::NotFound);
    Err(Error::NotFound)
}

/// Visits every live object name in the bucket whose onode volume is
/// `onode_vid`.
pub fn list_objects(
    onode_vid: u32,
    store: &dyn ObjectStore,
    limits: &GatewayLimits,
    mut cb: impl FnMut(&str),
) -> Result<()> {
    let on_inode = load_inode(store, onode_vid, limits)?;
    let mut slots = Vec::new();
    walk_index(&on_inode, store, limits, |entry| {
        if let IndexEntry::Leaf { idx, .. } = entry {
            slots.push(idx);
        }
    })?;

    for idx in slots {
        let mut hdr_buf = vec![0u8; ONODE_HEADER_SIZE];
        store.read_object(pack_data(onode_vid, idx), &mut hdr_buf, 0)?;
        let header = OnodeHeader::from_bytes(&hdr_buf, limits)?;
        if !header.is_free() {
            cb(&header.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::account::create_account;
    use crate::bucket::{create_bucket, lookup_bucket};
    use crate::testutil::{BufferSink, InMemoryStore};

    /// Scaled so the header (parameterized by `max_object_name`, default
    /// 1024) plus a generous inline region both fit in one block.
    fn test_limits() -> GatewayLimits {
        GatewayLimits::scaled(8192, 16)
    }

    fn setup(limits: &GatewayLimits) -> (InMemoryStore, Allocator, u32, u32) {
        let mut store = InMemoryStore::new();
        let mut allocator = Allocator::new();
        let mut account = create_account("coly", 0, &mut store, limits).unwrap();
        create_bucket(&mut account, "fruit", &mut store, &mut allocator, limits).unwrap();
        let onode_vid = lookup_bucket("coly", "fruit", &store).unwrap();
        let data_vid = store.lookup_volume_by_name("coly/fruit/allocator").unwrap();
        (store, allocator, onode_vid, data_vid)
    }

    #[test]
    fn inline_round_trip() {
        let limits = test_limits();
        let (mut store, mut allocator, onode_vid, data_vid) = setup(&limits);
        let body = b"hello world!";
        let mut sink = BufferSink::with_request_body(body);
        create_object(
            onode_vid,
            data_vid,
            "apple",
            &mut sink,
            body.len() as u64,
            1,
            &mut store,
            &mut allocator,
            &limits,
        )
        .unwrap();
        assert_eq!(sink.status(), Some(Status::Created));

        let mut read_sink = BufferSink::default();
        read_object(onode_vid, "apple", &store, &mut read_sink, &limits).unwrap();
        assert_eq!(read_sink.response_body(), body);
        assert_eq!(read_sink.status(), Some(Status::Ok));
    }

    #[test]
    fn extent_round_trip_with_truncated_final_block() {
        let mut limits = test_limits();
        limits.block_size = 4096;
        let (mut store, mut allocator, onode_vid, data_vid) = setup(&limits);

        let body_len = 4096 * 2 + 100;
        let mut body = vec![0u8; body_len];
        for (i, b) in body.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let mut sink = BufferSink::with_request_body(&body);
        create_object(
            onode_vid,
            data_vid,
            "pear",
            &mut sink,
            body_len as u64,
            1,
            &mut store,
            &mut allocator,
            &limits,
        )
        .unwrap();

        let mut read_sink = BufferSink::default();
        read_object(onode_vid, "pear", &store, &mut read_sink, &limits).unwrap();
        assert_eq!(read_sink.response_body(), body.as_slice());
    }

    #[test]
    fn independent_placement_survives_hash_collisions() {
        let limits = test_limits();
        let (mut store, mut allocator, onode_vid, data_vid) = setup(&limits);

        let mut sink_a = BufferSink::with_request_body(b"A");
        create_object(onode_vid, data_vid, "a", &mut sink_a, 1, 1, &mut store, &mut allocator, &limits).unwrap();
        let mut sink_b = BufferSink::with_request_body(b"B");
        create_object(onode_vid, data_vid, "b", &mut sink_b, 1, 2, &mut store, &mut allocator, &limits).unwrap();

        let mut read_a = BufferSink::default();
        read_object(onode_vid, "a", &store, &mut read_a, &limits).unwrap();
        assert_eq!(read_a.response_body(), b"A");

        let mut read_b = BufferSink::default();
        read_object(onode_vid, "b", &store, &mut read_b, &limits).unwrap();
        assert_eq!(read_b.response_body(), b"B");
    }

    #[test]
    fn delete_then_read_not_found_and_allocator_restored() {
        let mut limits = test_limits();
        limits.block_size = 4096;
        let (mut store, mut allocator, onode_vid, data_vid) = setup(&limits);
        let before = allocator.free_blocks(data_vid);

        let body = vec![7u8; 4096 * 2 + 10];
        let mut sink = BufferSink::with_request_body(&body);
        create_object(onode_vid, data_vid, "apple", &mut sink, body.len() as u64, 1, &mut store, &mut allocator, &limits).unwrap();
        assert!(allocator.free_blocks(data_vid) < before);

        let mut delete_sink = BufferSink::default();
        delete_object(onode_vid, "apple", &mut delete_sink, &mut store, &mut allocator, &limits).unwrap();
        assert_eq!(delete_sink.status(), Some(Status::NoContent));
        assert_eq!(allocator.free_blocks(data_vid), before);

        let mut read_sink = BufferSink::default();
        let err = read_object(onode_vid, "apple", &store, &mut read_sink, &limits).unwrap_err();
        assert!(matches!(err, Error::NotFound));
        assert_eq!(read_sink.status(), Some(Status::NotFound));
    }

    #[test]
    fn update_replaces_inline_body() {
        let limits = test_limits();
        let (mut store, mut allocator, onode_vid, data_vid) = setup(&limits);
        let mut sink = BufferSink::with_request_body(b"first");
        create_object(onode_vid, data_vid, "apple", &mut sink, 5, 1, &mut store, &mut allocator, &limits).unwrap();

        let mut update_sink = BufferSink::with_request_body(b"second value");
        update_object(onode_vid, data_vid, "apple", &mut update_sink, 12, 2, &mut store, &mut allocator, &limits).unwrap();

        let mut read_sink = BufferSink::default();
        read_object(onode_vid, "apple", &store, &mut read_sink, &limits).unwrap();
        assert_eq!(read_sink.response_body(), b"second value");
    }

    #[test]
    fn list_objects_reports_every_live_name() {
        let limits = test_limits();
        let (mut store, mut allocator, onode_vid, data_vid) = setup(&limits);
        for name in ["apple", "pear", "plum"] {
            let mut sink = BufferSink::with_request_body(name.as_bytes());
            create_object(onode_vid, data_vid, name, &mut sink, name.len() as u64, 1, &mut store, &mut allocator, &limits).unwrap();
        }
        let mut delete_sink = BufferSink::default();
        delete_object(onode_vid, "pear", &mut delete_sink, &mut store, &mut allocator, &limits).unwrap();

        let mut names = Vec::new();
        list_objects(onode_vid, &store, &limits, |n| names.push(n.to_string())).unwrap();
        names.sort();
        assert_eq!(names, vec!["apple".to_string(), "plum".to_string()]);
    }

    #[test]
    fn probe_saturation_reports_no_space() {
        // A data volume index with only 2 slots: 2 creates succeed, the
        // third must exhaust the probe sequence.
        let limits = GatewayLimits::scaled(8192, 2);
        let (mut store, mut allocator, onode_vid, data_vid) = setup(&limits);
        for name in ["apple", "pear"] {
            let mut sink = BufferSink::with_request_body(name.as_bytes());
            create_object(onode_vid, data_vid, name, &mut sink, name.len() as u64, 1, &mut store, &mut allocator, &limits).unwrap();
        }
        let mut sink = BufferSink::with_request_body(b"plum");
        let err = create_object(onode_vid, data_vid, "plum", &mut sink, 4, 1, &mut store, &mut allocator, &limits).unwrap_err();
        assert!(matches!(err, Error::NoSpace));
        assert_eq!(sink.status(), Some(Status::ServiceUnavailable));
    }
}
