//! In-memory fakes for [`crate::store::ObjectStore`] and
//! [`crate::store::RequestSink`], used by every module's unit tests and by
//! the admin CLI's demo mode.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::store::{ObjectStore, RequestSink, Status, VolumeLookupError};

/// A backing store held entirely in memory: a name→VID table plus a flat
/// OID→bytes map. Good enough to exercise placement and index logic; makes
/// no attempt at replication, epochs, or persistence.
#[derive(Default)]
pub struct InMemoryStore {
    volumes: HashMap<String, u32>,
    next_vid: u32,
    objects: HashMap<u64, Vec<u8>>,
}

impl InMemoryStore {
    /// Builds an empty store. VID `0` is reserved to mean "no volume", so
    /// allocation starts at `1`.
    pub fn new() -> Self {
        Self {
            volumes: HashMap::new(),
            next_vid: 1,
            objects: HashMap::new(),
        }
    }

    /// Number of live objects, for test assertions.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl ObjectStore for InMemoryStore {
    fn lookup_volume_by_name(&self, name: &str) -> std::result::Result<u32, VolumeLookupError> {
        self.volumes
            .get(name)
            .copied()
            .ok_or(VolumeLookupError::NoVolume)
    }

    fn new_volume(
        &mut self,
        name: &str,
        _size: u64,
        _nr_copies: u8,
        _copy_policy: u8,
        _store_policy: u8,
    ) -> Result<u32> {
        if self.volumes.contains_key(name) {
            return Err(Error::AlreadyExists);
        }
        let vid = self.next_vid;
        self.next_vid += 1;
        self.volumes.insert(name.to_string(), vid);
        Ok(vid)
    }

    fn delete_volume(&mut self, name: &str) -> Result<()> {
        self.volumes.remove(name).map(|_| ()).ok_or(Error::NotFound)
    }

    fn read_object(&self, oid: u64, buf: &mut [u8], offset: u64) -> Result<()> {
        let body = self.objects.get(&oid).ok_or(Error::NotFound)?;
        let offset = offset as usize;
        let end = offset + buf.len();
        if end > body.len() {
            return Err(Error::Invalid("read past object end"));
        }
        buf.copy_from_slice(&body[offset..end]);
        Ok(())
    }

    fn write_object(&mut self, oid: u64, buf: &[u8], offset: u64, create: bool) -> Result<()> {
        let offset = offset as usize;
        let body = match self.objects.get_mut(&oid) {
            Some(body) => body,
            None if create => self.objects.entry(oid).or_insert_with(Vec::new),
            None => return Err(Error::NotFound),
        };
        if body.len() < offset + buf.len() {
            body.resize(offset + buf.len(), 0);
        }
        body[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn create_object(&mut self, oid: u64, buf: &[u8]) -> Result<()> {
        if self.objects.contains_key(&oid) {
            return Err(Error::AlreadyExists);
        }
        self.objects.insert(oid, buf.to_vec());
        Ok(())
    }

    fn discard_object(&mut self, oid: u64) -> Result<()> {
        self.objects.remove(&oid).map(|_| ()).ok_or(Error::NotFound)
    }
}

/// An in-memory request/response body pair, standing in for the HTTP
/// front-end's streaming I/O.
#[derive(Default)]
pub struct BufferSink {
    request_body: Vec<u8>,
    read_pos: usize,
    response_body: Vec<u8>,
    status: Option<Status>,
}

impl BufferSink {
    /// Builds a sink whose request body is `body`.
    pub fn with_request_body(body: &[u8]) -> Self {
        Self {
            request_body: body.to_vec(),
            read_pos: 0,
            response_body: Vec::new(),
            status: None,
        }
    }

    /// The bytes written so far via `write_body_chunk`.
    pub fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    /// The last status set via `set_status`, if any.
    pub fn status(&self) -> Option<Status> {
        self.status
    }
}

impl RequestSink for BufferSink {
    fn read_body_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.request_body.len() - self.read_pos;
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&self.request_body[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        Ok(n)
    }

    fn write_body_chunk(&mut self, buf: &[u8]) -> Result<()> {
        self.response_body.extend_from_slice(buf);
        Ok(())
    }

    fn set_status(&mut self, status: Status) {
        self.status = Some(status);
    }
}
