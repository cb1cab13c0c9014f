//! Capability interfaces the placement layer consumes.
//!
//! The wire protocol to the backing store and the HTTP front-end are both
//! out of scope for this crate; they are represented here as the abstract
//! capabilities the core algorithms actually call through.

use crate::error::Result;

/// A volume lookup failure more specific than the generic error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeLookupError {
    /// No volume is registered under that name.
    NoVolume,
    /// The backing store failed for an unrelated reason.
    Other,
}

/// The backing block-object store, as consumed by the placement layer.
///
/// All methods are blocking: per §5, every call may suspend the calling
/// task, and there is no cooperative yielding beyond these call sites.
pub trait ObjectStore {
    /// Resolves a volume name to its VID.
    fn lookup_volume_by_name(&self, name: &str) -> std::result::Result<u32, VolumeLookupError>;

    /// Creates a new volume named `name` with the given logical `size` in
    /// bytes, returning its freshly assigned VID.
    fn new_volume(
        &mut self,
        name: &str,
        size: u64,
        nr_copies: u8,
        copy_policy: u8,
        store_policy: u8,
    ) -> Result<u32>;

    /// Deletes the volume named `name`.
    fn delete_volume(&mut self, name: &str) -> Result<()>;

    /// Reads `len` bytes of `oid` starting at `offset` into `buf`.
    fn read_object(&self, oid: u64, buf: &mut [u8], offset: u64) -> Result<()>;

    /// Writes `buf` to `oid` starting at `offset`. `create` requests that
    /// the object be created if it does not already exist.
    fn write_object(&mut self, oid: u64, buf: &[u8], offset: u64, create: bool) -> Result<()>;

    /// Creates `oid` with body `buf`. Must fail with
    /// [`crate::error::Error::AlreadyExists`] if the object already exists.
    fn create_object(&mut self, oid: u64, buf: &[u8]) -> Result<()>;

    /// Discards `oid` and any storage backing it.
    fn discard_object(&mut self, oid: u64) -> Result<()>;
}

/// HTTP status codes the placement layer can request the front-end set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Created,
    Accepted,
    NoContent,
    NotFound,
    ServiceUnavailable,
    InternalServerError,
}

/// The streaming request/response body, as consumed by the placement layer.
pub trait RequestSink {
    /// Reads up to `buf.len()` bytes of the request body. Returns the
    /// number of bytes read, or `0` at end of stream.
    fn read_body_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes `buf` to the response body.
    fn write_body_chunk(&mut self, buf: &[u8]) -> Result<()>;

    /// Sets the response status.
    fn set_status(&mut self, status: Status);
}
