//! The gateway's error taxonomy.
//!
//! Mirrors the error classes the backing store and placement layer can
//! raise: a caller-recoverable subset (`NotFound`, `AlreadyExists`), an
//! internally-recovered subset (`Conflict`, handled by continuing to
//! probe), and a surfaced subset (`NoSpace`, `BackendIO`, `Corrupt`,
//! `Invalid`) that maps onto an HTTP status one layer up.

use std::fmt;
use std::io;

/// Errors produced by the placement and index layers.
#[derive(Debug)]
pub enum Error {
    /// No such account, bucket, object, volume or OID.
    NotFound,
    /// A bucket or create-exclusive object already exists under that name.
    AlreadyExists,
    /// Malformed request or size mismatch.
    Invalid(&'static str),
    /// The probe sequence, or the extent allocator, ran out of room.
    NoSpace,
    /// A probe slot is occupied by a different name; recovered locally by
    /// advancing to the next slot.
    Conflict,
    /// The backing store propagated a failure.
    BackendIO(String),
    /// On-disk data failed a structural check (bad magic, impossible
    /// depth, length mismatch).
    Corrupt(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => write!(f, "not found"),
            Error::AlreadyExists => write!(f, "already exists"),
            Error::Invalid(msg) => write!(f, "invalid request: {msg}"),
            Error::NoSpace => write!(f, "no space left"),
            Error::Conflict => write!(f, "slot taken by a different name"),
            Error::BackendIO(msg) => write!(f, "backend I/O error: {msg}"),
            Error::Corrupt(msg) => write!(f, "corrupt on-disk data: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::BackendIO(e.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
