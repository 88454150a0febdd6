//! Gzip wrapping for page bodies stored in the embedded backend.
//!
//! The envelope carries no compression flag; backend identity decides.
//! The embedded store compresses, the object store keeps raw HTML.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

use crate::Error;

/// Gzip `data` at the default level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Internal(format!("compress: {e}")))?;
    encoder
        .finish()
        .map_err(|e| Error::Internal(format!("compress: {e}")))
}

/// Reverse of [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Internal(format!("decompress: {e}")))?;
    Ok(out)
}
