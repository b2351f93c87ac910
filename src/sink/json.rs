use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::listing::Listing;

use super::SinkError;

/// Pretty-printed UTF-8 JSON array; an empty run writes `[]`.
pub fn write_json(path: &Path, listings: &[Listing]) -> Result<(), SinkError> {
    let file = File::create(path).map_err(|e| SinkError::Io { path: path.to_path_buf(), source: e })?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, listings).map_err(|e| SinkError::Json { path: path.to_path_buf(), source: e })?;
    writeln!(w).and_then(|_| w.flush()).map_err(|e| SinkError::Io { path: path.to_path_buf(), source: e })
}

/// Body of one remote listing object.
pub fn listing_bytes(listing: &Listing) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(listing)
}

#[cfg(test)]
pub fn read_json(path: &Path) -> Result<Vec<Listing>, SinkError> {
    let file = File::open(path).map_err(|e| SinkError::Io { path: path.to_path_buf(), source: e })?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| SinkError::Json { path: path.to_path_buf(), source: e })
}
