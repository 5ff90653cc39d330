use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{IoContext, Result};

pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_path(path)
}

/// Copies `size` bytes starting at `offset`, zero-filling whatever lies past the end of `data`.
/// The flag is true when any filling was needed.
pub fn read_padded(data: &[u8], offset: usize, size: usize) -> (Vec<u8>, bool) {
    let mut buffer = vec![0u8; size];
    let start = offset.min(data.len());
    let end = offset.saturating_add(size).min(data.len());
    let available = end - start;
    buffer[..available].copy_from_slice(&data[start..end]);
    (buffer, available < size)
}

pub fn string_from_bytes(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).to_string()
}

/// Writes `data` to `path`, replacing any existing file.
pub fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_path(parent)?;
    }
    let mut out_file = OpenOptions::new().write(true).create(true).truncate(true).open(path).with_path(path)?;
    out_file.write_all(data).with_path(path)?;
    Ok(())
}
