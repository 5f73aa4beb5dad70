use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::IoError;
use crate::storage::traits::Storage;
use crate::Result;

/// Local filesystem storage (rooted at the host filesystem). `write` is
/// atomic: bytes land in a sibling temp file first, then are renamed into
/// place, so a reader never observes a partially-written checkpoint or
/// archive object.
#[derive(Debug, Clone, Default)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for FsStorage {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).map_err(|e| IoError::Io {
                path: path.to_string(),
                source: e,
            })?;
        }
        let tmp_path = p.with_extension(format!(
            "{}.tmp",
            p.extension().and_then(|e| e.to_str()).unwrap_or("part")
        ));
        {
            let mut f = File::create(&tmp_path).map_err(|e| IoError::Io {
                path: path.to_string(),
                source: e,
            })?;
            f.write_all(bytes).map_err(|e| IoError::Io {
                path: path.to_string(),
                source: e,
            })?;
            f.sync_all().map_err(|e| IoError::Io {
                path: path.to_string(),
                source: e,
            })?;
        }
        fs::rename(&tmp_path, p).map_err(|e| IoError::Io {
            path: path.to_string(),
            source: e,
        })?;
        Ok(())
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut f = File::open(Path::new(path)).map_err(|e| IoError::Io {
            path: path.to_string(),
            source: e,
        })?;
        f.seek(SeekFrom::Start(offset)).map_err(|e| IoError::Io {
            path: path.to_string(),
            source: e,
        })?;
        let mut buf = vec![0u8; len];
        let n = f.read(&mut buf).map_err(|e| IoError::Io {
            path: path.to_string(),
            source: e,
        })?;
        buf.truncate(n);
        Ok(buf)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let p = Path::new(path);
        if p.exists() {
            fs::remove_file(p).map_err(|e| IoError::Io {
                path: path.to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix_path = Path::new(prefix);
        let mut results = Vec::new();

        if !prefix_path.exists() {
            return Ok(results);
        }

        if prefix_path.is_file() {
            if let Some(s) = prefix_path.to_str() {
                results.push(s.to_string());
            }
            return Ok(results);
        }

        fn visit_dirs(dir: &Path, results: &mut Vec<String>) -> std::io::Result<()> {
            if dir.is_dir() {
                for entry in fs::read_dir(dir)? {
                    let entry = entry?;
                    let path = entry.path();
                    if path.is_dir() {
                        visit_dirs(&path, results)?;
                    } else if let Some(s) = path.to_str() {
                        results.push(s.to_string());
                    }
                }
            }
            Ok(())
        }

        visit_dirs(prefix_path, &mut results).map_err(|e| IoError::Io {
            path: prefix.to_string(),
            source: e,
        })?;

        Ok(results)
    }

    fn size(&self, path: &str) -> Result<u64> {
        let p = Path::new(path);
        let meta = fs::metadata(p).map_err(|e| IoError::Io {
            path: path.to_string(),
            source: e,
        })?;
        Ok(meta.len())
    }

    fn etag(&self, path: &str) -> Result<Option<String>> {
        // Pseudo-ETag: SHA-256(size || mtime || path). Good enough for cache
        // invalidation; never exposed as a cryptographic guarantee.
        let p = Path::new(path);
        match fs::metadata(p) {
            Ok(meta) => {
                let mut h = Sha256::new();
                h.update(meta.len().to_le_bytes());
                if let Ok(m) = meta.modified() {
                    if let Ok(d) = m.duration_since(std::time::SystemTime::UNIX_EPOCH) {
                        h.update(d.as_secs().to_le_bytes());
                        h.update(d.subsec_nanos().to_le_bytes());
                    }
                }
                if let Some(s) = p.to_str() {
                    h.update(s.as_bytes());
                }
                let hex: String = h
                    .finalize()
                    .iter()
                    .map(|b| format!("{b:02x}"))
                    .collect();
                Ok(Some(hex))
            }
            Err(_) => Ok(None),
        }
    }
}
