//! Disk cache for query results.
//!
//! One JSON file per key under a hidden directory in the caller's home,
//! each entry carrying its own expiry timestamp. Entries can optionally be
//! stored zlib-compressed; reads handle both forms transparently.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

const CACHE_DIR_NAME: &str = ".awstags";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("could not locate home directory for the cache")]
    NoHomeDir,

    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// A cache read, with enough metadata for the caller to decide whether
/// stale data is acceptable.
#[derive(Debug)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    pub is_expired: bool,
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    cache_dir: PathBuf,
    compress: bool,
}

impl DiskCache {
    /// Opens the default cache at `~/.awstags`.
    pub fn open() -> Result<Self, CacheError> {
        let home = dirs_next::home_dir().ok_or(CacheError::NoHomeDir)?;
        Ok(Self {
            cache_dir: home.join(CACHE_DIR_NAME),
            compress: false,
        })
    }

    /// Opens a cache rooted at a specific directory.
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            compress: false,
        }
    }

    /// Enables or disables zlib compression for subsequent writes.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        // keys carry ':' and possibly path separators; keep filenames tame
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.cache_dir.join(format!("{}.json", safe_key))
    }

    /// Stores `data` under `key`, expiring `ttl_secs` from now.
    pub fn write<T: Serialize>(&self, key: &str, data: &T, ttl_secs: u64) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir)?;

        let now = Utc::now();
        let entry = CacheEntry {
            data,
            cached_at: now,
            expires_at: now + Duration::seconds(ttl_secs as i64),
        };
        let json = serde_json::to_vec(&entry)?;

        let bytes = if self.compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&json)?;
            encoder.finish()?
        } else {
            json
        };

        fs::write(self.entry_path(key), bytes)?;
        Ok(())
    }

    /// Reads the entry under `key`, expired or not.
    ///
    /// Missing, unreadable, and corrupt entries all read as `None`; the
    /// caller refetches in every such case.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        let bytes = fs::read(self.entry_path(key)).ok()?;

        // 0x78 is the zlib CMF byte; no JSON document starts with 'x'
        let json = if bytes.first() == Some(&0x78) {
            let mut decoded = Vec::new();
            ZlibDecoder::new(&bytes[..]).read_to_end(&mut decoded).ok()?;
            decoded
        } else {
            bytes
        };

        let entry: CacheEntry<T> = serde_json::from_slice(&json).ok()?;
        Some(CachedData {
            is_expired: Utc::now() > entry.expires_at,
            data: entry.data,
            cached_at: entry.cached_at,
        })
    }
}
