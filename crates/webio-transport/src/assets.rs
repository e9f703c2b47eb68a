//! Asset lookup: maps request paths to files on disk.
//!
//! Registering a local path yields a content-addressed token of the form
//! `/assetserver/{sha256 of the absolute path}-{basename}`, with the basename
//! percent-encoded. The token is the request path the browser uses.
//! Registering a directory exposes every file beneath it as
//! `{token}/{relative path}`.
//!
//! Entries are keyed by decoded path. [`AssetLookup::resolve`] decodes the
//! request path before matching, so tokens and browser-encoded variants of
//! them resolve alike.

use std::path::{Component, Path, PathBuf};

use dashmap::DashMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// Request-path prefix for registered assets.
pub const ASSET_PREFIX: &str = "/assetserver/";

/// Bytes left unescaped in a token's basename (RFC 3986 unreserved).
const NAME_ENCODE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("failed to resolve asset path {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Request path → file path capability consumed by the HTTP handler.
///
/// Implementations must tolerate `register` racing with `resolve`.
pub trait AssetLookup: Send + Sync + 'static {
    /// Make a local file or directory servable. Returns its request path.
    fn register(&self, path: &Path) -> Result<String, AssetError>;

    /// Map a request path to a file path, if one is registered.
    fn resolve(&self, request_path: &str) -> Option<PathBuf>;
}

#[derive(Debug, Clone)]
struct AssetEntry {
    path: PathBuf,
    is_dir: bool,
}

/// Concurrent in-memory asset registry. Entries are never evicted.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    entries: DashMap<String, AssetEntry>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map an explicit request path to a file, bypassing token derivation.
    ///
    /// `request_path` is taken in decoded form.
    pub fn insert(&self, request_path: impl Into<String>, path: impl Into<PathBuf>) {
        let path = path.into();
        let is_dir = path.is_dir();
        self.entries.insert(request_path.into(), AssetEntry { path, is_dir });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The token an absolute path registers under, as sent over the wire.
    pub fn token_for(path: &Path) -> String {
        let digest = Sha256::digest(path.to_string_lossy().as_bytes());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "{ASSET_PREFIX}{}-{}",
            hex::encode(digest),
            utf8_percent_encode(&name, NAME_ENCODE)
        )
    }

    /// Resolve `{dir token}/{relative}` against a registered directory.
    fn resolve_in_directory(&self, request_path: &str) -> Option<PathBuf> {
        let mut split = request_path.len();
        while let Some(idx) = request_path[..split].rfind('/') {
            if idx < ASSET_PREFIX.len() {
                return None;
            }
            let (prefix, rest) = (&request_path[..idx], &request_path[idx + 1..]);
            if let Some(entry) = self.entries.get(prefix) {
                if !entry.is_dir {
                    return None;
                }
                let relative = safe_relative(rest)?;
                return Some(entry.path.join(relative));
            }
            split = idx;
        }
        None
    }
}

impl AssetLookup for AssetRegistry {
    fn register(&self, path: &Path) -> Result<String, AssetError> {
        let absolute = std::fs::canonicalize(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound(path.to_path_buf())
            } else {
                AssetError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let token = Self::token_for(&absolute);
        let key = decode_path(&token).unwrap_or_else(|| token.clone());
        debug!("Registered asset {} as {token}", absolute.display());
        self.insert(key, absolute);
        Ok(token)
    }

    fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        // Decoding precedes the traversal check so `%2e%2e` is caught too.
        let decoded = decode_path(request_path)?;
        if let Some(entry) = self.entries.get(decoded.as_str()) {
            return Some(entry.path.clone());
        }
        if decoded.starts_with(ASSET_PREFIX) {
            return self.resolve_in_directory(&decoded);
        }
        None
    }
}

/// Percent-decode a request path. Paths that do not decode to UTF-8 match
/// nothing.
fn decode_path(request_path: &str) -> Option<String> {
    percent_decode_str(request_path)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Accept a relative path only if every segment is a plain name.
fn safe_relative(rest: &str) -> Option<PathBuf> {
    if rest.is_empty() || rest.contains(['\\', '\0']) {
        return None;
    }
    let relative = Path::new(rest);
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| relative.to_path_buf())
}
