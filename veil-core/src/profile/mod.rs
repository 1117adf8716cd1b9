//! Profile store - the identity document hooks read their values from
//!
//! A profile is loaded once, flattened into an arena and never mutated. Path
//! lookups are memoized by a hash of the key sequence; the memo stores node
//! indices, so it can live next to the document without self-borrowing.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::error::ProfileError;

pub mod arena;
pub mod path;
pub mod user_agent;

pub use arena::{Document, Node, NodeId, NodeRef};
pub use path::hash_path;
pub use user_agent::{BrandVersion, UserAgentMetadata};

/// A resolved lookup, keyed by path hash
///
/// The full key is kept so a hash collision is detected instead of silently
/// returning the wrong node.
#[derive(Debug, Clone)]
struct MemoizedPath {
    key: Vec<String>,
    node: NodeId,
}

impl MemoizedPath {
    fn matches<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        self.key.len() == keys.len()
            && self.key.iter().zip(keys).all(|(a, b)| a == b.as_ref())
    }
}

/// Parsed, immutable profile with memoized path resolution
#[derive(Debug)]
pub struct ProfileStore {
    text: String,
    document: Document,
    lookups: RwLock<HashMap<u64, MemoizedPath>>,
    traversals: AtomicUsize,
}

impl ProfileStore {
    /// Read and parse a profile file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::parse(text)?;
        debug!(
            path = %path.display(),
            nodes = store.document.len(),
            "Loaded profile"
        );
        Ok(store)
    }

    /// Parse profile text held in memory. The text is kept verbatim.
    pub fn parse(text: impl Into<String>) -> Result<Self, ProfileError> {
        let text = text.into();
        let value: Value =
            serde_json::from_str(&text).map_err(|source| ProfileError::Parse { source })?;

        if !value.is_object() {
            let found = Document::from_value(&value).root().kind();
            return Err(ProfileError::NotAnObject { found });
        }

        Ok(Self {
            document: Document::from_value(&value),
            text,
            lookups: RwLock::new(HashMap::new()),
            traversals: AtomicUsize::new(0),
        })
    }

    /// Resolve a nested path. An empty path yields the root.
    ///
    /// Only maps are walked; a path through an array or scalar misses. Misses
    /// are not memoized.
    pub fn find<S: AsRef<str>>(&self, keys: &[S]) -> Option<NodeRef<'_>> {
        let hash = hash_path(keys);

        if let Some(node) = self.memoized(hash, keys) {
            trace!(hash, "Profile lookup served from memo");
            return Some(self.document.get(node));
        }

        let node = self.walk(keys)?;
        self.remember(hash, keys, node);
        Some(self.document.get(node))
    }

    /// Existence check over the same resolution path as [`find`](Self::find)
    pub fn contains<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        self.find(keys).is_some()
    }

    fn memoized<S: AsRef<str>>(&self, hash: u64, keys: &[S]) -> Option<NodeId> {
        let lookups = self.lookups.read().unwrap_or_else(|e| e.into_inner());
        let entry = lookups.get(&hash)?;
        if entry.matches(keys) {
            Some(entry.node)
        } else {
            debug!(hash, cached = ?entry.key, "Path hash collision, resolving uncached");
            None
        }
    }

    fn remember<S: AsRef<str>>(&self, hash: u64, keys: &[S], node: NodeId) {
        let mut lookups = self.lookups.write().unwrap_or_else(|e| e.into_inner());
        // First writer wins, so a colliding path never evicts the original.
        lookups.entry(hash).or_insert_with(|| MemoizedPath {
            key: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            node,
        });
    }

    fn walk<S: AsRef<str>>(&self, keys: &[S]) -> Option<NodeId> {
        self.traversals.fetch_add(1, Ordering::Relaxed);
        keys.iter().try_fold(NodeId::ROOT, |cursor, key| {
            self.document.child(cursor, key.as_ref())
        })
    }

    /// Number of tree walks performed so far
    pub fn traversals(&self) -> usize {
        self.traversals.load(Ordering::Relaxed)
    }

    /// The profile exactly as it was supplied
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Deep copy of the whole document
    pub fn to_value(&self) -> Value {
        self.document.to_value(NodeId::ROOT)
    }

    /// `sha256:<hex>` of the original text
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.find(&["navigator", "userAgent"])?.as_str()
    }

    pub fn platform(&self) -> Option<&str> {
        self.find(&["navigator", "platform"])?.as_str()
    }

    pub fn has_client_hints(&self) -> bool {
        self.contains(&["highEntropyValues"])
    }

    /// The `highEntropyValues` map, if present and a map
    pub fn client_hints(&self) -> Option<NodeRef<'_>> {
        self.find(&["highEntropyValues"])
            .filter(|n| matches!(n.node(), Node::Object(_)))
    }

    pub fn user_agent_metadata(&self) -> Result<UserAgentMetadata, ProfileError> {
        let hints = self.find(&["highEntropyValues"]).ok_or(ProfileError::MissingField {
            section: "profile",
            field: "highEntropyValues",
        })?;
        UserAgentMetadata::from_hints(&hints)
    }

    /// The `mediaDevices` list, if present and a list
    pub fn media_devices(&self) -> Option<NodeRef<'_>> {
        self.find(&["mediaDevices"])
            .filter(|n| matches!(n.node(), Node::Array(_)))
    }

    /// The `webgl` map, if present and a map
    pub fn webgl(&self) -> Option<NodeRef<'_>> {
        self.find(&["webgl"])
            .filter(|n| matches!(n.node(), Node::Object(_)))
    }
}

impl FromStr for ProfileStore {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
