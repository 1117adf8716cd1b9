//! Order-sensitive hashing of lookup paths

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const GOLDEN_RATIO: u64 = 0x9e37_79b9;

fn hash_segment(segment: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    segment.hash(&mut hasher);
    hasher.finish()
}

/// Fold path segments into one key.
///
/// `h ^= hash(k) + 0x9e3779b9 + (h << 6) + (h >> 2)`, applied left to right,
/// so `["a", "b"]` and `["b", "a"]` hash differently.
pub fn hash_path<S: AsRef<str>>(keys: &[S]) -> u64 {
    keys.iter().fold(0u64, |h, key| {
        h ^ hash_segment(key.as_ref())
            .wrapping_add(GOLDEN_RATIO)
            .wrapping_add(h << 6)
            .wrapping_add(h >> 2)
    })
}
