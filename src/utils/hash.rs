//! Change detection for module sources and bundle outputs.

use std::hash::Hasher;

use rustc_hash::FxHasher;

/// Not stable across releases; never persist it.
pub fn compute<T: AsRef<[u8]> + ?Sized>(bytes: &T) -> u64 {
    let mut state = FxHasher::default();
    state.write(bytes.as_ref());
    state.finish()
}
