//! Username search module

pub mod trie;

pub use trie::{Autocomplete, UsernameTrie};
