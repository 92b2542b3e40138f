//! Content compression module

pub mod container;
pub mod huffman;

pub use huffman::{build_frequency_table, build_tree, decode, encode, EncodedPayload, HuffmanTree};
