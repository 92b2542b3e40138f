//! Huffman coding for stored post and message bodies
//!
//! The tree is rebuilt from the frequency table on both sides, so only the
//! table travels with the payload. Construction order is fully determined by
//! `(frequency, order)` where leaves use their symbol value as `order` and
//! internal nodes use `256 + creation index`; identical input therefore
//! always yields identical codes.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Symbol -> occurrence count
pub type FrequencyTable = BTreeMap<u8, u64>;

/// A Huffman tree over byte symbols
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HuffmanTree {
    Leaf {
        symbol: u8,
        frequency: u64,
    },
    Internal {
        frequency: u64,
        left: Box<HuffmanTree>,
        right: Box<HuffmanTree>,
    },
}

impl HuffmanTree {
    pub fn frequency(&self) -> u64 {
        match self {
            HuffmanTree::Leaf { frequency, .. } | HuffmanTree::Internal { frequency, .. } => {
                *frequency
            }
        }
    }

    /// Longest root-to-leaf path in edges
    pub fn height(&self) -> usize {
        match self {
            HuffmanTree::Leaf { .. } => 0,
            HuffmanTree::Internal { left, right, .. } => 1 + left.height().max(right.height()),
        }
    }

    /// Bit code per symbol (`false` = left). A lone leaf gets the code `0`.
    pub fn code_table(&self) -> BTreeMap<u8, Vec<bool>> {
        let mut table = BTreeMap::new();
        match self {
            HuffmanTree::Leaf { symbol, .. } => {
                table.insert(*symbol, vec![false]);
            }
            HuffmanTree::Internal { .. } => Self::collect_codes(self, &mut Vec::new(), &mut table),
        }
        table
    }

    fn collect_codes(node: &HuffmanTree, prefix: &mut Vec<bool>, table: &mut BTreeMap<u8, Vec<bool>>) {
        match node {
            HuffmanTree::Leaf { symbol, .. } => {
                table.insert(*symbol, prefix.clone());
            }
            HuffmanTree::Internal { left, right, .. } => {
                prefix.push(false);
                Self::collect_codes(left, prefix, table);
                prefix.pop();
                prefix.push(true);
                Self::collect_codes(right, prefix, table);
                prefix.pop();
            }
        }
    }
}

/// Heap entry ordered by `(frequency, order)` only
struct HeapEntry {
    frequency: u64,
    order: u32,
    tree: HuffmanTree,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.frequency, self.order).cmp(&(other.frequency, other.order))
    }
}

/// Serialized alongside the bitstream so the decoder can rebuild the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FrequencyHeader {
    symbols: Vec<(u8, u64)>,
}

/// Output of [`encode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Codes packed most significant bit first; the last byte is zero padded
    pub bits: Bytes,

    /// Number of meaningful bits in `bits`
    pub bit_len: u64,

    /// bincode-encoded frequency table
    pub header: Bytes,

    pub original_len: u64,
}

impl EncodedPayload {
    /// Original size over stored size (header + bitstream)
    pub fn compression_ratio(&self) -> f64 {
        let stored = self.bits.len() + self.header.len();
        if stored == 0 {
            return 0.0;
        }
        self.original_len as f64 / stored as f64
    }
}

pub fn build_frequency_table(bytes: &[u8]) -> FrequencyTable {
    let mut counts = [0u64; 256];
    for &byte in bytes {
        counts[byte as usize] += 1;
    }

    counts
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(symbol, &count)| (symbol as u8, count))
        .collect()
}

/// Build the tree with a min-heap; `None` for an empty table
pub fn build_tree(table: &FrequencyTable) -> Option<HuffmanTree> {
    let mut heap: BinaryHeap<Reverse<HeapEntry>> = table
        .iter()
        .filter(|(_, &frequency)| frequency > 0)
        .map(|(&symbol, &frequency)| {
            Reverse(HeapEntry {
                frequency,
                order: symbol as u32,
                tree: HuffmanTree::Leaf { symbol, frequency },
            })
        })
        .collect();

    let mut next_order = 256u32;
    while heap.len() > 1 {
        let (Some(Reverse(left)), Some(Reverse(right))) = (heap.pop(), heap.pop()) else {
            break;
        };

        let frequency = left.frequency + right.frequency;
        heap.push(Reverse(HeapEntry {
            frequency,
            order: next_order,
            tree: HuffmanTree::Internal {
                frequency,
                left: Box::new(left.tree),
                right: Box::new(right.tree),
            },
        }));
        next_order += 1;
    }

    heap.pop().map(|Reverse(entry)| entry.tree)
}

struct BitWriter {
    buf: BytesMut,
    current: u8,
    filled: u8,
    bit_len: u64,
}

impl BitWriter {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(bytes),
            current: 0,
            filled: 0,
            bit_len: 0,
        }
    }

    fn push(&mut self, bit: bool) {
        self.current = (self.current << 1) | bit as u8;
        self.filled += 1;
        self.bit_len += 1;
        if self.filled == 8 {
            self.buf.put_u8(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    fn finish(mut self) -> (Bytes, u64) {
        if self.filled > 0 {
            self.buf.put_u8(self.current << (8 - self.filled));
        }
        (self.buf.freeze(), self.bit_len)
    }
}

fn bit_at(bits: &[u8], index: u64) -> bool {
    let byte = bits[(index / 8) as usize];
    (byte >> (7 - (index % 8))) & 1 == 1
}

/// Compress `bytes`; empty input produces an empty bitstream
pub fn encode(bytes: &[u8]) -> Result<EncodedPayload> {
    let table = build_frequency_table(bytes);
    let header = FrequencyHeader {
        symbols: table.iter().map(|(&s, &f)| (s, f)).collect(),
    };
    let header = bincode::serialize(&header)
        .map_err(|e| EngineError::malformed(format!("header serialization failed: {}", e)))?;

    let mut writer = BitWriter::with_capacity(bytes.len() / 2 + 1);
    if let Some(tree) = build_tree(&table) {
        let codes = tree.code_table();
        let empty: &[bool] = &[];
        let mut lookup: Vec<&[bool]> = vec![empty; 256];
        for (symbol, code) in &codes {
            lookup[*symbol as usize] = code.as_slice();
        }
        for &byte in bytes {
            for &bit in lookup[byte as usize] {
                writer.push(bit);
            }
        }
    }

    let (bits, bit_len) = writer.finish();
    Ok(EncodedPayload {
        bits,
        bit_len,
        header: Bytes::from(header),
        original_len: bytes.len() as u64,
    })
}

/// Restore the original bytes, rejecting any inconsistent payload
pub fn decode(payload: &EncodedPayload) -> Result<Vec<u8>> {
    let header: FrequencyHeader = bincode::deserialize(&payload.header)
        .map_err(|e| EngineError::malformed(format!("unreadable frequency header: {}", e)))?;

    let table = validate_header(&header)?;
    let total: u64 = table.values().sum();
    if total != payload.original_len {
        return Err(EngineError::malformed(format!(
            "frequency total {} does not match original length {}",
            total, payload.original_len
        )));
    }

    let expected_bytes = (payload.bit_len + 7) / 8;
    if payload.bits.len() as u64 != expected_bytes {
        return Err(EngineError::malformed(format!(
            "bitstream holds {} bytes, {} bits need {}",
            payload.bits.len(),
            payload.bit_len,
            expected_bytes
        )));
    }

    // Every symbol costs at least one bit
    if payload.original_len > payload.bit_len {
        return Err(EngineError::malformed(format!(
            "original length {} exceeds the {} bits available",
            payload.original_len, payload.bit_len
        )));
    }

    let tree = match build_tree(&table) {
        Some(tree) => tree,
        None if payload.bit_len == 0 => return Ok(Vec::new()),
        None => return Err(EngineError::malformed("bits present for empty content")),
    };

    let bits = &payload.bits[..];
    let mut output = Vec::with_capacity(payload.original_len as usize);

    if let HuffmanTree::Leaf { symbol, .. } = &tree {
        // One symbol: every occurrence is a single zero bit
        if payload.bit_len != payload.original_len
            || (0..payload.bit_len).any(|i| bit_at(bits, i))
        {
            return Err(EngineError::malformed("invalid single-symbol bitstream"));
        }
        output.resize(payload.original_len as usize, *symbol);
        return Ok(output);
    }

    let mut node = &tree;
    for index in 0..payload.bit_len {
        if output.len() as u64 == payload.original_len {
            return Err(EngineError::malformed("trailing bits after last symbol"));
        }

        node = match node {
            HuffmanTree::Internal { left, right, .. } => {
                if bit_at(bits, index) {
                    right.as_ref()
                } else {
                    left.as_ref()
                }
            }
            HuffmanTree::Leaf { .. } => &tree,
        };

        if let HuffmanTree::Leaf { symbol, .. } = node {
            output.push(*symbol);
            node = &tree;
        }
    }

    if output.len() as u64 != payload.original_len || !std::ptr::eq(node, &tree) {
        return Err(EngineError::malformed(format!(
            "bitstream ended after {} of {} symbols",
            output.len(),
            payload.original_len
        )));
    }

    Ok(output)
}

fn validate_header(header: &FrequencyHeader) -> Result<FrequencyTable> {
    let mut table = FrequencyTable::new();
    let mut total: u64 = 0;
    for &(symbol, frequency) in &header.symbols {
        if frequency == 0 {
            return Err(EngineError::malformed(format!("zero frequency for symbol {}", symbol)));
        }
        if table.insert(symbol, frequency).is_some() {
            return Err(EngineError::malformed(format!("symbol {} listed twice", symbol)));
        }
        total = total
            .checked_add(frequency)
            .ok_or_else(|| EngineError::malformed("frequency total overflows"))?;
    }
    Ok(table)
}
