//! The `bit_pack_cut_sets` wire format (spec §6.2): a dense basic-event
//! index table plus one or more base64-encoded buffers of fixed-size
//! records, each `[order: u16 LE][bit-vector: ceil(N/8) bytes, LSB-first]`,
//! bit `i` set iff basic event `i` appears positively in the product.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// At most this many records per logical buffer (spec's `batch-records`).
pub const BATCH_RECORDS: usize = 10_000_000;
/// Base64 text is further split so no single chunk exceeds this many bytes
/// (spec's "Data is base64 encoded in ≤1 MiB chunks").
const MAX_CHUNK_BYTES: usize = 1_048_576;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BitPackedCutSets {
    pub encoding: String,
    pub basic_event_table: Vec<String>,
    pub batch_records: usize,
    pub bytes_per_vector: usize,
    pub order_bytes: u8,
    pub endianness: String,
    pub bit_order: String,
    pub buffers: Vec<Buffer>,
}

/// One `<buffers>` entry: the base64 text for its records, pre-split into
/// chunks no base64 decoder needs reassembled from anything but
/// concatenation (each chunk length is a multiple of 4 base64 characters).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Buffer {
    pub record_count: usize,
    pub base64_chunks: Vec<String>,
}

/// One product's literals as dense basic-event indices, positive entries
/// only contributing a set bit (negative literals are absent from the
/// wire format per spec — only positive appearances are encoded).
pub fn pack_products(products: &[Vec<i32>], basic_event_count: usize) -> BitPackedCutSets {
    let bytes_per_vector = basic_event_count.div_ceil(8);
    let record_size = 2 + bytes_per_vector;

    let buffers = products
        .chunks(BATCH_RECORDS)
        .map(|batch| {
            let mut raw = Vec::with_capacity(batch.len() * record_size);
            for product in batch {
                let order = product.len() as u16;
                raw.extend_from_slice(&order.to_le_bytes());
                let mut bits = vec![0u8; bytes_per_vector];
                for &literal in product {
                    if literal > 0 {
                        let idx = (literal - 1) as usize;
                        if idx < basic_event_count {
                            bits[idx / 8] |= 1 << (idx % 8);
                        }
                    }
                }
                raw.extend_from_slice(&bits);
            }
            let encoded = STANDARD.encode(&raw);
            Buffer {
                record_count: batch.len(),
                base64_chunks: split_base64(&encoded, MAX_CHUNK_BYTES),
            }
        })
        .collect();

    BitPackedCutSets {
        encoding: "base64".into(),
        basic_event_table: Vec::new(),
        batch_records: BATCH_RECORDS,
        bytes_per_vector,
        order_bytes: 2,
        endianness: "little".into(),
        bit_order: "lsb0".into(),
        buffers,
    }
}

/// Split base64 text on 4-character boundaries so every chunk is itself
/// valid, independently decodable base64 (`4 | max_bytes` is not required
/// — we just round the chunk length down to the nearest multiple of 4).
fn split_base64(encoded: &str, max_bytes: usize) -> Vec<String> {
    let aligned_max = (max_bytes / 4).max(1) * 4;
    let bytes = encoded.as_bytes();
    bytes
        .chunks(aligned_max)
        .map(|c| String::from_utf8(c.to_vec()).expect("base64 output is ASCII"))
        .collect()
}

/// Decode every buffer back into `(order, bits)` pairs, for round-trip
/// testing and for any future report-reading tooling.
pub fn unpack_products(cut_sets: &BitPackedCutSets) -> Vec<(u16, Vec<u8>)> {
    let mut out = Vec::new();
    let record_size = 2 + cut_sets.bytes_per_vector;
    for buffer in &cut_sets.buffers {
        let joined: String = buffer.base64_chunks.concat();
        let raw = STANDARD.decode(joined.as_bytes()).expect("valid base64");
        for record in raw.chunks_exact(record_size) {
            let order = u16::from_le_bytes([record[0], record[1]]);
            let bits = record[2..].to_vec();
            out.push((order, bits));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_unpack_round_trips_order_and_bits() {
        let products = vec![vec![1, 2], vec![3]];
        let packed = pack_products(&products, 3);
        let unpacked = unpack_products(&packed);
        assert_eq!(unpacked.len(), 2);
        assert_eq!(unpacked[0].0, 2);
        assert_eq!(unpacked[0].1[0] & 0b011, 0b011);
        assert_eq!(unpacked[1].0, 1);
        assert_eq!(unpacked[1].1[0] & 0b100, 0b100);
    }

    #[test]
    fn negative_literals_do_not_set_a_bit() {
        let products = vec![vec![1, -2]];
        let packed = pack_products(&products, 2);
        let unpacked = unpack_products(&packed);
        assert_eq!(unpacked[0].1[0], 0b01);
    }

    #[test]
    fn large_product_lists_split_into_multiple_batch_buffers() {
        let products: Vec<Vec<i32>> = (0..(BATCH_RECORDS + 10)).map(|i| vec![(i % 4) as i32 + 1]).collect();
        let packed = pack_products(&products, 4);
        assert_eq!(packed.buffers.len(), 2);
        assert_eq!(packed.buffers[0].record_count, BATCH_RECORDS);
        assert_eq!(packed.buffers[1].record_count, 10);
    }

    #[test]
    fn base64_chunks_are_all_within_the_byte_limit() {
        let products: Vec<Vec<i32>> = (0..200_000).map(|i| vec![(i % 8) as i32 + 1]).collect();
        let packed = pack_products(&products, 8);
        for buffer in &packed.buffers {
            for chunk in &buffer.base64_chunks {
                assert!(chunk.len() <= MAX_CHUNK_BYTES);
            }
        }
    }
}
