//! CRC-32 (IEEE 802.3, reflected) accumulator used to verify entry data
//! as it streams through the writer.

use crc32fast::Hasher;

/// Incremental CRC-32 accumulator. Correct on empty input (value `0`),
/// since `crc32fast::Hasher::new()` starts from that state.
#[derive(Default)]
pub struct Crc32 {
    hasher: Hasher,
}

impl Crc32 {
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn value(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}
