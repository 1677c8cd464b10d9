#![forbid(unsafe_code)]

/// A compact bit vector used for column validity and boolean storage.
///
/// Bits are stored little-endian within each `u64` word:
/// - bit 0 is the LSB of word 0
/// - bit 63 is the MSB of word 0
///
/// Bits past `len` in the last word are always zero, so derived equality compares contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitVec {
    words: Vec<u64>,
    len: usize,
    ones: usize,
}

impl BitVec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bits(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(bits.div_ceil(64)),
            len: 0,
            ones: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn count_ones(&self) -> usize {
        self.ones
    }

    pub fn count_zeros(&self) -> usize {
        self.len - self.ones
    }

    /// Make room for at least `bits` total bits without reallocating.
    pub fn reserve_total(&mut self, bits: usize) {
        let words = bits.div_ceil(64);
        self.words
            .reserve(words.saturating_sub(self.words.len()));
    }

    pub fn push(&mut self, value: bool) {
        let bit = self.len % 64;
        if bit == 0 {
            self.words.push(0);
        }
        if value {
            self.words[self.len / 64] |= 1u64 << bit;
            self.ones += 1;
        }
        self.len += 1;
    }

    pub fn get(&self, index: usize) -> bool {
        debug_assert!(index < self.len, "BitVec index out of bounds");
        let word = self.words[index / 64];
        ((word >> (index % 64)) & 1) == 1
    }

    pub fn set(&mut self, index: usize, value: bool) {
        debug_assert!(index < self.len, "BitVec index out of bounds");
        let word = &mut self.words[index / 64];
        let mask = 1u64 << (index % 64);
        let was_set = (*word & mask) != 0;
        match (was_set, value) {
            (true, false) => {
                *word &= !mask;
                self.ones -= 1;
            }
            (false, true) => {
                *word |= mask;
                self.ones += 1;
            }
            _ => {}
        }
    }

    /// Grow or shrink to `len` bits. New bits take `value`.
    pub fn resize(&mut self, len: usize, value: bool) {
        if len <= self.len {
            self.truncate(len);
            return;
        }
        self.reserve_total(len);
        while self.len < len {
            self.push(value);
        }
    }

    fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let mut ones = 0usize;
        let full_words = len / 64;
        let rem_bits = len % 64;
        self.words.truncate(len.div_ceil(64));
        for w in self.words.iter().take(full_words) {
            ones += w.count_ones() as usize;
        }
        if rem_bits > 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem_bits) - 1;
                ones += last.count_ones() as usize;
            }
        }
        self.len = len;
        self.ones = ones;
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |idx| self.get(idx))
    }
}
