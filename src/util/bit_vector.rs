use std::fmt;

/// Growable set of bits, used for stack masks and dex register liveness masks
///
/// Storage never carries trailing zero words, so two vectors holding the same set bits compare
/// (and hash) equal no matter how they were built up.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitVector {
    words: Vec<u32>,
}

impl BitVector {
    const WORD_BITS: usize = 32;

    /// New empty bit vector
    pub fn new() -> BitVector {
        BitVector { words: vec![] }
    }

    /// Bit vector with exactly the given bits set
    pub fn from_bits<I: IntoIterator<Item = usize>>(bits: I) -> BitVector {
        let mut vector = BitVector::new();
        for bit in bits {
            vector.set_bit(bit);
        }
        vector
    }

    pub fn set_bit(&mut self, bit: usize) {
        let word = bit / Self::WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (bit % Self::WORD_BITS);
    }

    pub fn clear_bit(&mut self, bit: usize) {
        let word = bit / Self::WORD_BITS;
        if let Some(stored) = self.words.get_mut(word) {
            *stored &= !(1 << (bit % Self::WORD_BITS));
            self.trim();
        }
    }

    pub fn clear_all_bits(&mut self) {
        self.words.clear();
    }

    pub fn is_bit_set(&self, bit: usize) -> bool {
        self.words
            .get(bit / Self::WORD_BITS)
            .map_or(false, |word| word & (1 << (bit % Self::WORD_BITS)) != 0)
    }

    /// Number of bits needed to hold every set bit (aka. highest set bit plus one)
    pub fn number_of_bits(&self) -> usize {
        match self.words.last() {
            None => 0,
            Some(last) => {
                (self.words.len() - 1) * Self::WORD_BITS
                    + (Self::WORD_BITS - last.leading_zeros() as usize)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Indices of set bits, in increasing order
    pub fn iter_set_bits(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.number_of_bits()).filter(move |bit| self.is_bit_set(*bit))
    }

    /// Raw storage, in 32-bit words (lowest bits first)
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("BitVector(")?;
        for bit in 0..self.number_of_bits() {
            formatter.write_str(if self.is_bit_set(bit) { "1" } else { "0" })?;
        }
        formatter.write_str(")")
    }
}
