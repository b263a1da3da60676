use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::trace;

use crate::error::{RegionError, Result};

/// Width of one aligned device word in bytes.
pub const WORD_BYTES: usize = 4;

/// Default region capacity: 64 KiB, the size of the emulated BRAM window.
pub const DEFAULT_CAPACITY: usize = 0x1_0000;

/// A fixed-size, zero-initialized, byte-addressable device window.
///
/// Every access is bounds-checked against `[0, capacity)` before any byte is
/// touched. Nothing is truncated or wrapped.
pub struct MemoryRegion {
    bytes: Box<[u8]>,
}

impl MemoryRegion {
    /// Allocate a zeroed region of `capacity` bytes.
    ///
    /// The capacity must be a positive multiple of [`WORD_BYTES`] so every
    /// aligned word inside the region can be written back whole.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity % WORD_BYTES != 0 {
            return Err(RegionError::InvalidCapacity(capacity));
        }
        Ok(Self {
            bytes: vec![0; capacity].into_boxed_slice(),
        })
    }

    /// Region size in bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Read the 4 bytes at `[offset, offset + 4)`.
    ///
    /// Bytes past the end of the region read as zero. Fails if `offset` itself
    /// is outside the region.
    pub fn read_aligned(&self, offset: usize) -> Result<[u8; WORD_BYTES]> {
        if offset >= self.capacity() {
            return Err(self.out_of_bounds(offset, WORD_BYTES));
        }
        let end = (offset + WORD_BYTES).min(self.capacity());
        let mut word = [0u8; WORD_BYTES];
        word[..end - offset].copy_from_slice(&self.bytes[offset..end]);
        Ok(word)
    }

    /// Replace the 4 bytes at `[offset, offset + 4)`.
    pub fn write_aligned(&mut self, offset: usize, word: [u8; WORD_BYTES]) -> Result<()> {
        self.check_range(offset, WORD_BYTES)?;
        self.bytes[offset..offset + WORD_BYTES].copy_from_slice(&word);
        Ok(())
    }

    /// Copy `len` bytes starting at `offset`.
    pub fn read_range(&self, offset: usize, len: usize) -> Result<Bytes> {
        self.check_range(offset, len)?;
        Ok(Bytes::copy_from_slice(&self.bytes[offset..offset + len]))
    }

    /// Merge `data` into the region starting at `offset`, one aligned word at
    /// a time.
    ///
    /// Each touched word is read, the bytes covered by `data` are replaced, and
    /// the word is written back, so bytes of a boundary word that fall outside
    /// `[offset, offset + data.len())` keep their previous values. The whole
    /// range is validated first; a rejected write leaves the region untouched.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;

        let end = offset + data.len();
        let mut pos = offset;
        while pos < end {
            let word_offset = pos - pos % WORD_BYTES;
            let lane = pos - word_offset;
            let take = (WORD_BYTES - lane).min(end - pos);
            let src = pos - offset;

            let mut word = self.read_aligned(word_offset)?;
            word[lane..lane + take].copy_from_slice(&data[src..src + take]);
            self.write_aligned(word_offset, word)?;

            trace!(word_offset, lane, take, "merged word");
            pos += take;
        }
        Ok(())
    }

    /// Zero the whole region.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity() => Ok(()),
            _ => Err(self.out_of_bounds(offset, len)),
        }
    }

    fn out_of_bounds(&self, offset: usize, len: usize) -> RegionError {
        RegionError::OutOfBounds {
            offset,
            len,
            capacity: self.capacity(),
        }
    }
}

impl Default for MemoryRegion {
    fn default() -> Self {
        Self {
            bytes: vec![0; DEFAULT_CAPACITY].into_boxed_slice(),
        }
    }
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Cloneable handle to the one region a server owns.
///
/// Every method takes the lock for the full duration of one access, so a
/// write's read-modify-write cycle over all of its words is atomic with
/// respect to every other handle.
#[derive(Clone, Debug)]
pub struct SharedRegion {
    inner: Arc<Mutex<MemoryRegion>>,
    capacity: usize,
}

impl SharedRegion {
    /// Share an existing region.
    pub fn new(region: MemoryRegion) -> Self {
        let capacity = region.capacity();
        Self {
            inner: Arc::new(Mutex::new(region)),
            capacity,
        }
    }

    /// Allocate and share a zeroed region of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        MemoryRegion::new(capacity).map(Self::new)
    }

    /// Region size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Merge `data` at `offset` under the region lock.
    pub fn write_at(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.lock().write_at(offset, data)
    }

    /// Copy `len` bytes at `offset` under the region lock.
    pub fn read_range(&self, offset: usize, len: usize) -> Result<Bytes> {
        self.lock().read_range(offset, len)
    }

    /// Zero the whole region.
    pub fn reset(&self) {
        self.lock().reset();
    }

    // Bounds are validated before any byte moves, so a panic while the lock is
    // held cannot leave a write half-applied; recovering from poison is safe.
    fn lock(&self) -> MutexGuard<'_, MemoryRegion> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SharedRegion {
    fn default() -> Self {
        Self::new(MemoryRegion::default())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn patterned(capacity: usize) -> MemoryRegion {
        let mut region = MemoryRegion::new(capacity).unwrap();
        let pattern: Vec<u8> = (0..capacity).map(|i| 0xA0 | (i as u8 & 0x0F)).collect();
        region.write_at(0, &pattern).unwrap();
        region
    }

    #[test]
    fn default_region_is_64kib_of_zero() {
        let region = MemoryRegion::default();
        assert_eq!(region.capacity(), DEFAULT_CAPACITY);
        let all = region.read_range(0, DEFAULT_CAPACITY).unwrap();
        assert!(all.iter().all(|b| *b == 0));
    }

    #[test]
    fn rejects_invalid_capacity() {
        assert_eq!(
            MemoryRegion::new(0).unwrap_err(),
            RegionError::InvalidCapacity(0)
        );
        assert_eq!(
            MemoryRegion::new(10).unwrap_err(),
            RegionError::InvalidCapacity(10)
        );
        assert!(MemoryRegion::new(12).is_ok());
    }

    #[test]
    fn read_aligned_zero_pads_at_region_end() {
        let mut region = MemoryRegion::new(8).unwrap();
        region.write_at(0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        assert_eq!(region.read_aligned(4).unwrap(), [5, 6, 7, 8]);
        assert_eq!(region.read_aligned(6).unwrap(), [7, 8, 0, 0]);
        assert_eq!(region.read_aligned(7).unwrap(), [8, 0, 0, 0]);
        assert!(matches!(
            region.read_aligned(8),
            Err(RegionError::OutOfBounds { offset: 8, .. })
        ));
    }

    #[test]
    fn write_aligned_rejects_overhang() {
        let mut region = MemoryRegion::new(8).unwrap();
        region.write_aligned(4, [9, 9, 9, 9]).unwrap();
        assert!(region.write_aligned(5, [1, 1, 1, 1]).is_err());
        assert_eq!(region.read_range(4, 4).unwrap().as_ref(), &[9, 9, 9, 9]);
    }

    #[test]
    fn unaligned_single_byte_write_preserves_word_neighbours() {
        let mut region = patterned(16);
        let before = region.read_range(4, 4).unwrap();

        region.write_at(5, &[0x5A]).unwrap();

        let after = region.read_range(4, 4).unwrap();
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], 0x5A);
        assert_eq!(after[2], before[2]);
        assert_eq!(after[3], before[3]);
    }

    #[test]
    fn write_spanning_words_preserves_both_boundaries() {
        let mut region = patterned(16);
        let before = region.read_range(0, 16).unwrap();

        // Bytes 3..10: tail of word 0, all of word 4, head of word 8.
        region.write_at(3, &[1, 2, 3, 4, 5, 6, 7]).unwrap();

        let after = region.read_range(0, 16).unwrap();
        assert_eq!(&after[..3], &before[..3]);
        assert_eq!(&after[3..10], &[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(&after[10..], &before[10..]);
    }

    #[test]
    fn short_write_from_zero_leaves_rest_of_word() {
        let mut region = patterned(8);
        let before = region.read_range(0, 8).unwrap();

        region.write_at(0, &[0xEE, 0xEF, 0xF0]).unwrap();

        let after = region.read_range(0, 8).unwrap();
        assert_eq!(&after[..3], &[0xEE, 0xEF, 0xF0]);
        assert_eq!(&after[3..], &before[3..]);
    }

    #[test]
    fn out_of_bounds_write_does_not_mutate() {
        let mut region = patterned(8);
        let before = region.read_range(0, 8).unwrap();

        let err = region.write_at(4, &[0u8; 5]).unwrap_err();
        assert_eq!(
            err,
            RegionError::OutOfBounds {
                offset: 4,
                len: 5,
                capacity: 8
            }
        );
        assert_eq!(region.read_range(0, 8).unwrap(), before);
    }

    #[test]
    fn read_range_bounds() {
        let region = MemoryRegion::new(8).unwrap();
        assert_eq!(region.read_range(0, 8).unwrap().len(), 8);
        assert_eq!(region.read_range(8, 0).unwrap().len(), 0);
        assert!(region.read_range(0, 9).is_err());
        assert!(region.read_range(usize::MAX, 2).is_err(), "overflow must not wrap");
    }

    #[test]
    fn full_capacity_write_is_accepted() {
        let mut region = MemoryRegion::new(12).unwrap();
        let data: Vec<u8> = (1..=12).collect();
        region.write_at(0, &data).unwrap();
        assert_eq!(region.read_range(0, 12).unwrap().as_ref(), data.as_slice());
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut region = patterned(8);
        region.reset();
        assert_eq!(region.read_range(0, 8).unwrap().as_ref(), &[0u8; 8]);
    }

    #[test]
    fn shared_region_reports_capacity_and_rejects_bad_sizes() {
        let shared = SharedRegion::with_capacity(64).unwrap();
        assert_eq!(shared.capacity(), 64);
        assert!(SharedRegion::with_capacity(3).is_err());
        assert_eq!(SharedRegion::default().capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn concurrent_writers_sharing_a_word_do_not_clobber() {
        // Writer A owns bytes [1, 3); writer B owns [3, 5). Both touch word 0,
        // so an unlocked read-modify-write would lose updates.
        let shared = SharedRegion::with_capacity(16).unwrap();
        const ROUNDS: u8 = 200;

        let a = {
            let region = shared.clone();
            thread::spawn(move || {
                for i in 0..ROUNDS {
                    region.write_at(1, &[i, i]).unwrap();
                }
            })
        };
        let b = {
            let region = shared.clone();
            thread::spawn(move || {
                for i in 0..ROUNDS {
                    let v = i.wrapping_add(100);
                    region.write_at(3, &[v, v]).unwrap();
                }
            })
        };
        a.join().unwrap();
        b.join().unwrap();

        let last_a = ROUNDS - 1;
        let last_b = (ROUNDS - 1).wrapping_add(100);
        let bytes = shared.read_range(0, 8).unwrap();
        assert_eq!(bytes.as_ref(), &[0, last_a, last_a, last_b, last_b, 0, 0, 0]);
    }
}
