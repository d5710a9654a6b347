use crate::config::{BITMAP_WORDS, MAX_BLOCKS};
use crate::fs::FsError;
use crate::io::BlockNumber;
use std::collections::BTreeMap;
use zerocopy::AsBytes;

#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

/// The free-block set. A set bit marks a block owned by some file's chain, a
/// clear bit marks a free block.
#[repr(C)]
#[derive(AsBytes, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bitmap {
    /// One bit per block in the pool, packed into 64-bit words.
    bitmap: [u64; BITMAP_WORDS],
}

impl Bitmap {
    pub fn new() -> Self {
        Self {
            bitmap: [0; BITMAP_WORDS],
        }
    }

    pub fn serialize(&self) -> &[u8] {
        self.as_bytes()
    }

    pub fn get(&self, blocknr: BlockNumber) -> State {
        assert!(blocknr < MAX_BLOCKS);
        // Grab of the u64 containing the significant bit.
        let word = self.bitmap[blocknr / 64];

        let mask = 0b01_u64 << (blocknr % 64);
        if word & mask == 0 {
            State::Free
        } else {
            State::Used
        }
    }

    pub fn set_reserved(&mut self, blocknr: BlockNumber) {
        assert!(blocknr < MAX_BLOCKS);
        self.bitmap[blocknr / 64] |= 0b01_u64 << (blocknr % 64);
    }

    pub fn set_free(&mut self, blocknr: BlockNumber) {
        assert!(blocknr < MAX_BLOCKS);
        self.bitmap[blocknr / 64] &= !(0b01_u64 << (blocknr % 64));
    }

    pub fn used_count(&self) -> usize {
        self.bitmap.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn free_count(&self) -> usize {
        MAX_BLOCKS - self.used_count()
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::new()
    }
}

/// Implements a naive block allocation policy for new data block requirements. This policy will
/// retrieve the next available sequential block and on each call to the iterator will return the
/// next consecutive available blocks.
///
/// The iterator only looks at the bitmap, it never marks anything. Callers reserve
/// what they take once they know the whole request can be satisfied.
pub struct NextAvailableAllocation<'a> {
    /// Keeps track of the next starting place for looking for available blocks.
    marker: usize,
    /// A simple bitmap tracking which blocks are allocated and which are free.
    bitmap: &'a Bitmap,
    /// One past the highest block number handed out.
    cap: usize,
}

impl<'a> NextAvailableAllocation<'a> {
    pub fn new(bitmap: &'a Bitmap, cap: Option<usize>) -> Self {
        let cap = cap.unwrap_or(MAX_BLOCKS);
        Self {
            marker: 0,
            bitmap,
            cap,
        }
    }
}

impl<'a> Iterator for NextAvailableAllocation<'a> {
    type Item = BlockNumber;

    fn next(&mut self) -> Option<Self::Item> {
        for i in self.marker..self.cap {
            if let State::Free = self.bitmap.get(i) {
                self.marker = i + 1;
                return Some(i);
            }
        }
        self.marker = self.cap;
        None
    }
}

/// Owns the free-block set and the chain table. The chain table has an entry
/// for exactly the blocks marked used, mapping each to the next block of the
/// same file, or `None` for the last block of a chain.
#[derive(Clone, Debug, Default)]
pub struct BlockAllocator {
    map: Bitmap,
    links: BTreeMap<BlockNumber, Option<BlockNumber>>,
}

impl BlockAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `n` free blocks in ascending block order and links them into a
    /// chain in that order. Either all `n` blocks are claimed or nothing changes.
    pub fn allocate(&mut self, n: usize) -> Result<Vec<BlockNumber>, FsError> {
        let picked: Vec<BlockNumber> = NextAvailableAllocation::new(&self.map, None)
            .take(n)
            .collect();
        if picked.len() < n {
            return Err(FsError::InsufficientSpace {
                needed: n,
                free: picked.len(),
            });
        }

        for (i, &block) in picked.iter().enumerate() {
            self.map.set_reserved(block);
            self.links.insert(block, picked.get(i + 1).copied());
        }
        debug!("allocated chain {:?}", picked);
        Ok(picked)
    }

    /// Returns every block of the chain starting at `first` to the free set and
    /// drops its chain entries. Returns the number of blocks released.
    ///
    /// A block is only released once, since its chain entry is removed as it
    /// is visited, so a corrupted cyclic chain still terminates.
    pub fn release(&mut self, first: Option<BlockNumber>) -> usize {
        let mut released = 0;
        let mut cursor = first;
        while let Some(block) = cursor {
            match self.links.remove(&block) {
                Some(next) => {
                    self.map.set_free(block);
                    released += 1;
                    cursor = next;
                }
                None => {
                    warn!("chain walk reached unallocated block {}", block);
                    break;
                }
            }
        }
        debug!("released {} blocks starting at {:?}", released, first);
        released
    }

    /// The blocks of the chain starting at `first`, in chain order. Stops early
    /// at a block with no chain entry or once a block would repeat.
    pub fn chain(&self, first: Option<BlockNumber>) -> Vec<BlockNumber> {
        let mut blocks = Vec::new();
        let mut cursor = first;
        while let Some(block) = cursor {
            let next = match self.links.get(&block) {
                Some(&next) => next,
                None => {
                    warn!("chain walk reached unallocated block {}", block);
                    break;
                }
            };
            if blocks.len() == self.links.len() {
                warn!("chain starting at {:?} loops back on itself", first);
                break;
            }
            blocks.push(block);
            cursor = next;
        }
        blocks
    }

    pub fn state(&self, blocknr: BlockNumber) -> State {
        self.map.get(blocknr)
    }

    pub fn bitmap(&self) -> Bitmap {
        self.map
    }

    pub fn free_count(&self) -> usize {
        self.map.free_count()
    }

    pub fn used_count(&self) -> usize {
        self.map.used_count()
    }

    /// Blocks that currently have a chain entry, in ascending order.
    pub fn linked_blocks(&self) -> impl Iterator<Item = BlockNumber> + '_ {
        self.links.keys().copied()
    }
}
