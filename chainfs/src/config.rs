//! Fixed geometry of the storage volume. Every bound checked by the allocator,
//! the file table and the block device comes from here.

/// Number of slots in the file table, i.e. the most files that can exist at once.
pub const MAX_FILES: usize = 5;

/// Number of fixed-size blocks in the pool backing all file content.
pub const MAX_BLOCKS: usize = 10;

/// Size in bytes of one block, the unit of allocation and of device I/O.
pub const BLOCK_SIZE: usize = 128;

/// Longest accepted file name, in bytes.
pub const MAX_FILENAME_LENGTH: usize = 11;

/// Total size of the backing medium in bytes.
pub const DISK_SIZE: u64 = (MAX_BLOCKS * BLOCK_SIZE) as u64;

/// Number of 64-bit words needed to hold one bit per block.
pub const BITMAP_WORDS: usize = (MAX_BLOCKS + 63) / 64;

/// Number of blocks required to hold `len` bytes. Zero bytes need zero blocks
/// and an exact multiple of the block size does not round up.
pub fn blocks_needed(len: usize) -> usize {
    (len + BLOCK_SIZE - 1) / BLOCK_SIZE
}
