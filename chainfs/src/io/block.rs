use std::path::Path;

/// The block number to access ranging from 0 (the first block) to n - 1 (the last
/// block) where n is number of blocks available.
pub type BlockNumber = usize;

/// Fixed-size block access to a backing medium. Block `n` lives at byte offset
/// `n * BLOCK_SIZE`.
///
/// Implementations do no locking of their own beyond what is needed to make a
/// single call safe; the storage manager serializes access to the device
/// together with the metadata it describes.
pub trait BlockStorage: Send + Sync {
    /// Opens a disk at the specified path. This method does not validate the
    /// storage blocks, it is up for clients to ensure disks are appropriately initialized.
    fn open_disk<P: AsRef<Path>>(path: P, nblocks: usize) -> std::io::Result<Self>
    where
        Self: std::marker::Sized;
    /// Reads one whole block into the front of `buf`.
    ///
    /// # Errors
    ///
    /// Attempting to read a block out of range, or into a buffer smaller than a
    /// block, will return an error.
    fn read_block(&self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()>;
    /// Writes up to one block of `buf` at the start of the block. A shorter
    /// buffer leaves the tail of the block as it was.
    ///
    /// # Errors
    ///
    /// Attempting to write a block out of range will return an error.
    fn write_block(&self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()>;
    /// Flush any buffered disk IO from memory. This is useful if it must guaranteed
    /// the disk writes actually occurred, for instance, if being re-read from
    /// disk.
    fn sync_disk(&self) -> std::io::Result<()>;
    /// The number of blocks addressable on this device.
    fn block_count(&self) -> usize;
}
