use crate::alloc::{Bitmap, BlockAllocator, State};
use crate::config::{blocks_needed, BLOCK_SIZE, DISK_SIZE, MAX_BLOCKS, MAX_FILENAME_LENGTH};
use crate::io::{BlockNumber, BlockStorage};
use crate::table::{validate_name, FileEntry, FileTable};

use parking_lot::RwLock;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("invalid filename {0:?}: must be 1 to {max} bytes long", max = MAX_FILENAME_LENGTH)]
    InvalidName(String),
    #[error("file already exists: {0}")]
    NameExists(String),
    #[error("file table is full")]
    TableFull,
    #[error("found no file named {0}")]
    NotFound(String),
    #[error("insufficient space: {needed} blocks needed, {free} free")]
    InsufficientSpace { needed: usize, free: usize },
    #[error("device holds {size} bytes, the volume needs {required}")]
    DeviceTooSmall { size: u64, required: u64 },
    #[error("block device failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("inconsistent metadata: {0}")]
    Corrupted(String),
}

pub type Result<T> = std::result::Result<T, FsError>;

/// Point-in-time occupancy of the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub files: usize,
    pub free_blocks: usize,
    pub used_blocks: usize,
}

/// Everything guarded by the manager's lock: the device and the metadata
/// describing what lives on it.
struct Volume<T> {
    dev: T,
    files: FileTable,
    blocks: BlockAllocator,
}

impl<T: BlockStorage> Volume<T> {
    fn lookup(&self, name: &str) -> Result<(usize, &FileEntry)> {
        self.files
            .find(name)
            .and_then(|index| self.files.get(index).map(|entry| (index, entry)))
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    /// Replaces the content of the file in slot `index` with `data`. The old
    /// chain is released first so a rewrite can reuse its own blocks. The entry
    /// is only updated once every block has been written.
    fn install(&mut self, index: usize, data: &[u8]) -> Result<()> {
        let old_first = self.files.get(index).and_then(|entry| entry.first_block);
        self.blocks.release(old_first);

        let chain = self.blocks.allocate(blocks_needed(data.len()))?;
        for (&block, piece) in chain.iter().zip(data.chunks(BLOCK_SIZE)) {
            self.dev.write_block(block, piece)?;
        }

        if let Some(entry) = self.files.get_mut(index) {
            entry.size = data.len();
            entry.first_block = chain.first().copied();
        }
        Ok(())
    }

    fn check(&self) -> Result<()> {
        let mut owned = BTreeSet::new();
        for entry in self.files.entries() {
            if entry.first_block.is_some() != (entry.size > 0) {
                return Err(FsError::Corrupted(format!(
                    "{} has size {} and first block {:?}",
                    entry.name, entry.size, entry.first_block
                )));
            }

            let chain = self.blocks.chain(entry.first_block);
            if chain.len() != blocks_needed(entry.size) {
                return Err(FsError::Corrupted(format!(
                    "{} holds {} bytes in a chain of {} blocks",
                    entry.name,
                    entry.size,
                    chain.len()
                )));
            }
            for block in chain {
                if self.blocks.state(block) != State::Used {
                    return Err(FsError::Corrupted(format!(
                        "block {} of {} is marked free",
                        block, entry.name
                    )));
                }
                if !owned.insert(block) {
                    return Err(FsError::Corrupted(format!(
                        "block {} is owned by more than one file",
                        block
                    )));
                }
            }
        }

        let linked: BTreeSet<BlockNumber> = self.blocks.linked_blocks().collect();
        let used: BTreeSet<BlockNumber> = (0..MAX_BLOCKS)
            .filter(|&block| self.blocks.state(block) == State::Used)
            .collect();
        if linked != owned || used != owned {
            return Err(FsError::Corrupted(format!(
                "owned blocks {:?}, chained blocks {:?}, used blocks {:?}",
                owned, linked, used
            )));
        }
        Ok(())
    }
}

/// A flat, fixed-capacity file store over a block device.
///
/// All state (file table, chain table, free-block set and the device itself) is
/// guarded by a single task-fair read/write lock. `list`, `read` and the other
/// inspection calls take it shared, `create`, `write` and `delete` take it
/// exclusive for their whole duration, so no caller ever observes an entry
/// whose size and chain disagree. A failed mutation leaves the metadata exactly
/// as it was before the call.
pub struct StorageManager<T: BlockStorage> {
    volume: RwLock<Volume<T>>,
}

impl<T: BlockStorage> StorageManager<T> {
    /// Mounts an empty file store over `dev`. Nothing is recovered from the
    /// bytes already on the device.
    pub fn open(dev: T) -> Result<Self> {
        let size = (dev.block_count() * BLOCK_SIZE) as u64;
        if size < DISK_SIZE {
            return Err(FsError::DeviceTooSmall {
                size,
                required: DISK_SIZE,
            });
        }

        Ok(StorageManager {
            volume: RwLock::new(Volume {
                dev,
                files: FileTable::new(),
                blocks: BlockAllocator::new(),
            }),
        })
    }

    pub fn create(&self, name: &str) -> Result<()> {
        validate_name(name)?;

        let mut vol = self.volume.write();
        if vol.files.find(name).is_some() {
            return Err(FsError::NameExists(name.to_string()));
        }
        let slot = vol.files.insert(name)?;
        info!("created {} in slot {}", name, slot);
        Ok(())
    }

    /// Names of all live files in table slot order.
    pub fn list(&self) -> Vec<String> {
        self.volume.read().files.names()
    }

    pub fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        let mut vol = self.volume.write();
        let (index, _) = vol.lookup(name)?;

        let snapshot = vol.blocks.clone();
        if let Err(e) = vol.install(index, data) {
            vol.blocks = snapshot;
            debug!(
                "write to {} rolled back, free map {:02x?}",
                name,
                vol.blocks.bitmap().serialize()
            );
            return Err(e);
        }
        info!(
            "wrote {} bytes to {} ({} blocks)",
            data.len(),
            name,
            blocks_needed(data.len())
        );
        Ok(())
    }

    /// Returns the content of `name`. If the chain turns out shorter than the
    /// recorded size only the bytes the chain holds are returned.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let vol = self.volume.read();
        let (_, entry) = vol.lookup(name)?;

        let mut content = Vec::with_capacity(entry.size);
        let mut block_buf = [0; BLOCK_SIZE];
        for block in vol.blocks.chain(entry.first_block) {
            if content.len() >= entry.size {
                break;
            }
            vol.dev.read_block(block, &mut block_buf)?;
            let take = std::cmp::min(BLOCK_SIZE, entry.size - content.len());
            content.extend_from_slice(&block_buf[..take]);
        }

        if content.len() < entry.size {
            warn!(
                "{} records {} bytes but its chain holds {}",
                name,
                entry.size,
                content.len()
            );
        }
        Ok(content)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let mut vol = self.volume.write();
        let (index, _) = vol.lookup(name)?;

        if let Some(entry) = vol.files.remove(index) {
            let released = vol.blocks.release(entry.first_block);
            info!("deleted {}, released {} blocks", name, released);
        }
        Ok(())
    }

    pub fn stat(&self, name: &str) -> Result<FileEntry> {
        let vol = self.volume.read();
        vol.lookup(name).map(|(_, entry)| entry.clone())
    }

    pub fn usage(&self) -> Usage {
        let vol = self.volume.read();
        Usage {
            files: vol.files.len(),
            free_blocks: vol.blocks.free_count(),
            used_blocks: vol.blocks.used_count(),
        }
    }

    /// A copy of the free-block set.
    pub fn free_map(&self) -> Bitmap {
        self.volume.read().blocks.bitmap()
    }

    /// Checks that every file's chain matches its size, that no block belongs
    /// to two files and that the free-block set is exactly the complement of
    /// the chained blocks.
    pub fn verify(&self) -> Result<()> {
        self.volume.read().check()
    }

    pub fn sync(&self) -> Result<()> {
        self.volume.write().dev.sync_disk()?;
        Ok(())
    }
}
