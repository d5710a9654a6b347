use crate::config::{MAX_FILENAME_LENGTH, MAX_FILES};
use crate::fs::FsError;
use crate::io::BlockNumber;

/// Metadata for one live file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    /// Length of the file content in bytes.
    pub size: usize,
    /// Head of the block chain, `None` exactly when the file is empty.
    pub first_block: Option<BlockNumber>,
}

impl FileEntry {
    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size: 0,
            first_block: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Empty,
    Occupied(FileEntry),
}

/// Fixed-capacity table of file entries. Slot order is the order used for
/// listing, and a freed slot is reused by the next insert that reaches it.
#[derive(Debug, Clone)]
pub struct FileTable {
    slots: Vec<Slot>,
}

/// Rejects empty names and names longer than `MAX_FILENAME_LENGTH` bytes.
pub fn validate_name(name: &str) -> Result<(), FsError> {
    if name.is_empty() || name.len() > MAX_FILENAME_LENGTH {
        return Err(FsError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl FileTable {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::Empty; MAX_FILES],
        }
    }

    /// Slot index of the live entry named exactly `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|slot| match slot {
            Slot::Occupied(entry) => entry.name == name,
            Slot::Empty => false,
        })
    }

    pub fn get(&self, index: usize) -> Option<&FileEntry> {
        match self.slots.get(index) {
            Some(Slot::Occupied(entry)) => Some(entry),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut FileEntry> {
        match self.slots.get_mut(index) {
            Some(Slot::Occupied(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Places a new empty entry for `name` in the first free slot.
    pub fn insert(&mut self, name: &str) -> Result<usize, FsError> {
        let index = self
            .slots
            .iter()
            .position(|slot| *slot == Slot::Empty)
            .ok_or(FsError::TableFull)?;
        self.slots[index] = Slot::Occupied(FileEntry::empty(name));
        Ok(index)
    }

    /// Empties the slot at `index`, returning the entry it held.
    pub fn remove(&mut self, index: usize) -> Option<FileEntry> {
        let slot = self.slots.get_mut(index)?;
        match std::mem::replace(slot, Slot::Empty) {
            Slot::Occupied(entry) => Some(entry),
            Slot::Empty => None,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(entry) => Some(entry),
            Slot::Empty => None,
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.entries().map(|entry| entry.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}
