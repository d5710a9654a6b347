use crate::config::BLOCK_SIZE;
use crate::io::block::{BlockNumber, BlockStorage};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{BufWriter, ErrorKind, SeekFrom};
use std::path::Path;

/// Emulates block disk/flash storage in userspace using a file as block storage.
/// This is only meant to be used for file system development and testing.
pub struct FileBlockEmulator {
    /// The file must be a fixed-size file some exact multiple of the size of a block.
    /// Seek and transfer happen under one guard so concurrent readers cannot
    /// interleave their file positions.
    fd: Mutex<File>,
    /// The total number of blocks available in the file store.
    block_count: usize,
}

impl FileBlockEmulator {
    /// Returns ownership of the underlying file descriptor to the caller.
    pub fn into_file(self) -> File {
        self.fd.into_inner()
    }

    fn check_range(&self, blocknr: BlockNumber) -> std::io::Result<()> {
        if blocknr >= self.block_count {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "block out of range",
            ));
        }
        Ok(())
    }
}

impl BlockStorage for FileBlockEmulator {
    fn open_disk<P: AsRef<Path>>(dest: P, nblocks: usize) -> std::io::Result<Self>
    where
        Self: std::marker::Sized,
    {
        // Reuse an existing medium as is, creating it if it does not exist yet.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(dest)?;
        FileBlockEmulatorBuilder::from(file)
            .with_block_count(nblocks)
            .clear_medium(false)
            .build()
    }

    fn read_block(&self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()> {
        self.check_range(blocknr)?;
        if buf.len() < BLOCK_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "buffer does not contain enough space to read block",
            ));
        }

        let mut fd = self.fd.lock();
        fd.seek(SeekFrom::Start((blocknr * BLOCK_SIZE) as u64))?;
        fd.read_exact(&mut buf[..BLOCK_SIZE])
    }

    /// This method truncates writes that exceed the total block size.
    fn write_block(&self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()> {
        self.check_range(blocknr)?;
        let max = std::cmp::min(BLOCK_SIZE, buf.len());

        let mut fd = self.fd.lock();
        fd.seek(SeekFrom::Start((blocknr * BLOCK_SIZE) as u64))?;
        fd.write_all(&buf[..max])
    }

    fn sync_disk(&self) -> std::io::Result<()> {
        self.fd.lock().sync_all()
    }

    fn block_count(&self) -> usize {
        self.block_count
    }
}

pub struct FileBlockEmulatorBuilder {
    fd: File,
    block_count: usize,
    clear: bool,
}

impl From<File> for FileBlockEmulatorBuilder {
    fn from(fd: File) -> Self {
        FileBlockEmulatorBuilder {
            fd,
            // A better default here might be the size of the file rounded down
            // to the nearest block.
            block_count: 0,
            clear: true,
        }
    }
}

impl FileBlockEmulatorBuilder {
    /// Sets the number of desired blocks in the block store device.
    pub fn with_block_count(mut self, blocks: usize) -> Self {
        self.block_count = blocks;
        self
    }

    /// Whether `build` zeroes every block (the default) or keeps the bytes
    /// already on the medium.
    pub fn clear_medium(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    /// This builder assumed ownership of the file descriptor used and may
    /// do destructive things to prepare the file for use. Additionally, ownership
    /// of the file is transfered to the emulator meaning this builder can only
    /// be used to create one emulator.
    pub fn build(mut self) -> std::io::Result<FileBlockEmulator> {
        if self.block_count == 0 {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "block device must have at least one block",
            ));
        }
        if self.clear {
            self.zero_blocks()?;
        } else {
            self.extend()?;
        }
        Ok(FileBlockEmulator {
            fd: Mutex::new(self.fd),
            block_count: self.block_count,
        })
    }

    fn medium_len(&self) -> u64 {
        (self.block_count * BLOCK_SIZE) as u64
    }

    fn zero_blocks(&mut self) -> std::io::Result<()> {
        self.fd.seek(SeekFrom::Start(0))?;
        let mut bfd = BufWriter::new(&self.fd);
        // Zero out the "disk" block, buffering each write to prevent excessive writes.
        let zeroes = [0x00; BLOCK_SIZE];
        for _ in 0..self.block_count {
            bfd.write_all(&zeroes)?;
        }
        bfd.flush()
    }

    /// Grows a short medium to full size without touching existing bytes.
    fn extend(&mut self) -> std::io::Result<()> {
        if self.fd.metadata()?.len() < self.medium_len() {
            self.fd.set_len(self.medium_len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_device(blocks: usize) -> FileBlockEmulator {
        let fs_block = tempfile::tempfile().unwrap();
        FileBlockEmulatorBuilder::from(fs_block)
            .with_block_count(blocks)
            .build()
            .expect("failed to allocate file block")
    }

    #[test]
    fn file_emulator_allocates_correct_num_bytes() {
        let disk_emu = build_device(4);
        disk_emu.sync_disk().unwrap();
        assert_eq!(
            disk_emu.into_file().metadata().unwrap().len(),
            (4 * BLOCK_SIZE) as u64
        );
    }

    #[test]
    fn can_read_and_write_blocks() {
        let disk_emu = build_device(4);

        // Allocate a block with a non-zero character.
        let block = vec![0x55; BLOCK_SIZE];
        disk_emu.write_block(2, &block).unwrap();
        disk_emu.sync_disk().unwrap();

        let mut read_block = vec![0x00; BLOCK_SIZE];
        // Read a different block.
        disk_emu.read_block(3, &mut read_block).unwrap();
        assert_eq!(read_block, vec![0x00; BLOCK_SIZE]);

        // Read the block with data.
        let mut filled_block = vec![0x00; BLOCK_SIZE];
        disk_emu.read_block(2, &mut filled_block).unwrap();
        assert_eq!(filled_block, vec![0x55; BLOCK_SIZE]);
    }

    #[test]
    fn can_read_and_write_start_and_end_blocks() {
        let disk_emu = build_device(2);

        disk_emu.write_block(0, &[0x55; BLOCK_SIZE]).unwrap();
        disk_emu.write_block(1, &[0x66; BLOCK_SIZE]).unwrap();

        let mut read_block = vec![0x00; BLOCK_SIZE];
        disk_emu.read_block(0, &mut read_block).unwrap();
        assert_eq!(read_block, vec![0x55; BLOCK_SIZE]);

        disk_emu.read_block(1, &mut read_block).unwrap();
        assert_eq!(read_block, vec![0x66; BLOCK_SIZE]);
    }

    #[test]
    fn access_beyond_range_is_an_error() {
        let disk_emu = build_device(1);

        let wresult = disk_emu.write_block(1, &[0x55; BLOCK_SIZE]);
        assert_eq!(wresult.unwrap_err().kind(), ErrorKind::InvalidInput);

        let mut buf = vec![0x00; BLOCK_SIZE];
        let rresult = disk_emu.read_block(1, &mut buf);
        assert_eq!(rresult.unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn read_into_short_buffer_is_an_error() {
        let disk_emu = build_device(1);
        let mut buf = vec![0x00; BLOCK_SIZE - 1];
        assert!(disk_emu.read_block(0, &mut buf).is_err());
    }

    #[test]
    fn short_write_leaves_block_tail_untouched() {
        let disk_emu = build_device(1);
        disk_emu.write_block(0, &[0x11; BLOCK_SIZE]).unwrap();

        // Fill half the block with meaningful data.
        disk_emu
            .write_block(0, &[0x22; BLOCK_SIZE / 2])
            .expect("failed to write block");

        let mut buf = vec![0x00; BLOCK_SIZE];
        disk_emu.read_block(0, &mut buf).unwrap();
        assert_eq!(&buf[..BLOCK_SIZE / 2], &[0x22; BLOCK_SIZE / 2][..]);
        assert_eq!(&buf[BLOCK_SIZE / 2..], &[0x11; BLOCK_SIZE / 2][..]);
    }

    #[test]
    fn oversized_write_is_truncated_to_one_block() {
        let disk_emu = build_device(2);
        disk_emu.write_block(0, &[0x77; BLOCK_SIZE + 16]).unwrap();

        let mut buf = vec![0x00; BLOCK_SIZE];
        disk_emu.read_block(1, &mut buf).unwrap();
        assert_eq!(buf, vec![0x00; BLOCK_SIZE]);
    }

    #[test]
    fn open_disk_creates_and_keeps_existing_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.dat");

        let disk_emu = FileBlockEmulator::open_disk(&path, 3).unwrap();
        disk_emu.write_block(1, &[0x42; BLOCK_SIZE]).unwrap();
        disk_emu.sync_disk().unwrap();
        drop(disk_emu);

        let reopened = FileBlockEmulator::open_disk(&path, 3).unwrap();
        let mut buf = vec![0x00; BLOCK_SIZE];
        reopened.read_block(1, &mut buf).unwrap();
        assert_eq!(buf, vec![0x42; BLOCK_SIZE]);
        assert_eq!(
            reopened.into_file().metadata().unwrap().len(),
            (3 * BLOCK_SIZE) as u64
        );
    }

    #[test]
    fn builder_without_clear_keeps_medium() {
        let disk = tempfile::NamedTempFile::new().unwrap();
        let dev = FileBlockEmulatorBuilder::from(disk.reopen().unwrap())
            .with_block_count(2)
            .build()
            .unwrap();
        dev.write_block(0, &[0x33; BLOCK_SIZE]).unwrap();
        dev.sync_disk().unwrap();

        let dev = FileBlockEmulatorBuilder::from(disk.reopen().unwrap())
            .with_block_count(2)
            // Don't reset initialized disk.
            .clear_medium(false)
            .build()
            .unwrap();
        let mut buf = vec![0x00; BLOCK_SIZE];
        dev.read_block(0, &mut buf).unwrap();
        assert_eq!(buf, vec![0x33; BLOCK_SIZE]);
    }

    #[test]
    fn zero_block_device_is_rejected() {
        let result = FileBlockEmulatorBuilder::from(tempfile::tempfile().unwrap()).build();
        assert!(result.is_err());
    }
}
