#[macro_use]
extern crate log;

mod cli;

use std::fs::OpenOptions;
use std::net::SocketAddr;

use chainfs::config::MAX_BLOCKS;
use chainfs::io::{BlockStorage, FileBlockEmulator, FileBlockEmulatorBuilder};
use chainfs::StorageManager;
use chainfs_server::FileServer;
use clap::Parser;
use cli::Cli;

fn open_device(cli: &Cli) -> std::io::Result<FileBlockEmulator> {
    if !cli.reset {
        return FileBlockEmulator::open_disk(&cli.disk, MAX_BLOCKS);
    }

    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&cli.disk)?;
    FileBlockEmulatorBuilder::from(fd)
        .with_block_count(MAX_BLOCKS)
        .build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let dev = open_device(&cli)?;
    info!("disk={:?} reset={}", cli.disk, cli.reset);
    let fs = StorageManager::open(dev)?;

    let server = FileServer::bind(SocketAddr::new(cli.bind, cli.port), fs)?;
    server.run();
    Ok(())
}
