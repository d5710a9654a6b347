use chainfs::config::MAX_BLOCKS;
use chainfs::io::FileBlockEmulatorBuilder;
use chainfs::StorageManager;

pub fn main() -> chainfs::Result<()> {
    let tmp = tempfile::tempfile()?;
    let dev = FileBlockEmulatorBuilder::from(tmp)
        .with_block_count(MAX_BLOCKS)
        .build()?;

    // create a new store on the device and put one file in it
    let fs = StorageManager::open(dev)?;
    fs.create("hello.txt")?;
    fs.write("hello.txt", b"hello from a chain of blocks")?;

    let content = fs.read("hello.txt")?;
    println!("{}", String::from_utf8_lossy(&content));
    println!("{:?}", fs.usage());
    Ok(())
}
