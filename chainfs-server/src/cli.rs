use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Serves a fixed-size block file store over TCP")]
pub struct Cli {
    /// Port to accept client connections on
    #[arg(long, short, default_value_t = 12345)]
    pub port: u16,

    /// Address to bind
    #[arg(long, short, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Backing file for the block pool, created if missing
    #[arg(long, short, default_value = "serverdisk.dat")]
    pub disk: PathBuf,

    /// Zero the backing file instead of reusing its bytes
    #[arg(long)]
    pub reset: bool,
}
