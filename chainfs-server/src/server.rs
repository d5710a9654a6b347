use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;

use chainfs::io::BlockStorage;
use chainfs::StorageManager;

use crate::protocol::dispatch;

/// Accepts TCP connections and serves each one on its own thread against a
/// single shared store.
pub struct FileServer<T: BlockStorage + 'static> {
    listener: TcpListener,
    fs: Arc<StorageManager<T>>,
}

impl<T: BlockStorage + 'static> FileServer<T> {
    pub fn bind<A: ToSocketAddrs>(addr: A, fs: StorageManager<T>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            fs: Arc::new(fs),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop forever. A failed accept is logged and skipped.
    pub fn run(&self) {
        info!("listening on {:?}", self.listener.local_addr());

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let fs = Arc::clone(&self.fs);
                    // Handle connection in a new thread
                    thread::spawn(move || {
                        let peer = stream.peer_addr().ok();
                        info!("client connected: {:?}", peer);
                        match handle_client(stream, &fs) {
                            Ok(()) => info!("client disconnected: {:?}", peer),
                            Err(e) => warn!("connection {:?} dropped: {}", peer, e),
                        }
                    });
                }
                Err(e) => {
                    warn!("connection error: {}", e);
                }
            }
        }
    }
}

fn handle_client<T: BlockStorage>(
    stream: TcpStream,
    fs: &StorageManager<T>,
) -> std::io::Result<()> {
    let reader = BufReader::new(stream.try_clone()?);
    serve_lines(reader, stream, fs)
}

/// Answers request lines from `reader` on `writer`, one response line per
/// request, until the peer closes its side.
pub fn serve_lines<R: BufRead, W: Write, T: BlockStorage>(
    mut reader: R,
    mut writer: W,
    fs: &StorageManager<T>,
) -> std::io::Result<()> {
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        let mut response = dispatch(fs, &line);
        response.push(b'\n');
        writer.write_all(&response)?;
        writer.flush()?;
    }
}
