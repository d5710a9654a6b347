use chainfs::io::BlockStorage;
use chainfs::StorageManager;

pub const OK: &[u8] = b"OK";
pub const ERROR: &[u8] = b"ERROR";

/// One parsed request line.
#[derive(Debug, PartialEq, Eq)]
pub enum Request {
    Create(String),
    Delete(String),
    Write(String, Vec<u8>),
    Read(String),
    List,
}

/// Parses one request line, without its line terminator. The command word is
/// case-insensitive; the line splits on the first two spaces only, so a WRITE
/// payload keeps any spaces it contains. Returns `None` for an unknown command,
/// a missing argument or a non UTF-8 file name.
pub fn parse_request(line: &[u8]) -> Option<Request> {
    let mut parts = line.splitn(3, |&b| b == b' ');
    let cmd = String::from_utf8_lossy(parts.next()?).to_ascii_uppercase();
    let name = parts.next().map(std::str::from_utf8);
    let payload = parts.next();

    let name = match name {
        Some(Ok(name)) => Some(name.to_string()),
        Some(Err(_)) => return None,
        None => None,
    };

    match cmd.as_str() {
        "CREATE" => name.map(Request::Create),
        "DELETE" => name.map(Request::Delete),
        "READ" => name.map(Request::Read),
        "WRITE" => Some(Request::Write(name?, payload?.to_vec())),
        "LIST" => Some(Request::List),
        _ => None,
    }
}

/// Runs one line against the store and returns the response line, without its
/// terminator. Every failure collapses to `ERROR`; the specific kind is logged.
pub fn dispatch<T: BlockStorage>(fs: &StorageManager<T>, line: &[u8]) -> Vec<u8> {
    let request = match parse_request(line) {
        Some(request) => request,
        None => {
            debug!("malformed request {:?}", String::from_utf8_lossy(line));
            return ERROR.to_vec();
        }
    };

    let result = match &request {
        Request::Create(name) => fs.create(name).map(|_| OK.to_vec()),
        Request::Delete(name) => fs.delete(name).map(|_| OK.to_vec()),
        Request::Write(name, data) => fs.write(name, data).map(|_| OK.to_vec()),
        Request::Read(name) => fs.read(name),
        Request::List => Ok(fs.list().join(",").into_bytes()),
    };

    result.unwrap_or_else(|e| {
        info!("{:?} failed: {}", request, e);
        ERROR.to_vec()
    })
}
