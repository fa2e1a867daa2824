//! Shared test infrastructure: a minimal scripted HTTP server
//!
//! Tests that exercise the download path need real sockets (redirects, auth
//! headers, streamed bodies), so this serves canned HTTP/1.1 responses from a
//! local listener and records the headers each request carried.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct Route {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Send headers (declaring the body length) but never the body,
    /// keeping the connection open
    pub stall: bool,
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
            stall: false,
        }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: 302,
            headers: vec![("Location".to_string(), location.into())],
            body: Vec::new(),
            stall: false,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
            stall: false,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }
}

/// One request as the server saw it
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub headers: HashMap<String, String>,
}

pub struct TestServer {
    addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<SeenRequest>>>,
}

impl TestServer {
    /// Starts a server answering the given path -> response table.
    /// Unknown paths get a 404.
    pub async fn start(routes: HashMap<String, Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let requests: Arc<Mutex<Vec<SeenRequest>>> = Arc::new(Mutex::new(Vec::new()));

        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let routes = routes.clone();
                let seen = Arc::clone(&seen);

                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    // Read until the end of the request headers.
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut chunk).await {
                            Ok(0) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                            Err(_) => return,
                        }
                    }

                    let request = String::from_utf8_lossy(&buf);
                    let mut lines = request.lines();
                    let path = lines
                        .next()
                        .and_then(|l| l.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    let mut headers = HashMap::new();
                    for line in lines {
                        if let Some((name, value)) = line.split_once(':') {
                            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
                        }
                    }
                    seen.lock().unwrap().push(SeenRequest {
                        path: path.clone(),
                        headers,
                    });

                    let route = routes.get(&path).cloned().unwrap_or(Route {
                        status: 404,
                        headers: Vec::new(),
                        body: b"not found".to_vec(),
                        stall: false,
                    });

                    let mut response = format!("HTTP/1.1 {} X\r\n", route.status);
                    for (name, value) in &route.headers {
                        response.push_str(&format!("{}: {}\r\n", name, value));
                    }
                    response.push_str(&format!("Content-Length: {}\r\n", route.body.len()));
                    response.push_str("Connection: close\r\n\r\n");

                    let _ = stream.write_all(response.as_bytes()).await;
                    if route.stall {
                        // Hold the socket open without sending the body; the
                        // client's stall detection is what ends this.
                        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                        return;
                    }
                    let _ = stream.write_all(&route.body).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Headers of the most recent request to `path`
    pub fn last_request_to(&self, path: &str) -> Option<SeenRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.path == path)
            .cloned()
    }
}

/// Builds a gzipped tar archive in memory from (name, contents) entries
pub fn tar_gz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).expect("append tar entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Builds a stored (uncompressed) zip archive in memory from (name, contents)
/// entries; enough structure for the host `unzip` tool to extract it
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    fn u16le(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    fn u32le(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    fn crc32(data: &[u8]) -> u32 {
        let mut crc = flate2::Crc::new();
        crc.update(data);
        crc.sum()
    }

    let mut out = Vec::new();
    let mut offsets = Vec::new();

    for (name, data) in entries {
        offsets.push(out.len() as u32);
        u32le(&mut out, 0x0403_4b50); // local file header
        u16le(&mut out, 20); // version needed
        u16le(&mut out, 0); // flags
        u16le(&mut out, 0); // method: stored
        u16le(&mut out, 0); // mod time
        u16le(&mut out, 0); // mod date
        u32le(&mut out, crc32(data));
        u32le(&mut out, data.len() as u32); // compressed
        u32le(&mut out, data.len() as u32); // uncompressed
        u16le(&mut out, name.len() as u16);
        u16le(&mut out, 0); // extra len
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);
    }

    let cd_offset = out.len() as u32;
    for ((name, data), offset) in entries.iter().zip(&offsets) {
        u32le(&mut out, 0x0201_4b50); // central directory entry
        u16le(&mut out, 20); // version made by
        u16le(&mut out, 20); // version needed
        u16le(&mut out, 0); // flags
        u16le(&mut out, 0); // method
        u16le(&mut out, 0); // mod time
        u16le(&mut out, 0); // mod date
        u32le(&mut out, crc32(data));
        u32le(&mut out, data.len() as u32);
        u32le(&mut out, data.len() as u32);
        u16le(&mut out, name.len() as u16);
        u16le(&mut out, 0); // extra len
        u16le(&mut out, 0); // comment len
        u16le(&mut out, 0); // disk start
        u16le(&mut out, 0); // internal attrs
        u32le(&mut out, 0); // external attrs
        u32le(&mut out, *offset);
        out.extend_from_slice(name.as_bytes());
    }
    let cd_len = out.len() as u32 - cd_offset;

    u32le(&mut out, 0x0605_4b50); // end of central directory
    u16le(&mut out, 0); // disk
    u16le(&mut out, 0); // cd disk
    u16le(&mut out, entries.len() as u16);
    u16le(&mut out, entries.len() as u16);
    u32le(&mut out, cd_len);
    u32le(&mut out, cd_offset);
    u16le(&mut out, 0); // comment len
    out
}
