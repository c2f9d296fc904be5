//! Minimal scripted HTTP server for exercising the remote generators
//! without a mock-server dependency. Serves a fixed sequence of
//! responses, one per connection, and counts hits.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub(crate) struct ScriptedServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl ScriptedServer {
    /// Start a server that answers with `responses` in order, then 500s.
    pub(crate) async fn start(responses: Vec<(u16, &'static str, Vec<u8>)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let hit_counter = hits.clone();
        tokio::spawn(async move {
            let mut script = responses.into_iter();
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                hit_counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;

                let (status, content_type, body) = script
                    .next()
                    .unwrap_or((500, "text/plain", b"script exhausted".to_vec()));
                let head = format!(
                    "HTTP/1.1 {status} Scripted\r\nContent-Type: {content_type}\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { addr, hits }
    }

    pub(crate) fn url(&self) -> String {
        format!("http://{}/generate", self.addr)
    }

    pub(crate) fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Read one full request (headers plus `Content-Length` body) so the
/// client never sees a reset while still writing.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() - (end + 4) >= content_length {
                return;
            }
        }
    }
}

/// A tiny valid PNG used both as test input and as a fake remote result.
pub(crate) fn png_fixture() -> Vec<u8> {
    let img = image::RgbImage::from_fn(16, 16, |x, y| image::Rgb([x as u8 * 16, y as u8 * 16, 128]));
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    png
}
