#![allow(dead_code)]

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const METAINT: usize = 16;

/// One metadata block, length-prefixed and zero-padded to a multiple of 16.
pub fn meta_block(text: &str) -> Vec<u8> {
    if text.is_empty() {
        return vec![0];
    }
    let blocks = text.len().div_ceil(16);
    let mut out = vec![blocks as u8];
    out.extend_from_slice(text.as_bytes());
    out.resize(1 + blocks * 16, 0);
    out
}

/// Audio interval filled with a recognisable byte, followed by `meta`.
pub fn interval(meta: &str) -> Vec<u8> {
    let mut out = vec![0xAA; METAINT];
    out.extend(meta_block(meta));
    out
}

/// Serve a single HTTP/1.0 response with the given extra headers and body,
/// then close the connection.
pub async fn serve_once(headers: &'static str, body: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut req = vec![0u8; 4096];
        let _ = sock.read(&mut req).await;
        let head = format!("HTTP/1.0 200 OK\r\ncontent-type: audio/mpeg\r\n{}\r\n", headers);
        let _ = sock.write_all(head.as_bytes()).await;
        let _ = sock.write_all(&body).await;
        let _ = sock.shutdown().await;
    });
    addr
}
