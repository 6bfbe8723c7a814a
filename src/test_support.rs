use std::net::SocketAddr;

use axum::{Router, body::Body, routing::get};
use bytes::Bytes;
use tokio::net::TcpListener;

/// Small but structurally complete JPEG: APP0 segment, a scan holding a
/// stuffed 0xFF and a restart marker, then EOI.
pub fn sample_jpeg(seed: u8) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', seed];
    out.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x04, 0xFF, 0xD9]);
    out.extend_from_slice(&[0xFF, 0xDA, seed, 0x10, 0xFF, 0x00, 0x20, 0xFF, 0xD3, seed]);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

pub fn sample_stream(count: u8) -> Vec<u8> {
    (0..count).flat_map(sample_jpeg).collect()
}

/// Serves `chunks` as one streamed body at `/mjpeg` on a loopback port.
pub async fn serve_chunks(chunks: Vec<Bytes>) -> SocketAddr {
    let app = Router::new().route(
        "/mjpeg",
        get(move || {
            let chunks = chunks.clone();
            async move {
                Body::from_stream(tokio_stream::iter(
                    chunks.into_iter().map(Ok::<_, std::io::Error>),
                ))
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("loopback listener should bind");
    let addr = listener
        .local_addr()
        .expect("listener should have an address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

pub fn chunked(stream: &[u8], size: usize) -> Vec<Bytes> {
    stream
        .chunks(size)
        .map(Bytes::copy_from_slice)
        .collect()
}
