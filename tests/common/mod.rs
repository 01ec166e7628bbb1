//! Shared scaffolding for the mock-server integration tests: a minimal
//! scripted FTP control connection plus a data-channel listener, driven by
//! raw `tokio::net` primitives rather than the crate under test.

#![allow(dead_code)]

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

pub async fn bind_loopback() -> (TcpListener, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind control listener");
    let addr = listener.local_addr().expect("local_addr");
    (listener, addr)
}

pub async fn write_line(stream: &mut TcpStream, line: &str) {
    stream.write_all(line.as_bytes()).await.expect("write reply line");
    stream.write_all(b"\r\n").await.expect("write CRLF");
    stream.flush().await.expect("flush");
}

pub async fn read_command(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).await.expect("read command line");
    line.trim_end_matches(['\r', '\n']).to_string()
}

/// Open a fresh loopback listener for a passive data connection and return
/// its bound port alongside the listener itself, so the caller can announce
/// the port in an EPSV/PASV reply before accepting.
pub async fn bind_data_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind data listener");
    let port = listener.local_addr().expect("local_addr").port();
    (listener, port)
}

/// Force a TCP reset on close instead of a graceful FIN, so the peer's next
/// read fails with a transport error rather than observing a clean EOF.
/// Used to exercise the transfer engine's resume-on-fault path, which only
/// triggers on a genuine I/O error.
pub fn reset_on_close(stream: TcpStream) -> std::io::Result<()> {
    let std_stream = stream.into_std()?;
    let socket = socket2::Socket::from(std_stream);
    socket.set_linger(Some(Duration::ZERO))?;
    drop(socket);
    Ok(())
}
