//! Exercises resume-on-transport-fault: a forced TCP reset mid-download
//! should reopen the data channel with `REST` at the last confirmed offset
//! and finish the transfer, rather than surfacing the fault to the caller.

mod common;

use ftp_rs::{ClientConfig, FtpClient, TransferOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

async fn next_cmd(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    line.trim().to_string()
}

#[tokio::test]
async fn test_transport_fault_triggers_resume_with_rest() {
    let (listener, addr) = common::bind_loopback().await;
    let first_chunk = b"abcde".to_vec();
    let second_chunk = b"FGHIJKLMNOP".to_vec();
    let mut expected = first_chunk.clone();
    expected.extend_from_slice(&second_chunk);

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_half.write_all(b"220 mock ftp ready\r\n").await.unwrap();
        assert!(next_cmd(&mut reader).await.starts_with("USER"));
        write_half.write_all(b"230 User logged in\r\n").await.unwrap();
        assert_eq!(next_cmd(&mut reader).await, "FEAT");
        write_half.write_all(b"502 not implemented\r\n").await.unwrap();

        assert_eq!(next_cmd(&mut reader).await, "TYPE I");
        write_half.write_all(b"200 Type set to I\r\n").await.unwrap();

        // First attempt: send a partial chunk then force a reset.
        assert_eq!(next_cmd(&mut reader).await, "EPSV");
        let (data_listener, data_port) = common::bind_data_listener().await;
        write_half
            .write_all(format!("229 Entering Extended Passive Mode (|||{data_port}|)\r\n").as_bytes())
            .await
            .unwrap();

        assert_eq!(next_cmd(&mut reader).await, "RETR file.bin");
        write_half
            .write_all(b"150 Opening BINARY mode data connection for file.bin.\r\n")
            .await
            .unwrap();

        let (mut data_stream, _) = data_listener.accept().await.unwrap();
        data_stream.write_all(&first_chunk).await.unwrap();
        data_stream.flush().await.unwrap();
        // Give the client a moment to read the chunk before the reset lands,
        // since a close-with-linger(0) can otherwise discard unread bytes.
        tokio::time::sleep(Duration::from_millis(50)).await;
        common::reset_on_close(data_stream).unwrap();

        // Second attempt: client reopens the data channel and restarts at
        // the offset it had already confirmed.
        assert_eq!(next_cmd(&mut reader).await, "EPSV");
        let (data_listener, data_port) = common::bind_data_listener().await;
        write_half
            .write_all(format!("229 Entering Extended Passive Mode (|||{data_port}|)\r\n").as_bytes())
            .await
            .unwrap();

        assert_eq!(next_cmd(&mut reader).await, "REST 5");
        write_half.write_all(b"350 Restarting at 5.\r\n").await.unwrap();

        assert_eq!(next_cmd(&mut reader).await, "RETR file.bin");
        write_half
            .write_all(b"150 Opening BINARY mode data connection for file.bin.\r\n")
            .await
            .unwrap();

        let (mut data_stream, _) = data_listener.accept().await.unwrap();
        data_stream.write_all(&second_chunk).await.unwrap();
        data_stream.shutdown().await.unwrap();
        drop(data_stream);

        write_half.write_all(b"226 Transfer complete.\r\n").await.unwrap();
    });

    let config = Arc::new(ClientConfig::new(addr.ip().to_string(), addr.port(), false, "user", "pass"));
    let mut client = FtpClient::connect(config).await.unwrap();
    client.login().await.unwrap();

    let options = TransferOptions {
        noop_interval: None,
        ..TransferOptions::default()
    };
    let mut sink = Vec::new();
    let progress = client
        .retrieve("file.bin", &mut sink, 0, None, &options, None, None, None)
        .await
        .unwrap()
        .expect("file exists");

    assert_eq!(sink, expected);
    assert_eq!(progress.bytes_transferred, expected.len() as u64);
    assert_eq!(progress.resumed, 1);
}
