//! A cancelled transfer must stop promptly and surface `FtpError::Canceled`,
//! never attempting a resume.

mod common;

use ftp_rs::{CancelToken, ClientConfig, FtpClient, FtpError, TransferOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

async fn next_cmd(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    line.trim().to_string()
}

#[tokio::test]
async fn test_cancel_token_stops_a_stalled_transfer() {
    let (listener, addr) = common::bind_loopback().await;

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

        assert_eq!(next_cmd(&mut reader).await, "EPSV");
        let (data_listener, data_port) = common::bind_data_listener().await;
        write_half
            .write_all(format!("229 Entering Extended Passive Mode (|||{data_port}|)\r\n").as_bytes())
            .await
            .unwrap();

        assert_eq!(next_cmd(&mut reader).await, "RETR stall.bin");
        write_half
            .write_all(b"150 Opening BINARY mode data connection for stall.bin.\r\n")
            .await
            .unwrap();

        // Accept the data connection but never write to it: the transfer
        // stalls until cancellation, kept alive by periodic NOOPs.
        let (_data_stream, _) = data_listener.accept().await.unwrap();

        loop {
            let cmd = next_cmd(&mut reader).await;
            if cmd.is_empty() {
                break;
            }
            if cmd.eq_ignore_ascii_case("NOOP") {
                if write_half.write_all(b"200 NOOP ok\r\n").await.is_err() {
                    break;
                }
            } else {
                break;
            }
        }
    });

    let config = Arc::new(ClientConfig::new(addr.ip().to_string(), addr.port(), false, "user", "pass"));
    let mut client = FtpClient::connect(config).await.unwrap();
    client.login().await.unwrap();

    let cancel = CancelToken::new();
    let cancel_for_timer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel_for_timer.cancel();
    });

    let options = TransferOptions {
        noop_interval: Some(Duration::from_millis(30)),
        ..TransferOptions::default()
    };
    let mut sink = Vec::new();
    let result = client
        .retrieve("stall.bin", &mut sink, 0, None, &options, None, Some(&cancel), None)
        .await;

    assert!(matches!(result, Err(FtpError::Canceled)));
}
