//! End-to-end tests for the stream client against a scripted TCP server.
//!
//! Each test binds a listener on 127.0.0.1, plays the server side of the
//! text protocol by hand, and drives the client's input loop through an
//! in-memory duplex pipe standing in for stdin.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use natter::{ChatClient, ClientConfig, ExitKind, StreamClient};

async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("test step timed out")
}

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn connect_client(port: u16) -> StreamClient {
    StreamClient::connect(ClientConfig::new("127.0.0.1", port))
        .await
        .unwrap()
}

async fn read_line(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> Option<String> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await.unwrap();
    if n == 0 {
        return None;
    }
    Some(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn split(conn: TcpStream) -> (
    BufReader<tokio::net::tcp::OwnedReadHalf>,
    tokio::net::tcp::OwnedWriteHalf,
) {
    let (read, write) = conn.into_split();
    (BufReader::new(read), write)
}

#[tokio::test]
async fn test_full_session_auth_chat_bye() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (conn, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = split(conn);

        assert_eq!(
            read_line(&mut reader).await.as_deref(),
            Some("AUTH alice AS Alice USING s3cret")
        );
        writer
            .write_all(b"REPLY OK IS Auth success.\r\n")
            .await
            .unwrap();

        assert_eq!(
            read_line(&mut reader).await.as_deref(),
            Some("MSG FROM Alice IS hello")
        );
        assert_eq!(
            read_line(&mut reader).await.as_deref(),
            Some("BYE FROM Alice")
        );
        assert_eq!(read_line(&mut reader).await, None);
    });

    let client = connect_client(port).await;
    let (mut script, input) = tokio::io::duplex(1024);
    let run = tokio::spawn(client.run_from(input));

    script
        .write_all(b"/auth alice s3cret Alice\nhello\n")
        .await
        .unwrap();
    drop(script); // end of input

    let exit = within(run).await.unwrap().unwrap();
    assert_eq!(exit, ExitKind::Clean);
    within(server).await.unwrap();
}

#[tokio::test]
async fn test_server_err_ends_with_failure_status() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (conn, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = split(conn);

        assert!(read_line(&mut reader).await.unwrap().starts_with("AUTH"));
        writer
            .write_all(b"REPLY OK IS Auth success.\r\n")
            .await
            .unwrap();
        writer
            .write_all(b"ERR FROM Server IS bad state\r\n")
            .await
            .unwrap();

        // The client still says goodbye on its way out.
        assert_eq!(
            read_line(&mut reader).await.as_deref(),
            Some("BYE FROM Alice")
        );
    });

    let client = connect_client(port).await;
    let (mut script, input) = tokio::io::duplex(1024);
    let run = tokio::spawn(client.run_from(input));

    script
        .write_all(b"/auth alice s3cret Alice\n")
        .await
        .unwrap();
    // Input stays open: the ERR alone must end the session.

    let exit = within(run).await.unwrap().unwrap();
    assert_eq!(exit, ExitKind::ServerError);
    within(server).await.unwrap();
    drop(script);
}

#[tokio::test]
async fn test_server_bye_ends_cleanly() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (conn, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = split(conn);

        assert!(read_line(&mut reader).await.unwrap().starts_with("AUTH"));
        writer
            .write_all(b"REPLY OK IS Auth success.\r\n")
            .await
            .unwrap();
        writer.write_all(b"BYE FROM Server\r\n").await.unwrap();
    });

    let client = connect_client(port).await;
    let (mut script, input) = tokio::io::duplex(1024);
    let run = tokio::spawn(client.run_from(input));

    script
        .write_all(b"/auth alice s3cret Alice\n")
        .await
        .unwrap();

    let exit = within(run).await.unwrap().unwrap();
    assert_eq!(exit, ExitKind::Clean);
    within(server).await.unwrap();
    drop(script);
}

#[tokio::test]
async fn test_commands_in_wrong_phase_cause_no_traffic() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        conn.read_to_end(&mut received).await.unwrap();
        received
    });

    let client = connect_client(port).await;
    let (mut script, input) = tokio::io::duplex(1024);
    let run = tokio::spawn(client.run_from(input));

    // All rejected locally: phase guards and parse errors alike.
    script
        .write_all(b"/join general\nhello before auth\n/rename X\n/bogus\n")
        .await
        .unwrap();
    drop(script);

    let exit = within(run).await.unwrap().unwrap();
    assert_eq!(exit, ExitKind::Clean);

    // Nothing went out, not even a BYE: the session never authenticated.
    let received = within(server).await.unwrap();
    assert_eq!(received, b"");
}
