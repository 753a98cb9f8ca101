//! Loopback integration tests for the transport wrappers.
//!
//! A scripted peer on 127.0.0.1 plays the server so framing behavior can
//! be observed over real sockets: partial writes, coalesced writes, EOF.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

use natter_transport::{DatagramTransport, StreamTransport};

async fn recv_timeout<T>(
    fut: impl std::future::Future<Output = T>,
) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("peer did not respond in time")
}

// =========================================================================
// Stream transport
// =========================================================================

#[tokio::test]
async fn test_lines_reassembled_across_partial_reads() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // The peer dribbles two messages out in fragments that do not align
    // with line boundaries.
    tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await.unwrap();
        for chunk in ["MSG FROM Bob ", "IS hi\r\nREPLY OK", " IS done\r\n"] {
            conn.write_all(chunk.as_bytes()).await.unwrap();
            conn.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let transport = StreamTransport::connect("127.0.0.1", addr.port())
        .await
        .unwrap();
    let (mut reader, _writer) = transport.split();

    let first = recv_timeout(reader.next_line()).await.unwrap().unwrap();
    assert_eq!(first, "MSG FROM Bob IS hi");
    let second = recv_timeout(reader.next_line()).await.unwrap().unwrap();
    assert_eq!(second, "REPLY OK IS done");
}

#[tokio::test]
async fn test_clean_eof_yields_none() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await.unwrap();
        conn.write_all(b"BYE FROM Server\r\n").await.unwrap();
        // Dropping the connection closes it.
    });

    let transport = StreamTransport::connect("127.0.0.1", addr.port())
        .await
        .unwrap();
    let (mut reader, _writer) = transport.split();

    assert_eq!(
        recv_timeout(reader.next_line()).await.unwrap().as_deref(),
        Some("BYE FROM Server")
    );
    assert_eq!(recv_timeout(reader.next_line()).await.unwrap(), None);
}

#[tokio::test]
async fn test_unterminated_fragment_delivered_before_eof() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await.unwrap();
        conn.write_all(b"REPLY OK IS half").await.unwrap();
    });

    let transport = StreamTransport::connect("127.0.0.1", addr.port())
        .await
        .unwrap();
    let (mut reader, _writer) = transport.split();

    assert_eq!(
        recv_timeout(reader.next_line()).await.unwrap().as_deref(),
        Some("REPLY OK IS half")
    );
    assert_eq!(recv_timeout(reader.next_line()).await.unwrap(), None);
}

#[tokio::test]
async fn test_sent_lines_arrive_verbatim() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let peer = tokio::spawn(async move {
        let (mut conn, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        conn.read_to_end(&mut received).await.unwrap();
        received
    });

    let transport = StreamTransport::connect("127.0.0.1", addr.port())
        .await
        .unwrap();
    let (_reader, mut writer) = transport.split();

    writer
        .send_line("AUTH alice AS Alice USING s3cret\r\n")
        .await
        .unwrap();
    writer.send_line("BYE FROM Alice\r\n").await.unwrap();
    writer.shutdown().await.unwrap();

    let received = recv_timeout(peer).await.unwrap();
    assert_eq!(
        received,
        b"AUTH alice AS Alice USING s3cret\r\nBYE FROM Alice\r\n"
    );
}

// =========================================================================
// Datagram transport
// =========================================================================

#[tokio::test]
async fn test_datagram_round_trip() {
    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_addr = peer.local_addr().unwrap();

    let transport = DatagramTransport::connect("127.0.0.1", peer_addr.port())
        .await
        .unwrap();

    transport.send(&[0xFD, 0x00, 0x07]).await.unwrap();

    let mut buf = [0u8; 64];
    let (n, from) = recv_timeout(peer.recv_from(&mut buf)).await.unwrap();
    assert_eq!(&buf[..n], &[0xFD, 0x00, 0x07]);
    assert_eq!(from.port(), transport.local_addr().unwrap().port());

    peer.send_to(&[0x00, 0x00, 0x00, 0x00, 0x07], from)
        .await
        .unwrap();
    let n = recv_timeout(transport.recv(&mut buf)).await.unwrap();
    assert_eq!(&buf[..n], &[0x00, 0x00, 0x00, 0x00, 0x07]);
}
