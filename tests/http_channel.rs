//! The HTTP channel against a local listener standing in for the robot.

use std::time::Duration;

use botblocks::config::DeviceConfig;
use botblocks::hardware::{Action, CommandChannel, HttpCommandChannel};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

async fn read_request_head(listener: &TcpListener) -> String {
    let (mut socket, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("robot was never contacted")
        .unwrap();

    let mut head = Vec::new();
    let mut buf = [0u8; 512];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }
    socket
        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
        .await
        .unwrap();
    String::from_utf8_lossy(&head).into_owned()
}

fn channel_for(listener: &TcpListener) -> HttpCommandChannel {
    let config = DeviceConfig {
        address: format!("http://{}", listener.local_addr().unwrap()),
        settle_delay_ms: 50,
        request_timeout_ms: 1000,
    };
    HttpCommandChannel::new(&config).unwrap()
}

#[tokio::test]
async fn speed_command_reaches_the_robot() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let channel = channel_for(&listener);

    assert!(channel.dispatch(Action::Speed, Some(300)).await);
    let head = read_request_head(&listener).await;

    let request_line = head.lines().next().unwrap();
    assert!(
        request_line.starts_with("GET /cmd?action=speed&value=300&t="),
        "{request_line}"
    );
    assert!(request_line.ends_with(" HTTP/1.1"));
}

#[tokio::test]
async fn dispatch_waits_settle_delay_but_not_the_response() {
    // Bound but never accepting: the request can not complete.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let channel = channel_for(&listener);

    let start = tokio::time::Instant::now();
    assert!(channel.dispatch(Action::Forward, None).await);
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(500));
    assert!(channel.is_connected());
}

#[tokio::test]
async fn readdressed_channel_sends_to_the_new_robot() {
    let old = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let new = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let channel = channel_for(&old);

    channel
        .set_address(&format!("http://{}/", new.local_addr().unwrap()))
        .await;
    assert!(channel.dispatch(Action::Left, None).await);

    let head = read_request_head(&new).await;
    assert!(head.starts_with("GET /cmd?action=left&t="), "{head}");
}
