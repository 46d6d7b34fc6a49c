//! `HttpTransport` against a minimal HTTP/1.1 listener

use registry_client::{
    Client, ClientConfig, Error, ErrorKind, HttpTransport, LoadBalance, Node, SelectedNode,
    Service,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// What the listener saw of one request
#[derive(Debug, Default, Clone)]
struct Captured {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serve one canned response per connection, recording each request
async fn serve(
    status_line: &'static str,
    body: &'static str,
    delay: Duration,
) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());
    let captured = Arc::new(Mutex::new(Vec::new()));
    let log = captured.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let log = log.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                // Read headers, then the declared body
                let header_end = loop {
                    let n = stream.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };
                let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                let mut lines = head.split("\r\n");
                let request_line = lines.next().unwrap_or_default().to_string();
                let headers: Vec<(String, String)> = lines
                    .filter_map(|l| l.split_once(':'))
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    .collect();
                let length = headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.parse::<usize>().ok())
                    .unwrap_or(0);
                while buf.len() < header_end + length {
                    let n = stream.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let request_body = String::from_utf8_lossy(&buf[header_end..]).to_string();
                log.lock().unwrap().push(Captured {
                    request_line,
                    headers,
                    body: request_body,
                });

                tokio::time::sleep(delay).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (addr, captured)
}

fn client(addr: &str) -> Client {
    Client::new(ClientConfig::new(addr, "123456")).unwrap()
}

#[tokio::test]
async fn test_form_body_and_secret_header() {
    let (addr, captured) = serve("204 No Content", "", Duration::ZERO).await;
    let client = client(&addr);

    client
        .add_node("demo", &Node::new("10.0.0.1", 8080).with_weight(2))
        .await
        .unwrap();

    let seen = captured.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].request_line, "POST /nodes/ HTTP/1.1");
    assert_eq!(seen[0].header("secret"), Some("123456"));
    assert_eq!(
        seen[0].header("content-type"),
        Some("application/x-www-form-urlencoded")
    );
    assert!(seen[0].body.contains("service_id=ZGVtbw"));
    assert!(seen[0].body.contains("ip=10.0.0.1"));
    assert!(seen[0].body.contains("port=8080"));
    assert!(seen[0].body.contains("weight=2"));
    assert!(seen[0].body.contains("expires="));
}

#[tokio::test]
async fn test_touch_path_is_encoded() {
    let (addr, captured) = serve("204 No Content", "", Duration::ZERO).await;
    let key = "10.0.0.1:8080".parse().unwrap();
    client(&addr).touch_node("demo", &key).await.unwrap();

    let seen = captured.lock().unwrap().clone();
    assert_eq!(
        seen[0].request_line,
        "PATCH /nodes/ZGVtbw/MTAuMC4wLjE6ODA4MA/expires HTTP/1.1"
    );
    assert!(seen[0].body.starts_with("expires="));
}

#[tokio::test]
async fn test_bad_request_message() {
    let (addr, _) = serve(
        "400 Bad Request",
        r#"{"error":"load_balance is invalid"}"#,
        Duration::ZERO,
    )
    .await;
    let err = client(&addr)
        .set_service(&Service::new("demo", LoadBalance::Wrr))
        .await
        .unwrap_err();
    assert!(matches!(&err, Error::BadRequest(m) if m == "load_balance is invalid"));
}

#[tokio::test]
async fn test_discovery_payload() {
    let (addr, _) = serve("200 OK", r#"{"ip":"10.0.0.1","port":8080}"#, Duration::ZERO).await;
    let node = client(&addr).discover_service("demo").await.unwrap();
    assert_eq!(
        node,
        Some(SelectedNode {
            ip: "10.0.0.1".to_string(),
            port: 8080
        })
    );
}

#[tokio::test]
async fn test_malformed_discovery_payload() {
    let (addr, _) = serve("200 OK", "not json", Duration::ZERO).await;
    let err = client(&addr).discover_service("demo").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_unexpected_status() {
    let (addr, _) = serve("418 I'm a teapot", "", Duration::ZERO).await;
    let err = client(&addr).remove_service("demo").await.unwrap_err();
    assert!(matches!(err, Error::UnexpectedResponse { status: 418 }));
}

#[tokio::test]
async fn test_deadline_exceeded() {
    let (addr, _) = serve("204 No Content", "", Duration::from_secs(3)).await;
    let config = ClientConfig::new(addr, "123456").with_timeout(Duration::from_millis(200));
    let err = Client::new(config)
        .unwrap()
        .remove_service("demo")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.status(), 503);
}

#[tokio::test]
async fn test_connection_refused() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&addr).get_ip().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[test]
fn test_base_address_is_normalised() {
    let transport = HttpTransport::new("http://127.0.0.1:20080/").unwrap();
    assert_eq!(transport.base(), "http://127.0.0.1:20080");
}
