//! Registry status codes as seen through the client API

use registry_client::testing::MockRegistry;
use registry_client::{Client, ClientConfig, Error, ErrorKind, LoadBalance, Node, Service};
use std::sync::Arc;

fn client(registry: &MockRegistry, secret: &str) -> Client {
    let config = ClientConfig::new("http://registry.test", secret);
    Client::with_transport(config, Arc::new(registry.clone())).unwrap()
}

#[smol_potat::test]
async fn test_scripted_statuses() {
    let registry = MockRegistry::new();
    let client = client(&registry, MockRegistry::SECRET);

    let cases = [
        (400, ErrorKind::Validation),
        (401, ErrorKind::Authentication),
        (404, ErrorKind::NotFound),
        (500, ErrorKind::Server),
        (501, ErrorKind::Server),
        (599, ErrorKind::UnexpectedResponse),
    ];
    for (status, kind) in cases {
        registry.fail_with(Some(status));
        let err = client.remove_service("demo").await.unwrap_err();
        assert_eq!(err.kind(), kind, "status {status}");
        assert_eq!(err.status(), status);
    }

    registry.fail_with(Some(400));
    let err = client.remove_service("demo").await.unwrap_err();
    assert!(matches!(&err, Error::BadRequest(message) if message == "scripted failure"));
}

#[smol_potat::test]
async fn test_success_statuses() {
    let registry = MockRegistry::new();
    let client = client(&registry, MockRegistry::SECRET);

    // 204: no payload
    client
        .add_service(&Service::new("demo", LoadBalance::Swrr))
        .await
        .unwrap();
    // 200: decoded payload
    let ip = client.get_ip().await.unwrap();
    assert!(ip.is_loopback());
}

#[smol_potat::test]
async fn test_wrong_secret() {
    let registry = MockRegistry::new();
    let client = client(&registry, "wrong");

    let err = client
        .add_service(&Service::new("demo", LoadBalance::Swrr))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication));
    assert_eq!(err.status(), 401);
}

#[smol_potat::test]
async fn test_missing_targets() {
    let registry = MockRegistry::new();
    let client = client(&registry, MockRegistry::SECRET);

    assert!(matches!(
        client.remove_service("ghost").await,
        Err(Error::NotFound)
    ));
    assert!(matches!(
        client.add_node("ghost", &Node::new("10.0.0.1", 80)).await,
        Err(Error::NotFound)
    ));
    let key = "10.0.0.1:80".parse().unwrap();
    assert!(matches!(
        client.touch_node("ghost", &key).await,
        Err(Error::NotFound)
    ));
}
