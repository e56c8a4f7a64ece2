//! Daemon lifecycle integration tests

use std::time::Duration;

use parkin_gateway::{Config, Daemon, Error};

mod common;
use common::FakeMesh;

fn test_config(dir: &tempfile::TempDir, port: u16) -> Config {
    let mut config = Config::default();
    config.api_server.host = "127.0.0.1".to_string();
    config.api_server.port = port;
    config.fleet.path = dir.path().join("lamp_config.json");
    config.fleet.default_size = 4;
    config
}

#[tokio::test]
async fn daemon_loads_default_fleet_and_stops_on_signal() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir, 0);

    let daemon = Daemon::with_transport(config, FakeMesh::new()).unwrap();
    assert_eq!(daemon.registry().len(), 4);
    assert!(dir.path().join("lamp_config.json").exists());

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(daemon.run_until(async {
        let _ = rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("daemon did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn daemon_reports_bind_failure() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let daemon = Daemon::with_transport(test_config(&dir, port), FakeMesh::new()).unwrap();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        daemon.run_until(std::future::pending()),
    )
    .await
    .expect("daemon did not give up");

    assert!(matches!(result, Err(Error::Server(_))));
}

#[test]
fn daemon_rejects_malformed_fleet_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lamp_config.json"), r#"{"lamps": "all"}"#).unwrap();

    let result = Daemon::with_transport(test_config(&dir, 0), FakeMesh::new());

    assert!(matches!(result, Err(Error::Fleet(_))));
}
