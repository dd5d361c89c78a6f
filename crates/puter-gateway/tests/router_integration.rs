//! Integration tests for the gateway router.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::thread;
use std::time::Duration;

use axum::body::Body;
use http::Request;
use serde_json::{json, Value};
use tower::ServiceExt;

use puter_gateway::{build_router, AppState};
use puter_host::{load_host_config_from_str, DeviceLink, DeviceManager, HostConfig};
use puter_serial::{DeviceIdentity, JsonMap, JsonObject, MemoryPort, SerialDevice};

fn servo_handler(cmd: &str, data: &JsonMap, out: &mut JsonObject) -> bool {
    match cmd {
        "servo.set" => {
            let value = data.get("value").and_then(Value::as_f64).unwrap_or(0.0);
            let _ = out.insert("throttle", value);
            true
        }
        "servo.stop" => {
            let _ = out.insert("throttle", 0.0);
            true
        }
        _ => false,
    }
}

/// Serve connections with a device until the host hangs up.
fn spawn_device(listener: TcpListener, id: &'static str) {
    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut device = SerialDevice::new(DeviceIdentity::new(id, "3.1.0", 115_200), servo_handler);
        let mut port = MemoryPort::new();
        let mut buf = [0u8; 128];
        while let Ok(n) = stream.read(&mut buf) {
            if n == 0 {
                return;
            }
            port.push_rx(&buf[..n]);
            if device.poll(&mut port).is_err() || stream.write_all(&port.take_tx()).is_err() {
                return;
            }
        }
    });
}

fn device_addr(id: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    spawn_device(listener, id);
    addr
}

fn make_state(devices: &[(&str, SocketAddr)]) -> AppState {
    let mut yaml = String::from("devices:\n");
    for (id, addr) in devices {
        yaml.push_str(&format!("  - id: {}\n    address: {}\n", id, addr));
    }
    let config = load_host_config_from_str(&yaml).expect("config");
    AppState::new(DeviceManager::connect_all(&config), config)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("req")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("req")
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 8192)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn health_returns_ok() {
    let app = build_router(AppState::new(DeviceManager::new(), HostConfig::default()));
    let resp = app.oneshot(get("/health")).await.expect("resp");
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await, json!({"ok": true}));
}

#[tokio::test]
async fn devices_lists_online_and_offline() {
    let state = make_state(&[
        ("lamp", device_addr("lamp")),
        ("gone", "127.0.0.1:1".parse().unwrap()),
    ]);
    let resp = build_router(state).oneshot(get("/arduino/devices")).await.expect("resp");
    assert_eq!(resp.status(), 200);

    let body = body_json(resp).await;
    assert_eq!(body["ok"], json!(true));
    let devices = body["devices"].as_array().expect("devices");
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0]["id"], json!("gone"));
    assert_eq!(devices[0]["online"], json!(false));
    assert_eq!(devices[1]["id"], json!("lamp"));
    assert_eq!(devices[1]["online"], json!(true));
}

#[tokio::test]
async fn cmd_forwards_to_device() {
    let state = make_state(&[("lamp", device_addr("lamp"))]);
    let app = build_router(state);

    let resp = app
        .clone()
        .oneshot(post_json("/arduino/lamp/cmd", json!({"cmd": "ping"})))
        .await
        .expect("resp");
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["data"]["id"], json!("lamp"));
    assert_eq!(body["data"]["fw"], json!("3.1.0"));

    let resp = app
        .oneshot(post_json("/arduino/lamp/cmd", json!({"cmd": "reboot", "data": {}})))
        .await
        .expect("resp");
    assert_eq!(resp.status(), 502);
    assert_eq!(body_json(resp).await, json!({"ok": false, "error": "unknown cmd"}));
}

#[tokio::test]
async fn cmd_unknown_device_is_not_found() {
    let app = build_router(AppState::new(DeviceManager::new(), HostConfig::default()));
    let resp = app
        .oneshot(post_json("/arduino/nope/cmd", json!({"cmd": "ping"})))
        .await
        .expect("resp");
    assert_eq!(resp.status(), 404);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn cmd_offline_device_is_unavailable() {
    let state = make_state(&[("gone", "127.0.0.1:1".parse().unwrap())]);
    let resp = build_router(state)
        .oneshot(post_json("/arduino/gone/cmd", json!({"cmd": "ping"})))
        .await
        .expect("resp");
    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn cmd_silent_device_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 64];
            while matches!(stream.read(&mut buf), Ok(n) if n > 0) {}
        }
    });

    let mut manager = DeviceManager::new();
    let link = DeviceLink::connect("mute", addr.to_string())
        .expect("connect")
        .with_timeout(Duration::from_millis(100));
    manager.add_device(link, 115_200);

    let app = build_router(AppState::new(manager, HostConfig::default()));
    let resp = app
        .oneshot(post_json("/arduino/mute/cmd", json!({"cmd": "ping"})))
        .await
        .expect("resp");
    assert_eq!(resp.status(), 504);
    assert_eq!(body_json(resp).await["ok"], json!(false));
}

#[tokio::test]
async fn cmd_malformed_body_is_rejected() {
    let app = build_router(AppState::new(DeviceManager::new(), HostConfig::default()));
    let resp = app
        .oneshot(post_json("/arduino/lamp/cmd", json!({"data": {}})))
        .await
        .expect("resp");
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn rescan_connects_late_device() {
    let addr = TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("free port");
    let state = make_state(&[("late", addr)]);
    let app = build_router(state);

    let resp = app.clone().oneshot(get("/arduino/devices")).await.expect("resp");
    assert_eq!(body_json(resp).await["devices"][0]["online"], json!(false));

    spawn_device(TcpListener::bind(addr).expect("rebind"), "late");
    let resp = app
        .oneshot(post_json("/arduino/rescan", json!({})))
        .await
        .expect("resp");
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    assert_eq!(body["devices"][0]["id"], json!("late"));
    assert_eq!(body["devices"][0]["online"], json!(true));
}

#[tokio::test]
async fn servo_routes_drive_servo_device() {
    let state = make_state(&[("servo", device_addr("servo"))]).with_servo("servo");
    let app = build_router(state);

    let resp = app
        .clone()
        .oneshot(post_json("/servo/throttle", json!({"value": 4.0})))
        .await
        .expect("resp");
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await, json!({"ok": true, "value": 1.0}));

    let resp = app.clone().oneshot(get("/servo/state")).await.expect("resp");
    assert_eq!(body_json(resp).await, json!({"throttle": 1.0}));

    let resp = app
        .clone()
        .oneshot(post_json("/servo/stop", json!({})))
        .await
        .expect("resp");
    assert_eq!(resp.status(), 200);

    let resp = app.oneshot(get("/servo/state")).await.expect("resp");
    assert_eq!(body_json(resp).await, json!({"throttle": 0.0}));
}

#[tokio::test]
async fn servo_without_device_is_not_found() {
    let app = build_router(AppState::new(DeviceManager::new(), HostConfig::default()));
    let resp = app
        .oneshot(post_json("/servo/throttle", json!({"value": 0.5})))
        .await
        .expect("resp");
    assert_eq!(resp.status(), 404);
}
