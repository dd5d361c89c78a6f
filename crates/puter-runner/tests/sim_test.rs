//! End-to-end tests: a host link talking to the simulated device over TCP.

use puter_host::{DeviceLink, HostError, Request, Response};
use puter_runner::{SimConfig, SimulatedDevice};
use puter_serial::DeviceIdentity;
use serde_json::{json, Map};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Running = (String, Arc<AtomicBool>, tokio::task::JoinHandle<()>);

async fn start_sim(id: &str) -> Running {
    let mut config = SimConfig::new(DeviceIdentity::new(id, "1.2.3", 57_600), "127.0.0.1:0");
    config.tick = Duration::from_millis(1);
    let mut sim = SimulatedDevice::start(config).await.expect("start sim");
    let addr = sim.local_addr().to_string();
    let stop = sim.stop_handle();
    let task = tokio::spawn(async move {
        sim.run().await.expect("sim run");
    });
    (addr, stop, task)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_builtins_over_sim() {
    let (addr, stop, task) = start_sim("sim_a").await;

    let (ping, info) = tokio::task::spawn_blocking(move || {
        let mut link = DeviceLink::connect("sim_a", addr).expect("connect");
        let ping = link.call("ping", Map::new()).expect("ping");
        let info = link.call("info", Map::new()).expect("info");
        (ping, info)
    })
    .await
    .unwrap();

    assert_eq!(ping["id"], json!("sim_a"));
    assert_eq!(ping["fw"], json!("1.2.3"));
    assert!(ping["ms"].is_u64());
    assert_eq!(
        serde_json::Value::Object(info),
        json!({"id": "sim_a", "fw": "1.2.3", "baud": 57600})
    );

    stop.store(true, Ordering::Release);
    task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_demo_commands_over_sim() {
    let (addr, stop, task) = start_sim("sim_b").await;

    let responses = tokio::task::spawn_blocking(move || {
        let mut link = DeviceLink::connect("sim_b", addr).expect("connect");
        let set = json!({"value": 2.5}).as_object().cloned().unwrap();
        vec![
            link.request(&Request::with_data("servo.set", set)).unwrap(),
            link.request(&Request::new("servo.stop")).unwrap(),
            link.request(&Request::new("reboot")).unwrap(),
        ]
    })
    .await
    .unwrap();

    assert_eq!(responses[0].to_value(), json!({"ok": true, "data": {"throttle": 1.0}}));
    assert_eq!(responses[1].to_value(), json!({"ok": true, "data": {"throttle": 0.0}}));
    assert_eq!(responses[2], Response::Err("unknown cmd".to_string()));

    stop.store(true, Ordering::Release);
    task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_line_too_long_over_sim() {
    let (addr, stop, task) = start_sim("sim_c").await;

    let result = tokio::task::spawn_blocking(move || {
        let mut link = DeviceLink::connect("sim_c", addr).expect("connect");
        let long = json!({"pad": "x".repeat(300)}).as_object().cloned().unwrap();
        link.call("echo", long)
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(HostError::Device(e)) if e == "line too long"));

    stop.store(true, Ordering::Release);
    task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_partial_line_from_previous_client_is_discarded() {
    let (addr, stop, task) = start_sim("sim_d").await;

    let result = tokio::task::spawn_blocking(move || {
        {
            let mut first = std::net::TcpStream::connect(&addr).expect("first client");
            first.write_all(b"{\"cmd\":\"pi").expect("partial write");
            first.flush().expect("flush");
            std::thread::sleep(Duration::from_millis(50));
        }
        std::thread::sleep(Duration::from_millis(50));

        let mut second = DeviceLink::connect("sim_d", addr).expect("second client");
        second.call("ping", Map::new())
    })
    .await
    .unwrap();

    let data = result.expect("ping after reconnect");
    assert_eq!(data["id"], json!("sim_d"));

    stop.store(true, Ordering::Release);
    task.await.unwrap();
}
