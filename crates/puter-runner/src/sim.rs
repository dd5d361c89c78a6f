//! Simulated device served over TCP.
//!
//! Each tick the device drains bytes received from the TCP client into a
//! [`MemoryPort`], lets the [`SerialDevice`] answer complete lines and forwards
//! whatever it wrote back to the client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use puter_serial::{DeviceIdentity, HandlerFn, MemoryPort, SerialDevice};

use crate::demo::demo_handler;
use crate::error::RunnerResult;
use crate::uart_server::UartServer;

/// Default poll interval.
pub const DEFAULT_TICK_MS: u64 = 5;

/// Settings for a simulated device.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Identity reported by `ping` and `info`.
    pub identity: DeviceIdentity,
    /// Address to listen on (`host:port`, port 0 picks one).
    pub listen: String,
    /// Poll interval.
    pub tick: Duration,
}

impl SimConfig {
    /// Settings with the default poll interval.
    pub fn new(identity: DeviceIdentity, listen: impl Into<String>) -> Self {
        SimConfig {
            identity,
            listen: listen.into(),
            tick: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }
}

/// A demo board reachable over TCP.
pub struct SimulatedDevice {
    server: UartServer,
    device: SerialDevice<HandlerFn>,
    port: MemoryPort,
    tick: Duration,
    stop: Arc<AtomicBool>,
    connection: u64,
}

impl SimulatedDevice {
    /// Bind the listener and configure the device.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(config: SimConfig) -> RunnerResult<Self> {
        let server = UartServer::bind(&config.listen).await?;
        let device = SerialDevice::new(config.identity, demo_handler as HandlerFn);
        let mut port = MemoryPort::new();
        device.begin(&mut port)?;

        info!(
            "sim: {} (fw {}) listening on {}",
            device.identity().id,
            device.identity().fw,
            server.local_addr()
        );

        Ok(SimulatedDevice {
            server,
            device,
            port,
            tick: config.tick,
            stop: Arc::new(AtomicBool::new(false)),
            connection: 0,
        })
    }

    /// Address clients connect to.
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.server.local_addr()
    }

    /// Flag that ends [`run`](Self::run) when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Move pending input through the device once.
    ///
    /// Returns the number of responses produced.
    pub fn tick(&mut self) -> RunnerResult<usize> {
        let current = self.server.handle().connection_id();
        if current != self.connection {
            self.device.reset_line();
            self.connection = current;
        }
        while let Some(chunk) = self.server.handle_mut().try_recv() {
            if chunk.connection != current {
                debug!(
                    "sim: dropping {} byte(s) from client #{}",
                    chunk.data.len(),
                    chunk.connection
                );
                continue;
            }
            self.port.push_rx(&chunk.data);
        }
        let responses = self.device.poll(&mut self.port)?;
        let tx = self.port.take_tx();
        if !tx.is_empty() {
            self.server.handle().send_to_client(tx);
        }
        Ok(responses)
    }

    /// Tick until the stop flag is set.
    pub async fn run(&mut self) -> RunnerResult<()> {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        while !self.stop.load(Ordering::Acquire) {
            interval.tick().await;
            let responses = self.tick()?;
            if responses > 0 {
                debug!("sim: sent {} response(s)", responses);
            }
        }
        info!("sim: stopped");
        Ok(())
    }
}
