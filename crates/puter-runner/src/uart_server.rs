//! UART TCP Server Module
//!
//! Exposes a simulated device's serial line as a TCP port. One client is served
//! at a time. Bytes from the client are queued for the device's RX, and device
//! TX is written back to the client.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Channel depth between the TCP task and the device loop.
const CHANNEL_DEPTH: usize = 256;

// ============================================================================
// Types
// ============================================================================

/// Bytes received from a client, tagged with the connection they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxChunk {
    /// Connection number, see [`UartHandle::connection_id`].
    pub connection: u64,
    pub data: Vec<u8>,
}

/// Device-side end of the UART bridge.
pub struct UartHandle {
    tx_sender: mpsc::Sender<Vec<u8>>,
    rx_receiver: mpsc::Receiver<RxChunk>,
    connected: Arc<AtomicBool>,
    connections: Arc<AtomicU64>,
}

impl UartHandle {
    /// Try to receive data from the TCP client (TCP -> device RX).
    /// Returns None if no data is available.
    pub fn try_recv(&mut self) -> Option<RxChunk> {
        self.rx_receiver.try_recv().ok()
    }

    /// Number of the most recently accepted client, starting at 1.
    ///
    /// Zero until the first client connects. A change means any partial input
    /// from the previous client must be discarded.
    pub fn connection_id(&self) -> u64 {
        self.connections.load(Ordering::Acquire)
    }

    /// Send device TX to the client.
    ///
    /// Data is dropped when no client is connected or the client is too slow.
    pub fn send_to_client(&self, data: Vec<u8>) {
        if !self.is_client_connected() {
            return;
        }
        if let Err(e) = self.tx_sender.try_send(data) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("[UART] TX buffer full (client connected but slow)");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!("[UART] TX channel closed");
                }
            }
        }
    }

    /// Check if a client is connected.
    pub fn is_client_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// A TCP listener standing in for a serial port.
pub struct UartServer {
    local_addr: SocketAddr,
    handle: UartHandle,
}

impl UartServer {
    /// Bind the listener and start accepting clients.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let (tx_sender, tx_receiver) = mpsc::channel::<Vec<u8>>(CHANNEL_DEPTH);
        let (rx_sender, rx_receiver) = mpsc::channel::<RxChunk>(CHANNEL_DEPTH);
        let connected = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(AtomicU64::new(0));

        let task_connected = connected.clone();
        let task_connections = connections.clone();
        tokio::spawn(async move {
            if let Err(e) = run_uart_listener(
                listener,
                tx_receiver,
                rx_sender,
                task_connected,
                task_connections,
            )
            .await
            {
                warn!("[UART] listener error on {}: {}", local_addr, e);
            }
        });

        Ok(UartServer {
            local_addr,
            handle: UartHandle {
                tx_sender,
                rx_receiver,
                connected,
                connections,
            },
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The device-side handle.
    pub fn handle(&self) -> &UartHandle {
        &self.handle
    }

    /// Mutable access to the device-side handle.
    pub fn handle_mut(&mut self) -> &mut UartHandle {
        &mut self.handle
    }
}

/// Accept clients one at a time.
async fn run_uart_listener(
    listener: TcpListener,
    mut tx_receiver: mpsc::Receiver<Vec<u8>>,
    rx_sender: mpsc::Sender<RxChunk>,
    connected: Arc<AtomicBool>,
    connections: Arc<AtomicU64>,
) -> io::Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let connection = connections.fetch_add(1, Ordering::AcqRel) + 1;
        info!("[UART] client #{} connected from {}", connection, peer_addr);

        // Discard output queued for a previous client.
        while tx_receiver.try_recv().is_ok() {}
        connected.store(true, Ordering::Release);

        let result =
            handle_uart_connection(stream, connection, &mut tx_receiver, &rx_sender).await;

        connected.store(false, Ordering::Release);
        match result {
            Ok(()) => info!("[UART] client {} disconnected", peer_addr),
            Err(e) => warn!("[UART] connection error from {}: {}", peer_addr, e),
        }

        if rx_sender.is_closed() {
            debug!("[UART] device side dropped, stopping listener");
            return Ok(());
        }
    }
}

/// Handle a single UART TCP connection.
async fn handle_uart_connection(
    mut stream: TcpStream,
    connection: u64,
    tx_receiver: &mut mpsc::Receiver<Vec<u8>>,
    rx_sender: &mpsc::Sender<RxChunk>,
) -> io::Result<()> {
    let (mut reader, mut writer) = stream.split();
    let mut read_buf = [0u8; 1024];

    loop {
        tokio::select! {
            // Read from TCP client -> send to device RX
            result = reader.read(&mut read_buf) => {
                match result {
                    Ok(0) => return Ok(()),
                    Ok(n) => {
                        let chunk = RxChunk {
                            connection,
                            data: read_buf[..n].to_vec(),
                        };
                        if rx_sender.send(chunk).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => return Err(e),
                }
            }

            // Receive from device TX -> send to TCP client
            Some(data) = tx_receiver.recv() => {
                writer.write_all(&data).await?;
                writer.flush().await?;
            }
        }
    }
}
