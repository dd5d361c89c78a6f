//! Request/response link to a single device.
//!
//! The link writes one request line and reads device output until a line
//! decodes as a response or the timeout passes. Lines that are not responses,
//! such as boot banners or debug prints, are skipped. Only one request is in
//! flight at a time; `&mut self` enforces that.

use serde_json::{Map, Value};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use puter_metrics::{metric_defs, MetricLabels};

use crate::codec::ResponseCodec;
use crate::config::{DeviceConfig, DEFAULT_TIMEOUT_MS};
use crate::error::{HostError, HostResult};
use crate::message::{Request, Response};

/// A byte stream to a device.
pub trait Transport: Read + Write {
    /// Bound how long a single `read` may block. `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Close the stream.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

/// A connection to one device.
pub struct DeviceLink<T: Transport = TcpStream> {
    id: String,
    address: String,
    stream: T,
    codec: ResponseCodec,
    timeout: Duration,
    labels: MetricLabels,
}

impl DeviceLink<TcpStream> {
    /// Connect to a device over TCP.
    pub fn connect(id: impl Into<String>, address: impl Into<String>) -> HostResult<Self> {
        let id = id.into();
        let address = address.into();
        let addr = address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| HostError::Config(format!("address resolves to nothing: {}", address)))?;
        let stream = TcpStream::connect_timeout(&addr, Duration::from_millis(DEFAULT_TIMEOUT_MS))?;
        stream.set_nodelay(true)?;
        debug!("DeviceLink[{}]: connected to {}", id, address);
        Ok(DeviceLink::new(id, address, stream))
    }

    /// Connect to a configured device.
    pub fn from_config(config: &DeviceConfig) -> HostResult<Self> {
        Ok(Self::connect(&config.id, &config.address)?.with_timeout(config.timeout()))
    }
}

impl<T: Transport> DeviceLink<T> {
    /// Wrap an already open stream.
    pub fn new(id: impl Into<String>, address: impl Into<String>, stream: T) -> Self {
        let id = id.into();
        DeviceLink {
            labels: MetricLabels::new(id.clone()),
            id,
            address: address.into(),
            stream,
            codec: ResponseCodec::new(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Set the response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Device identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Address of the device stream.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Response timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a command and return the response data.
    ///
    /// A response with `ok: false` becomes [`HostError::Device`].
    pub fn call(&mut self, cmd: &str, data: Map<String, Value>) -> HostResult<Map<String, Value>> {
        self.request(&Request::with_data(cmd, data))?.into_result()
    }

    /// Send a request and wait for its response.
    pub fn request(&mut self, request: &Request) -> HostResult<Response> {
        let started = Instant::now();
        let result = self.exchange(request, started + self.timeout);

        let label = match &result {
            Ok(Response::Ok(_)) => "ok",
            Ok(Response::Err(_)) => "device_error",
            Err(e) => e.metric_label(),
        };
        metrics::counter!(
            metric_defs::HOST_REQUESTS.name,
            &self.labels.with(&[("result", label.to_string())])
        )
        .increment(1);
        if result.is_ok() {
            metrics::histogram!(metric_defs::HOST_REQUEST_LATENCY.name, &self.labels.to_labels())
                .record(started.elapsed().as_secs_f64());
        }
        result
    }

    fn exchange(&mut self, request: &Request, deadline: Instant) -> HostResult<Response> {
        debug!("DeviceLink[{}]: sending {:?}", self.id, request.cmd);
        self.codec.clear();
        self.stream.write_all(&request.encode()?)?;
        self.stream.flush()?;

        let mut buf = [0u8; 256];
        loop {
            while let Some(line) = self.codec.decode_line() {
                match Response::parse(&line) {
                    Ok(response) => {
                        trace!("DeviceLink[{}]: response {}", self.id, line);
                        return Ok(response);
                    }
                    Err(e) => debug!("DeviceLink[{}]: skipping line: {}", self.id, e),
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(HostError::Timeout {
                    cmd: request.cmd.clone(),
                    timeout: self.timeout,
                });
            }
            self.stream.set_read_timeout(Some(deadline - now))?;

            match self.stream.read(&mut buf) {
                Ok(0) => return Err(HostError::Disconnected),
                Ok(n) => self.codec.push(&buf[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Close the stream.
    pub fn close(&mut self) {
        if let Err(e) = self.stream.close() {
            debug!("DeviceLink[{}]: error closing stream: {}", self.id, e);
        }
    }
}

impl<T: Transport> std::fmt::Debug for DeviceLink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted transport: each `read` returns the next chunk.
    struct Scripted {
        chunks: VecDeque<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Scripted {
        fn new(chunks: &[&[u8]]) -> Self {
            Scripted {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
                written: Vec::new(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(io::Error::new(ErrorKind::WouldBlock, "no data")),
            }
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for Scripted {
        fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_request_skips_noise() {
        let stream = Scripted::new(&[b"booting\r\n{\"ok\":tr", b"ue,\"data\":{\"v\":5}}\n"]);
        let mut link = DeviceLink::new("dev", "scripted", stream);
        let resp = link.request(&Request::new("echo")).unwrap();
        assert_eq!(resp, Response::parse(r#"{"ok":true,"data":{"v":5}}"#).unwrap());
        assert_eq!(link.stream.written, b"{\"cmd\":\"echo\",\"data\":{}}\n");
    }

    #[test]
    fn test_call_maps_device_error() {
        let stream = Scripted::new(&[b"{\"ok\":false,\"error\":\"unknown cmd\"}\n"]);
        let mut link = DeviceLink::new("dev", "scripted", stream);
        let err = link.call("nope", Map::new()).unwrap_err();
        assert!(matches!(err, HostError::Device(e) if e == "unknown cmd"));
    }

    #[test]
    fn test_request_times_out() {
        let stream = Scripted::new(&[b"noise only\n"]);
        let mut link =
            DeviceLink::new("dev", "scripted", stream).with_timeout(Duration::from_millis(20));
        let err = link.request(&Request::new("ping")).unwrap_err();
        assert!(matches!(err, HostError::Timeout { ref cmd, .. } if cmd == "ping"));
    }

    #[test]
    fn test_request_disconnected() {
        let stream = Scripted::new(&[b""]);
        let mut link = DeviceLink::new("dev", "scripted", stream);
        assert!(matches!(
            link.request(&Request::new("ping")),
            Err(HostError::Disconnected)
        ));
    }
}
