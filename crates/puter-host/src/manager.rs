//! Registry of the devices a host talks to.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::net::TcpStream;
use tracing::{info, warn};

use puter_metrics::metric_defs;

use crate::config::HostConfig;
use crate::error::{HostError, HostResult};
use crate::link::{DeviceLink, Transport};
use crate::message::{Request, Response};

/// Status of a registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Device identifier.
    pub id: String,
    /// Address of the device stream.
    pub address: String,
    /// Whether the host holds an open link.
    pub online: bool,
    /// Configured baud rate.
    pub baud: u32,
    /// Firmware version reported by `info`, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fw: Option<String>,
}

struct ManagedDevice<T: Transport> {
    info: DeviceInfo,
    link: Option<DeviceLink<T>>,
}

/// A set of devices keyed by id.
pub struct DeviceManager<T: Transport = TcpStream> {
    devices: BTreeMap<String, ManagedDevice<T>>,
}

impl<T: Transport> Default for DeviceManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> DeviceManager<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        DeviceManager {
            devices: BTreeMap::new(),
        }
    }

    /// Register a connected device, replacing and closing any previous entry.
    pub fn add_device(&mut self, link: DeviceLink<T>, baud: u32) {
        let id = link.id().to_string();
        let info = DeviceInfo {
            id: id.clone(),
            address: link.address().to_string(),
            online: true,
            baud,
            fw: None,
        };
        self.remove_device(&id);
        self.devices.insert(
            id,
            ManagedDevice {
                info,
                link: Some(link),
            },
        );
        self.update_online_gauge();
    }

    /// Register a device that could not be connected.
    pub fn add_offline(&mut self, id: impl Into<String>, address: impl Into<String>, baud: u32) {
        let id = id.into();
        self.remove_device(&id);
        self.devices.insert(
            id.clone(),
            ManagedDevice {
                info: DeviceInfo {
                    id,
                    address: address.into(),
                    online: false,
                    baud,
                    fw: None,
                },
                link: None,
            },
        );
        self.update_online_gauge();
    }

    /// Remove a device, closing its link. Returns whether it was registered.
    pub fn remove_device(&mut self, id: &str) -> bool {
        let Some(mut old) = self.devices.remove(id) else {
            return false;
        };
        if let Some(link) = old.link.as_mut() {
            link.close();
        }
        self.update_online_gauge();
        true
    }

    /// Remove every device.
    pub fn clear(&mut self) {
        let ids: Vec<String> = self.devices.keys().cloned().collect();
        for id in ids {
            self.remove_device(&id);
        }
    }

    /// Status of every device, ordered by id.
    pub fn list_devices(&self) -> Vec<DeviceInfo> {
        self.devices.values().map(|d| d.info.clone()).collect()
    }

    /// Status of one device.
    pub fn device_info(&self, id: &str) -> Option<&DeviceInfo> {
        self.devices.get(id).map(|d| &d.info)
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no devices are registered.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Send a command to a device and return its response.
    ///
    /// A device that closes its stream is marked offline.
    pub fn send(&mut self, id: &str, cmd: &str, data: Map<String, Value>) -> HostResult<Response> {
        let device = self
            .devices
            .get_mut(id)
            .ok_or_else(|| HostError::UnknownDevice(id.to_string()))?;
        let link = device
            .link
            .as_mut()
            .ok_or_else(|| HostError::DeviceOffline(id.to_string()))?;

        let result = link.request(&Request::with_data(cmd, data));
        if matches!(result, Err(HostError::Disconnected)) {
            warn!("DeviceManager: {} disconnected, marking offline", id);
            device.link = None;
            device.info.online = false;
            self.update_online_gauge();
        }
        result
    }

    /// Ask a device for `info` and record its firmware version.
    pub fn identify(&mut self, id: &str) -> HostResult<DeviceInfo> {
        let data = self.send(id, "info", Map::new())?.into_result()?;
        let device = self
            .devices
            .get_mut(id)
            .ok_or_else(|| HostError::UnknownDevice(id.to_string()))?;
        device.info.fw = data.get("fw").and_then(Value::as_str).map(str::to_string);
        Ok(device.info.clone())
    }

    fn update_online_gauge(&self) {
        let online = self.devices.values().filter(|d| d.info.online).count();
        metrics::gauge!(metric_defs::HOST_DEVICES_ONLINE.name).set(online as f64);
    }
}

impl DeviceManager<TcpStream> {
    /// Build a registry from configuration.
    ///
    /// Devices that fail to connect are registered offline rather than aborting.
    pub fn connect_all(config: &HostConfig) -> Self {
        let mut manager = DeviceManager::new();
        for device in &config.devices {
            match DeviceLink::from_config(device) {
                Ok(link) => {
                    info!("DeviceManager: {} online at {}", device.id, device.address);
                    manager.add_device(link, device.baud);
                }
                Err(e) => {
                    warn!("DeviceManager: failed to connect {}: {}", device.id, e);
                    manager.add_offline(&device.id, &device.address, device.baud);
                }
            }
        }
        manager
    }

    /// Connect or reconnect every configured device that is offline.
    pub fn rescan(&mut self, config: &HostConfig) -> Vec<DeviceInfo> {
        for device in &config.devices {
            let online = self
                .device_info(&device.id)
                .map(|info| info.online)
                .unwrap_or(false);
            if online {
                continue;
            }
            match DeviceLink::from_config(device) {
                Ok(link) => self.add_device(link, device.baud),
                Err(e) => {
                    warn!("DeviceManager: rescan failed for {}: {}", device.id, e);
                    self.add_offline(&device.id, &device.address, device.baud);
                }
            }
        }
        self.list_devices()
    }
}

impl<T: Transport> Drop for DeviceManager<T> {
    fn drop(&mut self) {
        for device in self.devices.values_mut() {
            if let Some(link) = device.link.as_mut() {
                link.close();
            }
        }
    }
}

