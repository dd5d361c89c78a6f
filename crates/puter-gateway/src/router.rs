//! Axum router for the device gateway.
//!
//! Routes:
//! - `GET /health`
//! - `GET /arduino/devices`
//! - `POST /arduino/rescan`
//! - `POST /arduino/{device_id}/cmd`
//! - `GET /servo/state`, `POST /servo/throttle`, `POST /servo/stop`
//!
//! Device links are blocking, so every request that touches the registry runs
//! on the blocking pool while holding the registry lock.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use puter_host::{DeviceManager, HostConfig, HostError, Request};

use crate::error::GatewayError;

const THROTTLE_MIN: f64 = -1.0;
const THROTTLE_MAX: f64 = 1.0;

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The device registry.
    pub manager: Arc<Mutex<DeviceManager>>,
    /// Configuration used by rescans.
    pub config: Arc<HostConfig>,
    /// Device that receives the servo commands, if any.
    pub servo: Option<String>,
    throttle: Arc<Mutex<f64>>,
}

impl AppState {
    pub fn new(manager: DeviceManager, config: HostConfig) -> Self {
        AppState {
            manager: Arc::new(Mutex::new(manager)),
            config: Arc::new(config),
            servo: None,
            throttle: Arc::new(Mutex::new(0.0)),
        }
    }

    /// Route the servo endpoints to `device_id`.
    pub fn with_servo(mut self, device_id: impl Into<String>) -> Self {
        self.servo = Some(device_id.into());
        self
    }

    /// Last throttle acknowledged by the servo device.
    pub fn throttle(&self) -> Result<f64, GatewayError> {
        self.throttle
            .lock()
            .map(|t| *t)
            .map_err(|_| GatewayError::Poisoned)
    }

    fn set_throttle(&self, value: f64) -> Result<(), GatewayError> {
        let mut throttle = self.throttle.lock().map_err(|_| GatewayError::Poisoned)?;
        *throttle = value;
        Ok(())
    }

    /// Run `f` against the registry on the blocking pool.
    async fn with_manager<T, F>(&self, f: F) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: FnOnce(&mut DeviceManager) -> Result<T, HostError> + Send + 'static,
    {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || -> Result<T, GatewayError> {
            let mut manager = manager.lock().map_err(|_| GatewayError::Poisoned)?;
            Ok(f(&mut manager)?)
        })
        .await?
    }

    async fn servo_command(
        &self,
        cmd: &'static str,
        data: Map<String, Value>,
    ) -> Result<Map<String, Value>, GatewayError> {
        let device = self.servo.clone().ok_or(GatewayError::NoServo)?;
        self.with_manager(move |m| m.send(&device, cmd, data)?.into_result())
            .await
    }
}

/// Body of `POST /servo/throttle`.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleRequest {
    pub value: f64,
}

/// Builds the axum `Router` with all gateway routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/arduino/devices", get(handle_devices))
        .route("/arduino/rescan", post(handle_rescan))
        .route("/arduino/{device_id}/cmd", post(handle_cmd))
        .route("/servo/state", get(handle_servo_state))
        .route("/servo/throttle", post(handle_servo_throttle))
        .route("/servo/stop", post(handle_servo_stop))
        .with_state(state)
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

async fn handle_devices(State(state): State<AppState>) -> Result<Json<Value>, GatewayError> {
    let devices = state.with_manager(|m| Ok(m.list_devices())).await?;
    Ok(Json(json!({"ok": true, "devices": devices})))
}

async fn handle_rescan(State(state): State<AppState>) -> Result<Json<Value>, GatewayError> {
    let config = Arc::clone(&state.config);
    let devices = state.with_manager(move |m| Ok(m.rescan(&config))).await?;
    tracing::info!(
        online = devices.iter().filter(|d| d.online).count(),
        total = devices.len(),
        "rescan complete"
    );
    Ok(Json(json!({"ok": true, "devices": devices})))
}

async fn handle_cmd(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(request): Json<Request>,
) -> Result<Json<Value>, GatewayError> {
    tracing::debug!(device = %device_id, cmd = %request.cmd, "forwarding command");
    let data = state
        .with_manager(move |m| m.send(&device_id, &request.cmd, request.data)?.into_result())
        .await?;
    Ok(Json(json!({"ok": true, "data": data})))
}

async fn handle_servo_state(State(state): State<AppState>) -> Result<Json<Value>, GatewayError> {
    Ok(Json(json!({"throttle": state.throttle()?})))
}

async fn handle_servo_throttle(
    State(state): State<AppState>,
    Json(request): Json<ThrottleRequest>,
) -> Result<Json<Value>, GatewayError> {
    let value = request.value.clamp(THROTTLE_MIN, THROTTLE_MAX);
    let mut data = Map::new();
    data.insert("value".to_string(), json!(value));

    let reply = state.servo_command("servo.set", data).await?;
    let throttle = reply.get("throttle").and_then(Value::as_f64).unwrap_or(value);
    state.set_throttle(throttle)?;
    Ok(Json(json!({"ok": true, "value": throttle})))
}

async fn handle_servo_stop(State(state): State<AppState>) -> Result<Json<Value>, GatewayError> {
    state.servo_command("servo.stop", Map::new()).await?;
    state.set_throttle(0.0)?;
    Ok(Json(json!({"ok": true})))
}
