//! Command handler for the simulated device.
//!
//! Mirrors a small actuator board:
//!
//! | cmd          | data        | response data      |
//! |--------------|-------------|--------------------|
//! | `echo`       | any         | same fields        |
//! | `servo.set`  | `{value}`   | `{throttle}`       |
//! | `servo.stop` |             | `{throttle: 0.0}`  |

use puter_serial::{JsonMap, JsonObject};
use serde_json::Value;

/// Lowest throttle the servo accepts.
pub const THROTTLE_MIN: f64 = -1.0;

/// Highest throttle the servo accepts.
pub const THROTTLE_MAX: f64 = 1.0;

/// Handle the demo board's commands.
pub fn demo_handler(cmd: &str, data: &JsonMap, out: &mut JsonObject) -> bool {
    match cmd {
        "echo" => {
            for (key, value) in data {
                if let Err(e) = out.insert(key, value.clone()) {
                    tracing::debug!("echo: dropping {}: {}", key, e);
                }
            }
            true
        }
        "servo.set" => {
            let value = data.get("value").and_then(Value::as_f64).unwrap_or(0.0);
            let throttle = value.clamp(THROTTLE_MIN, THROTTLE_MAX);
            if let Err(e) = out.insert("throttle", throttle) {
                tracing::debug!("servo.set: dropping throttle: {}", e);
            }
            true
        }
        "servo.stop" => {
            if let Err(e) = out.insert("throttle", 0.0) {
                tracing::debug!("servo.stop: dropping throttle: {}", e);
            }
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(cmd: &str, data: Value) -> Option<Value> {
        let data = data.as_object().cloned().unwrap_or_default();
        let mut out = JsonObject::with_capacity(216);
        demo_handler(cmd, &data, &mut out).then(|| Value::Object(out.as_map().clone()))
    }

    #[test]
    fn test_echo() {
        assert_eq!(run("echo", json!({"v": 5, "s": "x"})), Some(json!({"v": 5, "s": "x"})));
    }

    #[test]
    fn test_servo_set_clamps() {
        assert_eq!(run("servo.set", json!({"value": 0.25})), Some(json!({"throttle": 0.25})));
        assert_eq!(run("servo.set", json!({"value": 3})), Some(json!({"throttle": 1.0})));
        assert_eq!(run("servo.set", json!({"value": -7.5})), Some(json!({"throttle": -1.0})));
        assert_eq!(run("servo.set", json!({})), Some(json!({"throttle": 0.0})));
    }

    #[test]
    fn test_servo_stop() {
        assert_eq!(run("servo.stop", json!({})), Some(json!({"throttle": 0.0})));
    }

    #[test]
    fn test_unknown() {
        assert_eq!(run("reboot", json!({})), None);
    }
}
