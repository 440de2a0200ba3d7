use crate::error::SensorError;
use std::process::Command;
use tokio::time::{Duration, Instant};

/// Two orthogonal acceleration axes sampled at one instant (g)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisReading {
    pub x: f64,
    pub y: f64,
}

impl AxisReading {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Motion signal: planar magnitude, always >= 0
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Anything that can produce an instantaneous accelerometer reading.
///
/// Reads block the caller; the node is single-threaded, so a slow sensor
/// stalls the whole loop.
pub trait AccelerationSource {
    fn read(&mut self) -> Result<AxisReading, SensorError>;

    /// Read one sample and reduce it to a magnitude, rejecting NaN/inf
    fn read_magnitude(&mut self) -> Result<f64, SensorError> {
        let reading = self.read()?;
        let magnitude = reading.magnitude();
        if magnitude.is_finite() {
            Ok(magnitude)
        } else {
            Err(SensorError::NonFinite)
        }
    }
}

impl<S: AccelerationSource + ?Sized> AccelerationSource for Box<S> {
    fn read(&mut self) -> Result<AxisReading, SensorError> {
        (**self).read()
    }
}

/// Startup reachability check. Any error here is fatal for the node.
pub fn probe<S: AccelerationSource + ?Sized>(source: &mut S) -> Result<f64, SensorError> {
    source.read_magnitude()
}

/// Accelerometer exposed through the Termux:API `termux-sensor` command
pub struct TermuxAccelerometer {
    sensor_name: String,
}

impl TermuxAccelerometer {
    pub fn new() -> Self {
        Self {
            sensor_name: "accelerometer".to_string(),
        }
    }
}

impl Default for TermuxAccelerometer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccelerationSource for TermuxAccelerometer {
    fn read(&mut self) -> Result<AxisReading, SensorError> {
        let output = Command::new("termux-sensor")
            .arg("-n")
            .arg("1")
            .arg("-s")
            .arg(&self.sensor_name)
            .output()
            .map_err(|e| SensorError::Unavailable(format!("termux-sensor: {}", e)))?;

        if !output.status.success() {
            return Err(SensorError::Unavailable(format!(
                "termux-sensor exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_sensor_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse one `termux-sensor` event.
///
/// Newer Termux:API builds print JSON (`{"<name>": {"values": [x, y, z]}}`),
/// older ones print `x=X, y=Y, z=Z, ...`. Both are accepted.
pub fn parse_sensor_output(output: &str) -> Result<AxisReading, SensorError> {
    let text = output.trim();
    if text.is_empty() {
        return Err(SensorError::Parse("empty output".to_string()));
    }

    if text.starts_with('{') {
        return parse_json_event(text);
    }

    let mut x = None;
    let mut y = None;
    for part in text.split(|c| c == ',' || c == ':') {
        let part = part.trim();
        if let Some(val_str) = part.strip_prefix("x=") {
            x = val_str.trim().parse().ok();
        } else if let Some(val_str) = part.strip_prefix("y=") {
            y = val_str.trim().parse().ok();
        }
    }

    match (x, y) {
        (Some(x), Some(y)) => Ok(AxisReading { x, y }),
        _ => Err(SensorError::Parse(text.to_string())),
    }
}

fn parse_json_event(text: &str) -> Result<AxisReading, SensorError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| SensorError::Parse(e.to_string()))?;

    let values = value
        .as_object()
        .and_then(|sensors| sensors.values().find_map(|s| s.get("values")))
        .and_then(|v| v.as_array())
        .ok_or_else(|| SensorError::Parse("no sensor values in event".to_string()))?;

    let axis = |i: usize| values.get(i).and_then(|v| v.as_f64());
    match (axis(0), axis(1)) {
        (Some(x), Some(y)) => Ok(AxisReading { x, y }),
        _ => Err(SensorError::Parse(format!(
            "expected at least two axes, got {}",
            values.len()
        ))),
    }
}

/// Synthetic accelerometer: small sinusoidal jitter, plus an optional
/// periodic knock so the whole pipeline can be exercised without hardware.
pub struct SimulatedAccelerometer {
    samples: u64,
    started: Instant,
    knock_every: Option<Duration>,
}

const KNOCK_WIDTH: Duration = Duration::from_millis(300);

impl SimulatedAccelerometer {
    pub fn new(knock_every: Option<Duration>) -> Self {
        Self {
            samples: 0,
            started: Instant::now(),
            knock_every: knock_every.filter(|d| !d.is_zero()),
        }
    }

    fn knocking(&self) -> bool {
        let Some(every) = self.knock_every else {
            return false;
        };
        let elapsed = self.started.elapsed();
        let phase = elapsed.as_millis() % every.as_millis();
        elapsed >= every && phase < KNOCK_WIDTH.as_millis()
    }
}

impl AccelerationSource for SimulatedAccelerometer {
    fn read(&mut self) -> Result<AxisReading, SensorError> {
        use std::f64::consts::PI;
        let t = self.samples as f64 * 0.02;
        self.samples += 1;

        if self.knocking() {
            return Ok(AxisReading {
                x: 2.5 + (t * 7.0).sin() * 0.5,
                y: 1.5,
            });
        }

        Ok(AxisReading {
            x: 0.02 + (t * 2.0 * PI).sin() * 0.005,
            y: 0.01 + (t * 2.0 * PI).cos() * 0.003,
        })
    }
}

#[cfg(test)]
pub use scripted::ScriptedAccelerometer;
