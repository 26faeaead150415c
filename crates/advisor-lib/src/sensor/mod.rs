//! Live sensor input with an offline fallback
//!
//! A sensor source yields at most one line of comma-separated text per
//! read. The adapter parses it into a `FeatureVector`; any connectivity
//! problem, missing data or malformed line is converted into the
//! configured default vector instead of an error.

mod tcp;

pub use tcp::{TcpSensorConfig, TcpSensorSource, DEFAULT_SENSOR_TIMEOUT};

use crate::models::{FeatureVector, NUM_FEATURES};
use std::fmt;
use std::io::{self, BufRead};
use tracing::{debug, warn};

/// A line-oriented feed of sensor readings
pub trait SensorSource {
    /// Read one line; `Ok(None)` means the source had nothing to offer
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        (**self).read_line()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Sensor source over any buffered reader (stdin, files, tests)
pub struct ReaderSensorSource<R> {
    reader: R,
    name: String,
}

impl<R: BufRead> ReaderSensorSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
        }
    }
}

impl<R: BufRead> SensorSource for ReaderSensorSource<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        match self.reader.read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// A source that never has data, for deployments without hardware
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSensor;

impl SensorSource for NoSensor {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(None)
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}

/// Why a reading fell back to the default vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// Connection failed or timed out
    Unavailable(String),
    /// Source connected but produced no line
    NoData,
    /// Line could not be parsed into seven numbers
    Malformed(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Unavailable(msg) => write!(f, "sensor unavailable: {}", msg),
            FallbackReason::NoData => write!(f, "sensor produced no data"),
            FallbackReason::Malformed(msg) => write!(f, "malformed sensor data: {}", msg),
        }
    }
}

/// Outcome of one adapter read
#[derive(Debug, Clone, PartialEq)]
pub enum SensorReading {
    Live(FeatureVector),
    Fallback {
        features: FeatureVector,
        reason: FallbackReason,
    },
}

impl SensorReading {
    pub fn features(&self) -> &FeatureVector {
        match self {
            SensorReading::Live(features) => features,
            SensorReading::Fallback { features, .. } => features,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SensorReading::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            SensorReading::Live(_) => None,
            SensorReading::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Converts a sensor source into feature vectors, never failing
pub struct SensorAdapter<S> {
    source: S,
    default_features: FeatureVector,
}

impl<S: SensorSource> SensorAdapter<S> {
    pub fn new(source: S) -> Self {
        Self::with_default(source, FeatureVector::DEFAULT)
    }

    pub fn with_default(source: S, default_features: FeatureVector) -> Self {
        Self {
            source,
            default_features,
        }
    }

    pub fn default_features(&self) -> &FeatureVector {
        &self.default_features
    }

    /// Read one record or fall back to the default vector
    pub fn read(&mut self) -> SensorReading {
        let reason = match self.source.read_line() {
            Ok(Some(line)) => match parse_sensor_line(&line) {
                Ok(features) => {
                    debug!(source = %self.source.describe(), "Sensor reading parsed");
                    return SensorReading::Live(features);
                }
                Err(msg) => FallbackReason::Malformed(msg),
            },
            Ok(None) => FallbackReason::NoData,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                FallbackReason::Malformed(e.to_string())
            }
            Err(e) => FallbackReason::Unavailable(e.to_string()),
        };

        warn!(
            source = %self.source.describe(),
            reason = %reason,
            "Using default feature vector"
        );
        SensorReading::Fallback {
            features: self.default_features,
            reason,
        }
    }
}

/// Parse `N,P,K,temperature,humidity,ph,rainfall`
pub fn parse_sensor_line(line: &str) -> Result<FeatureVector, String> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if fields.len() != NUM_FEATURES {
        return Err(format!(
            "expected {} fields, found {}",
            NUM_FEATURES,
            fields.len()
        ));
    }

    let mut values = [0.0f64; NUM_FEATURES];
    for (idx, (value, raw)) in values.iter_mut().zip(&fields).enumerate() {
        *value = raw
            .parse::<f64>()
            .map_err(|_| format!("field {} is not numeric: {:?}", idx, raw))?;
        if !value.is_finite() {
            return Err(format!("field {} is not finite", idx));
        }
    }
    Ok(FeatureVector::from_array(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct FailingSource;

    impl SensorSource for FailingSource {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let mut adapter = SensorAdapter::new(ReaderSensorSource::new(
            Cursor::new(vec![0x39, 0x30, 0xff, 0xfe, b'\n']),
            "noise",
        ));
        let reading = adapter.read();
        assert_eq!(reading.features(), &FeatureVector::DEFAULT);
        assert!(matches!(
            reading.fallback_reason(),
            Some(FallbackReason::Malformed(_))
        ));
    }

    fn adapter(input: &str) -> SensorAdapter<ReaderSensorSource<Cursor<Vec<u8>>>> {
        SensorAdapter::new(ReaderSensorSource::new(
            Cursor::new(input.as_bytes().to_vec()),
            "test",
        ))
    }

    #[test]
    fn test_parse_valid_line() {
        let fv = parse_sensor_line("90, 42,43,20.87,82.0,6.5,202.93\r\n").unwrap();
        assert_eq!(
            fv.to_array(),
            [90.0, 42.0, 43.0, 20.87, 82.0, 6.5, 202.93]
        );
    }

    #[test]
    fn test_parse_wrong_field_count() {
        assert!(parse_sensor_line("1,2,3,4,5,6").is_err());
        assert!(parse_sensor_line("1,2,3,4,5,6,7,8").is_err());
        assert!(parse_sensor_line("").is_err());
    }

    #[test]
    fn test_parse_non_numeric() {
        let err = parse_sensor_line("1,2,x,4,5,6,7").unwrap_err();
        assert!(err.contains("field 2"));
        assert!(parse_sensor_line("1,2,3,4,5,6,NaN").is_err());
    }

    #[test]
    fn test_live_reading() {
        let mut adapter = adapter("80,45,40,23.5,82.5,6.4,236\n");
        let reading = adapter.read();
        assert!(!reading.is_fallback());
        assert_eq!(reading.features().potassium, 40.0);
    }

    #[test]
    fn test_malformed_reading_falls_back() {
        let mut adapter = adapter("80,45,40\n");
        let reading = adapter.read();
        assert_eq!(reading.features(), &FeatureVector::DEFAULT);
        assert!(matches!(
            reading.fallback_reason(),
            Some(FallbackReason::Malformed(_))
        ));
    }

    #[test]
    fn test_empty_source_falls_back() {
        let mut adapter = adapter("");
        let reading = adapter.read();
        assert_eq!(reading.fallback_reason(), Some(&FallbackReason::NoData));
        assert_eq!(reading.features(), &FeatureVector::DEFAULT);
    }

    #[test]
    fn test_io_error_falls_back() {
        let mut adapter = SensorAdapter::new(FailingSource);
        let reading = adapter.read();
        assert!(matches!(
            reading.fallback_reason(),
            Some(FallbackReason::Unavailable(msg)) if msg.contains("timed out")
        ));
    }

    #[test]
    fn test_custom_default() {
        let custom = FeatureVector::from_array([1.0; 7]);
        let mut adapter = SensorAdapter::with_default(NoSensor, custom);
        assert_eq!(adapter.read().features(), &custom);
        assert_eq!(adapter.default_features(), &custom);
    }

    #[test]
    fn test_reads_successive_lines() {
        let mut adapter = adapter("1,2,3,4,5,6,7\nbad\n");
        assert!(!adapter.read().is_fallback());
        assert!(adapter.read().is_fallback());
        assert_eq!(adapter.read().fallback_reason(), Some(&FallbackReason::NoData));
    }
}
