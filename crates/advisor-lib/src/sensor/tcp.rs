use super::SensorSource;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_SENSOR_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest record accepted from the bridge, newline included
pub const MAX_LINE_BYTES: usize = 256;

#[derive(Debug, Clone)]
pub struct TcpSensorConfig {
    /// `host:port` of the serial bridge
    pub addr: String,
    /// Bound on a whole read: resolving, connecting and waiting for a line
    pub timeout: Duration,
}

impl TcpSensorConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_SENSOR_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Reads sensor lines from a serial-to-TCP bridge
///
/// The connection is opened lazily and dropped after any error so the
/// next read reconnects. Each `read_line` call finishes within the
/// configured timeout no matter how the bridge trickles bytes.
pub struct TcpSensorSource {
    config: TcpSensorConfig,
    stream: Option<TcpStream>,
    pending: Vec<u8>,
}

fn timed_out(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("sensor {} timed out", what))
}

fn remaining(deadline: Instant, what: &str) -> io::Result<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        Err(timed_out(what))
    } else {
        Ok(left)
    }
}

impl TcpSensorSource {
    pub fn new(config: TcpSensorConfig) -> Self {
        Self {
            config,
            stream: None,
            pending: Vec::new(),
        }
    }

    fn resolve(&self, deadline: Instant) -> io::Result<Vec<SocketAddr>> {
        if let Ok(addr) = self.config.addr.parse::<SocketAddr>() {
            return Ok(vec![addr]);
        }

        // The system resolver cannot be cancelled, so run it off-thread
        let (tx, rx) = mpsc::channel();
        let host = self.config.addr.clone();
        thread::spawn(move || {
            let resolved = host.to_socket_addrs().map(|addrs| addrs.collect::<Vec<_>>());
            let _ = tx.send(resolved);
        });

        match rx.recv_timeout(remaining(deadline, "lookup")?) {
            Ok(resolved) => resolved,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(timed_out("lookup")),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::Other,
                "sensor address lookup failed",
            )),
        }
    }

    fn connect(&self, deadline: Instant) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in self.resolve(deadline)? {
            match TcpStream::connect_timeout(&addr, remaining(deadline, "connect")?) {
                Ok(stream) => {
                    debug!(addr = %addr, "Connected to sensor");
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{} did not resolve to any address", self.config.addr),
            )
        }))
    }

    fn take_line(&mut self) -> io::Result<Option<String>> {
        let end = match self.pending.iter().position(|b| *b == b'\n') {
            Some(pos) => pos + 1,
            None if self.pending.len() >= MAX_LINE_BYTES => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("no line break within {} bytes", MAX_LINE_BYTES),
                ));
            }
            None => return Ok(None),
        };
        let line: Vec<u8> = self.pending.drain(..end).collect();
        if line.len() > MAX_LINE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line longer than {} bytes", MAX_LINE_BYTES),
            ));
        }
        String::from_utf8(line)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn reset(&mut self) {
        self.stream = None;
        self.pending.clear();
    }

    fn read_until_deadline(&mut self, deadline: Instant) -> io::Result<Option<String>> {
        if self.stream.is_none() {
            self.stream = Some(self.connect(deadline)?);
        }

        let mut chunk = [0u8; 64];
        loop {
            if let Some(line) = self.take_line()? {
                return Ok(Some(line));
            }

            let left = remaining(deadline, "read")?;
            let Some(stream) = self.stream.as_mut() else {
                return Ok(None);
            };
            stream.set_read_timeout(Some(left))?;
            match stream.read(&mut chunk) {
                Ok(0) => {
                    let rest = std::mem::take(&mut self.pending);
                    self.stream = None;
                    if rest.is_empty() {
                        return Ok(None);
                    }
                    return String::from_utf8(rest)
                        .map(Some)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(timed_out("read"));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl SensorSource for TcpSensorSource {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let deadline = Instant::now() + self.config.timeout;
        let result = self.read_until_deadline(deadline);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.config.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureVector;
    use crate::sensor::{FallbackReason, SensorAdapter};
    use std::io::Write;
    use std::net::TcpListener;

    fn config(addr: String) -> TcpSensorConfig {
        TcpSensorConfig::new(addr).with_timeout(Duration::from_millis(200))
    }

    #[test]
    fn test_reads_line_from_bridge() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"85,58,41,21.77,80.31,7.03,226.65\n").unwrap();
        });

        let mut adapter = SensorAdapter::new(TcpSensorSource::new(config(addr)));
        let reading = adapter.read();
        server.join().unwrap();

        assert!(!reading.is_fallback());
        assert_eq!(reading.features().nitrogen, 85.0);
    }

    #[test]
    fn test_closed_port_falls_back() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let mut adapter = SensorAdapter::new(TcpSensorSource::new(config(addr)));
        let reading = adapter.read();
        assert_eq!(reading.features(), &FeatureVector::DEFAULT);
        assert!(matches!(
            reading.fallback_reason(),
            Some(FallbackReason::Unavailable(_))
        ));
    }

    #[test]
    fn test_silent_bridge_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let mut adapter = SensorAdapter::new(TcpSensorSource::new(config(addr)));
        let reading = adapter.read();
        drop(listener);

        assert!(matches!(
            reading.fallback_reason(),
            Some(FallbackReason::Unavailable(_))
        ));
    }

    #[test]
    fn test_trickling_bridge_is_bounded() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            for _ in 0..20 {
                if stream.write_all(b"1").is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(100));
            }
        });

        let mut adapter = SensorAdapter::new(TcpSensorSource::new(config(addr)));
        let started = Instant::now();
        let reading = adapter.read();
        let elapsed = started.elapsed();
        drop(adapter);
        server.join().unwrap();

        assert!(elapsed < Duration::from_millis(400), "took {:?}", elapsed);
        assert_eq!(reading.features(), &FeatureVector::DEFAULT);
        assert!(matches!(
            reading.fallback_reason(),
            Some(FallbackReason::Unavailable(_))
        ));
    }

    #[test]
    fn test_line_without_break_is_capped() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = stream.write_all(&[b'7'; MAX_LINE_BYTES + 10]);
            thread::sleep(Duration::from_millis(300));
        });

        let mut adapter = SensorAdapter::new(
            TcpSensorSource::new(TcpSensorConfig::new(addr).with_timeout(Duration::from_secs(2))),
        );
        let reading = adapter.read();
        server.join().unwrap();

        assert!(matches!(
            reading.fallback_reason(),
            Some(FallbackReason::Malformed(_))
        ));
    }

    #[test]
    fn test_keeps_connection_between_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .write_all(b"85,58,41,21.77,80.31,7.03,226.65\n60,55,44,23.0,82.3,7.8,263.9\n")
                .unwrap();
        });

        let mut source = TcpSensorSource::new(config(addr));
        let first = source.read_line().unwrap().unwrap();
        let second = source.read_line().unwrap().unwrap();
        server.join().unwrap();

        assert!(first.starts_with("85,"));
        assert!(second.starts_with("60,"));
        assert_eq!(source.read_line().unwrap(), None);
    }

    #[test]
    fn test_unresolvable_address() {
        let mut source = TcpSensorSource::new(config("not a host".to_string()));
        assert!(source.read_line().is_err());
        assert_eq!(source.describe(), "tcp://not a host");
    }
}
