//! Settings of the gateway FTP server and their defaults.

use hyper::HeaderMap;
use hyper::header::{HeaderName, HeaderValue};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use thiserror::Error;

/// Address the server listens on unless told otherwise.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:2121";
/// Greeting sent to connecting clients.
pub const DEFAULT_GREETING: &str = "Welcome to the ftpgate FTP server";
/// Ports handed out for passive data connections.
pub const DEFAULT_PASSIVE_PORTS: RangeInclusive<u16> = 49152..=65535;
/// Seconds of inactivity after which a session is closed.
pub const DEFAULT_IDLE_SESSION_TIMEOUT_SECS: u64 = 600;

/// Raised for a malformed `name: value` proxy header.
#[derive(Debug, Error)]
#[error("invalid proxy header {0:?}, expected NAME:VALUE")]
pub struct HeaderParseError(String);

/// Server settings.
#[derive(Clone, Debug)]
pub struct Options {
    /// Listen address of the control channel.
    pub bind_address: String,
    /// Greeting sent on connect.
    pub greeting: &'static str,
    /// Passive data port range.
    pub passive_ports: RangeInclusive<u16>,
    /// Idle session timeout in seconds.
    pub idle_session_timeout: u64,
    /// Root directory of the local storage back-end.
    pub storage_root: PathBuf,
    /// Where uploads are buffered before they are committed.
    pub temp_dir: PathBuf,
    /// The users file, holding accounts and their credentials.
    pub users_file: Option<PathBuf>,
    /// The metas file.
    pub metas_file: Option<PathBuf>,
    /// Headers forwarded to origins when file links are fetched.
    pub proxy_header: HeaderMap,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            greeting: DEFAULT_GREETING,
            passive_ports: DEFAULT_PASSIVE_PORTS,
            idle_session_timeout: DEFAULT_IDLE_SESSION_TIMEOUT_SECS,
            storage_root: PathBuf::from("."),
            temp_dir: std::env::temp_dir(),
            users_file: None,
            metas_file: None,
            proxy_header: HeaderMap::new(),
        }
    }
}

/// Parses a `name: value` pair into a header.
pub fn parse_header(s: &str) -> Result<(HeaderName, HeaderValue), HeaderParseError> {
    let err = || HeaderParseError(s.to_string());
    let (name, value) = s.split_once(':').ok_or_else(err)?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| err())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|_| err())?;
    Ok((name, value))
}

/// Parses a `low-high` port range.
pub fn parse_port_range(s: &str) -> Option<RangeInclusive<u16>> {
    let (low, high) = s.split_once('-')?;
    let low: u16 = low.trim().parse().ok()?;
    let high: u16 = high.trim().parse().ok()?;
    (low <= high).then_some(low..=high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn headers() {
        let (name, value) = parse_header("User-Agent: ftpgate/1.0").unwrap();
        assert_eq!(name, hyper::header::USER_AGENT);
        assert_eq!(value, "ftpgate/1.0");
        assert!(parse_header("no separator").is_err());
        assert!(parse_header("bad name: x").is_err());
    }

    #[rstest]
    #[case("5000-5005", Some(5000..=5005))]
    #[case(" 21 - 21 ", Some(21..=21))]
    #[case("6000-5000", None)]
    #[case("5000", None)]
    #[case("a-b", None)]
    fn port_ranges(#[case] input: &str, #[case] expected: Option<RangeInclusive<u16>>) {
        assert_eq!(parse_port_range(input), expected);
    }
}
