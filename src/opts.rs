use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use smart_default::SmartDefault;

use crate::constant::DEFAULT_PORT;
use crate::error::{Error, Result};

/// String key/value connection properties
pub type Properties = BTreeMap<String, String>;

/// Prefix of every connection URL
pub const URL_PREFIX: &str = "jdbc:traindb:";

const SHORT_PREFIX: &str = "traindb:";

pub const HOST_KEY: &str = "server.host";
pub const PORT_KEY: &str = "server.port";
pub const DATABASE_KEY: &str = "database";

/// One server address
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault)]
pub struct HostSpec {
    #[default = "localhost"]
    pub host: String,
    #[default(DEFAULT_PORT)]
    pub port: u16,
}

impl HostSpec {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parse a connection URL into properties, starting from `defaults`
///
/// ```text
/// jdbc:traindb://host1[:port1][,host2[:port2]...][/database][?key=value&...]
/// traindb://...
/// jdbc:traindb:           (localhost:58000)
/// ```
///
/// Hosts and ports are stored comma-separated under `server.host` and `server.port`.
/// Query arguments override `defaults`; a key without `=` maps to an empty string.
pub fn parse_url(url: &str, defaults: &Properties) -> Result<Properties> {
    let (server, args) = url.split_once('?').unwrap_or((url, ""));
    let rest = server
        .strip_prefix(URL_PREFIX)
        .or_else(|| server.strip_prefix(SHORT_PREFIX))
        .ok_or_else(|| {
            Error::BadConfigError(format!(
                "Invalid URL '{url}', expected prefix '{URL_PREFIX}' or '{SHORT_PREFIX}'"
            ))
        })?;

    let mut props = defaults.clone();
    match rest.strip_prefix("//") {
        Some(authority) => {
            let (authority, database) = authority.split_once('/').unwrap_or((authority, ""));
            let mut hosts = Vec::new();
            let mut ports = Vec::new();
            for addr in authority.split(',') {
                let spec = parse_host(addr.trim())?;
                hosts.push(spec.host);
                ports.push(spec.port.to_string());
            }
            props.insert(HOST_KEY.to_string(), hosts.join(","));
            props.insert(PORT_KEY.to_string(), ports.join(","));
            if !database.is_empty() {
                props.insert(DATABASE_KEY.to_string(), database.to_string());
            }
        }
        None => {
            props.insert(HOST_KEY.to_string(), "localhost".to_string());
            props.insert(PORT_KEY.to_string(), DEFAULT_PORT.to_string());
        }
    }

    for (key, value) in url::form_urlencoded::parse(args.as_bytes()) {
        props.insert(key.into_owned(), value.into_owned());
    }
    Ok(props)
}

fn parse_host(addr: &str) -> Result<HostSpec> {
    let (host, port) = match addr.rsplit_once(':') {
        // a ':' inside brackets belongs to an IPv6 literal
        Some((host, port)) if !port.contains(']') => {
            let port = if port.is_empty() {
                DEFAULT_PORT
            } else {
                port.parse()
                    .map_err(|_| Error::BadConfigError(format!("Invalid port in '{addr}'")))?
            };
            (host, port)
        }
        _ => (addr, DEFAULT_PORT),
    };
    let host = if host.is_empty() { "localhost" } else { host };
    Ok(HostSpec::new(host, port))
}

/// A configuration for connection
///
/// ```rs
/// let mut opts1 = Opts::default();
/// opts1.hosts = vec![HostSpec::new("db1", 58000)];
///
/// let mut opts2 = Opts::try_from("jdbc:traindb://db1,db2:58001?user=alice")?;
/// opts2.tcp_keep_alive = true;
/// ```
#[derive(Debug, Clone, SmartDefault)]
pub struct Opts {
    /// Servers tried in order; the first successful connection wins
    #[default(_code = "vec![HostSpec::default()]")]
    pub hosts: Vec<HostSpec>,

    pub database: Option<String>,

    /// Defaults to `$USER`
    #[default(std::env::var("USER").unwrap_or_default())]
    pub user: String,

    pub password: String,

    /// URL reported to the server in the startup message
    #[default = "jdbc:traindb://localhost:58000"]
    pub url: String,

    /// Timeout of each TCP connect attempt. `None` waits for the OS.
    #[default(Some(Duration::from_secs(10)))]
    pub connect_timeout: Option<Duration>,

    /// Bound on the whole connection setup, enforced from a helper thread
    pub login_timeout: Option<Duration>,

    /// Read timeout on the socket
    pub socket_timeout: Option<Duration>,

    /// Enable TCP_NODELAY socket option to disable Nagle's algorithm
    #[default(true)]
    pub tcp_nodelay: bool,

    pub tcp_keep_alive: bool,

    /// SO_RCVBUF. `-1` keeps the system default, `0` is ignored with a warning.
    #[default(-1)]
    pub receive_buffer_size: i32,

    /// SO_SNDBUF. `-1` keeps the system default, `0` is ignored with a warning.
    #[default(-1)]
    pub send_buffer_size: i32,

    /// Limit on data-row bytes per request
    pub max_result_buffer: Option<u64>,

    /// Every property without a dedicated field
    pub properties: Properties,
}

impl Opts {
    /// Build options from the URL alone
    pub fn from_url(url: &str) -> Result<Self> {
        let props = parse_url(url, &Properties::new())?;
        let mut opts = Self::try_from(&props)?;
        opts.url = url.to_string();
        Ok(opts)
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(url: &str) -> Result<Self> {
        Self::from_url(url)
    }
}

impl TryFrom<String> for Opts {
    type Error = Error;

    fn try_from(url: String) -> Result<Self> {
        Self::from_url(&url)
    }
}

impl TryFrom<&Properties> for Opts {
    type Error = Error;

    fn try_from(props: &Properties) -> Result<Self> {
        let mut opts = Opts::default();
        let mut host_list = None;
        let mut port_list = None;

        for (key, value) in props {
            match key.as_str() {
                HOST_KEY => host_list = Some(value.as_str()),
                PORT_KEY => port_list = Some(value.as_str()),
                DATABASE_KEY => opts.database = Some(value.clone()),
                "user" => opts.user = value.clone(),
                "password" => opts.password = value.clone(),
                "connectTimeout" => opts.connect_timeout = parse_seconds(key, value)?,
                "loginTimeout" => opts.login_timeout = parse_fractional_seconds(key, value)?,
                "socketTimeout" => opts.socket_timeout = parse_seconds(key, value)?,
                "tcpKeepAlive" => opts.tcp_keep_alive = parse_bool(key, value)?,
                "tcpNoDelay" => opts.tcp_nodelay = parse_bool(key, value)?,
                "receiveBufferSize" => opts.receive_buffer_size = parse_int(key, value)?,
                "sendBufferSize" => opts.send_buffer_size = parse_int(key, value)?,
                "maxResultBuffer" => opts.max_result_buffer = parse_max_result_buffer(value)?,
                _ => {
                    opts.properties.insert(key.clone(), value.clone());
                }
            }
        }

        if let Some(hosts) = host_list {
            opts.hosts = zip_hosts(hosts, port_list.unwrap_or(""))?;
        }
        opts.url = build_url(&opts.hosts, opts.database.as_deref());
        Ok(opts)
    }
}

fn zip_hosts(hosts: &str, ports: &str) -> Result<Vec<HostSpec>> {
    let mut ports = ports.split(',').map(str::trim);
    hosts
        .split(',')
        .map(|host| {
            let port = match ports.next() {
                Some(port) if !port.is_empty() => port.parse().map_err(|_| {
                    Error::BadConfigError(format!("Invalid port '{port}' for host '{host}'"))
                })?,
                _ => DEFAULT_PORT,
            };
            let host = host.trim();
            let host = if host.is_empty() { "localhost" } else { host };
            Ok(HostSpec::new(host, port))
        })
        .collect()
}

fn build_url(hosts: &[HostSpec], database: Option<&str>) -> String {
    let hosts: Vec<String> = hosts.iter().map(ToString::to_string).collect();
    match database {
        Some(db) => format!("{URL_PREFIX}//{}/{db}", hosts.join(",")),
        None => format!("{URL_PREFIX}//{}", hosts.join(",")),
    }
}

fn bad_value(key: &str, value: &str) -> Error {
    Error::BadConfigError(format!("Invalid value for {key}: '{value}'"))
}

fn parse_int(key: &str, value: &str) -> Result<i32> {
    value.trim().parse().map_err(|_| bad_value(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(bad_value(key, value)),
    }
}

/// Whole seconds; `0` disables the timeout
fn parse_seconds(key: &str, value: &str) -> Result<Option<Duration>> {
    let secs: u64 = value.trim().parse().map_err(|_| bad_value(key, value))?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

/// Seconds with an optional fraction; zero or negative disables the timeout
fn parse_fractional_seconds(key: &str, value: &str) -> Result<Option<Duration>> {
    let secs: f64 = value.trim().parse().map_err(|_| bad_value(key, value))?;
    if !secs.is_finite() {
        return Err(bad_value(key, value));
    }
    if secs <= 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|_| bad_value(key, value))
}

/// Byte count with an optional `K`, `M`, `G` or `T` suffix (powers of 1000); `-1` for no limit
pub fn parse_max_result_buffer(value: &str) -> Result<Option<u64>> {
    let s = value.trim();
    if s == "-1" {
        return Ok(None);
    }
    let multiplier: u64 = match s.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('K') => 1_000,
        Some('M') => 1_000_000,
        Some('G') => 1_000_000_000,
        Some('T') => 1_000_000_000_000,
        _ => 1,
    };
    let digits = if multiplier == 1 { s } else { s.split_at(s.len() - 1).0 };
    let count: u64 = digits
        .trim()
        .parse()
        .map_err(|_| bad_value("maxResultBuffer", value))?;
    count
        .checked_mul(multiplier)
        .map(Some)
        .ok_or_else(|| bad_value("maxResultBuffer", value))
}
