use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use socket2::SockRef;
use tracing::{debug, warn};

use crate::error::{Error, Result, eyre};
use crate::opts::{HostSpec, Opts, Properties, parse_url};
use crate::protocol::packet::{StartupParams, write_startup};
use crate::sync::executor::QueryExecutor;
use crate::sync::stream::ByteStream;

/// Opens connections and hands back a ready [`QueryExecutor`]
#[derive(Debug, Clone, Default)]
pub struct ConnectionFactory {
    _private: (),
}

impl ConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if `url` is a connection URL this factory understands
    pub fn accepts_url(&self, url: &str) -> bool {
        parse_url(url, &Properties::new()).is_ok()
    }

    /// Parse `url` on top of `info` and connect
    pub fn connect(&self, url: &str, info: &Properties) -> Result<QueryExecutor> {
        let props = parse_url(url, info)?;
        let mut opts = Opts::try_from(&props)?;
        opts.url = url.to_string();
        self.open(&opts)
    }

    /// Connect with the given options
    ///
    /// With a login timeout the attempt runs on a helper thread. If the timeout expires
    /// first the caller gets [`Error::ConnectTimeout`] and a connection completed later
    /// is closed by the helper.
    pub fn open(&self, opts: &Opts) -> Result<QueryExecutor> {
        debug!(url = %opts.url, "connecting");
        match opts.login_timeout {
            Some(timeout) => open_with_timeout(opts.clone(), timeout),
            None => open_connection(opts),
        }
    }
}

fn open_with_timeout(opts: Opts, timeout: Duration) -> Result<QueryExecutor> {
    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name("traindb-connect".to_string())
        .spawn(move || {
            let result = open_connection(&opts);
            if let Err(mpsc::SendError(Ok(mut executor))) = tx.send(result) {
                debug!("closing connection completed after the login timeout");
                if let Err(e) = executor.close() {
                    debug!("error closing abandoned connection: {e}");
                }
            }
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(Error::ConnectTimeout),
        Err(RecvTimeoutError::Disconnected) => Err(Error::LibraryBug(eyre!(
            "connection thread exited without a result"
        ))),
    }
}

fn open_connection(opts: &Opts) -> Result<QueryExecutor> {
    let mut last_error = None;
    for host in &opts.hosts {
        match try_connect(host, opts) {
            Ok(executor) => {
                debug!(%host, "connected");
                return Ok(executor);
            }
            Err(e) => {
                debug!(%host, "connection attempt failed: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(Error::ConnectionUnableToConnect(match last_error {
        Some(e) => e.to_string(),
        None => "no hosts to connect to".to_string(),
    }))
}

fn try_connect(host: &HostSpec, opts: &Opts) -> Result<QueryExecutor> {
    let socket = connect_socket(host, opts.connect_timeout)?;
    configure_socket(&socket, opts);

    let mut stream = ByteStream::new(socket);
    stream.set_max_result_buffer(opts.max_result_buffer);
    let params = StartupParams {
        url: &opts.url,
        user: &opts.user,
        password: &opts.password,
    };
    write_startup(stream.output_mut(), &params)?;
    tracing::trace!(" FE=> Startup(url={}, user={})", opts.url, opts.user);
    stream.flush()?;
    Ok(QueryExecutor::new(stream))
}

fn connect_socket(host: &HostSpec, timeout: Option<Duration>) -> Result<TcpStream> {
    let name = host.host.trim_start_matches('[').trim_end_matches(']');
    let mut last_error = None;
    for addr in (name, host.port).to_socket_addrs()? {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(socket) => return Ok(socket),
            Err(e) => last_error = Some(e),
        }
    }
    Err(match last_error {
        Some(e) => Error::IoError(e),
        None => Error::ConnectionUnableToConnect(format!("{host} did not resolve to an address")),
    })
}

/// Apply socket options. Failures are logged and the connection proceeds.
fn configure_socket(socket: &TcpStream, opts: &Opts) {
    if let Err(e) = socket.set_nodelay(opts.tcp_nodelay) {
        warn!("Failed to set TCP_NODELAY: {e}");
    }
    if let Err(e) = socket.set_read_timeout(opts.socket_timeout) {
        warn!("Failed to set socket timeout: {e}");
    }

    let sock = SockRef::from(socket);
    if let Err(e) = sock.set_keepalive(opts.tcp_keep_alive) {
        warn!("Failed to set SO_KEEPALIVE: {e}");
    }

    match usize::try_from(opts.receive_buffer_size) {
        Ok(0) => warn!("Ignore invalid value for receiveBufferSize: 0"),
        Ok(size) => {
            if let Err(e) = sock.set_recv_buffer_size(size) {
                warn!("Failed to set receive buffer size {size}: {e}");
            }
        }
        Err(_) => {}
    }
    match usize::try_from(opts.send_buffer_size) {
        Ok(0) => warn!("Ignore invalid value for sendBufferSize: 0"),
        Ok(size) => {
            if let Err(e) = sock.set_send_buffer_size(size) {
                warn!("Failed to set send buffer size {size}: {e}");
            }
        }
        Err(_) => {}
    }

    if let (Ok(recv), Ok(send)) = (sock.recv_buffer_size(), sock.send_buffer_size()) {
        debug!(recv, send, "socket buffer sizes");
    }
}
