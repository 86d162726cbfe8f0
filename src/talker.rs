//! Blocking request/response exchange with a single cluster node.
//!
//! A [`Talker`] owns one TCP connection and one streaming decoder. It is
//! connected on construction and closed by [`Talker::close`]; there is no
//! reconnect, so a failed talker is dropped and a new one built. Callers that
//! query several nodes at once give each thread its own talker.

use crate::cluster::{ClusterInfo, ClusterNodes};
use crate::error::{ReplyError, Result, TribError};
use crate::protocol::encoder::{self, Arg};
use crate::protocol::{pack_command, pack_commands, RespParser, RespValue};
use bytes::{Bytes, BytesMut};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(8);

/// Bytes requested from the socket per read
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 16384;

/// Socket settings for a [`Talker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkerConfig {
    pub connect_timeout: Duration,
    /// Read and write timeout; `None` blocks forever
    pub io_timeout: Option<Duration>,
    pub recv_buffer_size: usize,
}

impl Default for TalkerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
        }
    }
}

/// Result of one read from the socket
#[derive(Debug, Clone, PartialEq)]
pub enum RecvOutcome {
    /// Bytes arrived but no reply is complete yet
    Partial,
    /// A full reply was decoded
    Complete(RespValue),
    /// The peer closed the connection
    Eof,
}

/// Connection to one cluster node
pub struct Talker {
    host: String,
    port: u16,
    stream: TcpStream,
    parser: RespParser,
    recv_buf: Vec<u8>,
    last_raw_message: BytesMut,
}

impl Talker {
    /// Connect with the default settings.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with(host, port, &TalkerConfig::default())
    }

    pub fn connect_with(host: &str, port: u16, config: &TalkerConfig) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        let connect_err = |source| TribError::Connect {
            addr: addr.clone(),
            source,
        };

        let mut last_err = None;
        let mut stream = None;
        for sock_addr in (host, port).to_socket_addrs().map_err(connect_err)? {
            match TcpStream::connect_timeout(&sock_addr, config.connect_timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let stream = match stream {
            Some(s) => s,
            None => {
                return Err(connect_err(last_err.unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::AddrNotAvailable, "no address resolved")
                })))
            }
        };

        stream.set_read_timeout(config.io_timeout)?;
        stream.set_write_timeout(config.io_timeout)?;
        stream.set_nodelay(true)?;
        debug!(addr = %addr, "connected");

        Ok(Self {
            host: host.to_string(),
            port,
            stream,
            parser: RespParser::new(config.recv_buffer_size),
            recv_buf: vec![0; config.recv_buffer_size.max(1)],
            last_raw_message: BytesMut::new(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Everything received during the latest exchange.
    pub fn last_raw_message(&self) -> &[u8] {
        &self.last_raw_message
    }

    /// Write pre-packed chunks and wait for exactly one reply.
    ///
    /// An error reply from the server comes back as [`TribError::Reply`].
    pub fn talk_raw(&mut self, chunks: &[Bytes]) -> Result<RespValue> {
        self.send(chunks)?;
        match self.recv()? {
            RespValue::Error(line) => Err(TribError::Reply(ReplyError::parse(&line))),
            reply => Ok(reply),
        }
    }

    /// Pack `command` with `args` and send it.
    pub fn talk(&mut self, command: &str, args: &[Arg]) -> Result<RespValue> {
        self.talk_raw(&pack_command(command, args))
    }

    /// Pipeline several commands and collect one reply per command.
    ///
    /// Error replies are returned in place so one failed command does not
    /// hide the others.
    pub fn talk_bulk(&mut self, commands: &[(&str, Vec<Arg>)]) -> Result<Vec<RespValue>> {
        self.send(&pack_commands(commands))?;
        let mut replies = Vec::with_capacity(commands.len());
        while replies.len() < commands.len() {
            replies.push(self.recv()?);
        }
        Ok(replies)
    }

    pub fn ping(&mut self) -> Result<()> {
        match self.talk_raw(&encoder::cmd_ping())? {
            RespValue::SimpleString(s) if s == "PONG" => Ok(()),
            other => Err(TribError::UnexpectedReply(format!(
                "PING answered with {}",
                other.type_name()
            ))),
        }
    }

    pub fn info(&mut self) -> Result<String> {
        self.talk_raw(&encoder::cmd_info())?.into_text()
    }

    pub fn cluster_nodes(&mut self) -> Result<ClusterNodes> {
        let text = self.talk_raw(&encoder::cmd_cluster_nodes())?.into_text()?;
        Ok(ClusterNodes::parse(&text)?)
    }

    pub fn cluster_info(&mut self) -> Result<ClusterInfo> {
        let text = self.talk_raw(&encoder::cmd_cluster_info())?.into_text()?;
        Ok(ClusterInfo::parse(&text)?)
    }

    /// Shut the connection down. The talker cannot be used afterwards.
    pub fn close(self) -> Result<()> {
        debug!(host = %self.host, port = self.port, "closing");
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(TribError::from),
        }
    }

    fn send(&mut self, chunks: &[Bytes]) -> Result<()> {
        self.last_raw_message.clear();
        let mut sent = 0;
        for chunk in chunks {
            self.stream.write_all(chunk)?;
            sent += chunk.len();
        }
        self.stream.flush()?;
        debug!(host = %self.host, port = self.port, bytes = sent, "sent request");
        Ok(())
    }

    fn recv(&mut self) -> Result<RespValue> {
        loop {
            match self.recv_step()? {
                RecvOutcome::Partial => continue,
                RecvOutcome::Complete(reply) => return Ok(reply),
                RecvOutcome::Eof => {
                    debug!(
                        host = %self.host,
                        port = self.port,
                        pending = self.parser.pending(),
                        "connection closed before a reply"
                    );
                    return Err(TribError::NoReply);
                }
            }
        }
    }

    /// Hand out an already buffered reply, or read once from the socket.
    pub fn recv_step(&mut self) -> Result<RecvOutcome> {
        if let Some(reply) = self.parser.parse()? {
            return Ok(RecvOutcome::Complete(reply));
        }

        let n = match self.stream.read(&mut self.recv_buf) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(RecvOutcome::Partial),
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            return Ok(RecvOutcome::Eof);
        }

        let data = &self.recv_buf[..n];
        self.last_raw_message.extend_from_slice(data);
        self.parser.feed(data);

        Ok(match self.parser.parse()? {
            Some(reply) => RecvOutcome::Complete(reply),
            None => RecvOutcome::Partial,
        })
    }
}
