//! Blocking byte transport used by [`Connection`](crate::connection::Connection).
//!
//! The protocol core never opens sockets itself: it reads into and writes
//! from whatever implements [`Transport`]. Any `Read + Write` stream works,
//! so a `TcpStream` from [`open_socket`] or an in-memory script in tests can
//! be handed to a connection unchanged.

use std::{
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
};

use tracing::debug;

use crate::error::AmqpError;

/// Byte stream carrying AMQP frames.
pub trait Transport {
    /// Read available bytes into `buf`, blocking until at least one byte
    /// arrives. Returning `Ok(0)` signals an orderly close.
    ///
    /// # Errors
    ///
    /// Returns the transport's I/O error.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write every slice in `parts`, in order, in full.
    ///
    /// # Errors
    ///
    /// Returns the transport's I/O error.
    fn send(&mut self, parts: &[&[u8]]) -> io::Result<()>;
}

impl<S> Transport for S
where
    S: Read + Write,
{
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.read(buf) {
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                result => return result,
            }
        }
    }

    fn send(&mut self, parts: &[&[u8]]) -> io::Result<()> {
        for part in parts {
            self.write_all(part)?;
        }
        self.flush()
    }
}

/// Connect to `host:port` with `TCP_NODELAY` enabled.
///
/// Every resolved address is tried in turn; the last connection error is
/// returned if none accepts.
///
/// # Errors
///
/// Returns [`AmqpError::HostResolution`] if `host` resolves to no address and
/// [`AmqpError::Transport`] if resolution or every connection attempt fails.
pub fn open_socket(host: &str, port: u16) -> Result<TcpStream, AmqpError> {
    let addrs: Vec<_> = (host, port)
        .to_socket_addrs()
        .map_err(|_| AmqpError::HostResolution(host.to_owned()))?
        .collect();
    if addrs.is_empty() {
        return Err(AmqpError::HostResolution(host.to_owned()));
    }

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                debug!(%addr, "connected");
                return Ok(stream);
            }
            Err(error) => last_error = Some(error),
        }
    }
    Err(last_error.map_or(AmqpError::HostResolution(host.to_owned()), AmqpError::from))
}
