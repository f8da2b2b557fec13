//! Non-blocking WebSocket transport
//!
//! The TCP connect is bounded by a short timeout. Everything after it (the
//! WebSocket handshake, reads, and the flush of the one-deep send queue)
//! happens incrementally inside `poll_event`. `WouldBlock` is silence, not
//! an error.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::mem;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tungstenite::handshake::client::ClientHandshake;
use tungstenite::handshake::{HandshakeError, MidHandshake};
use tungstenite::protocol::{Message, WebSocket, WebSocketConfig};

use robolink_core::errors::TransportError;
use robolink_core::transport::{Transport, TransportEvent};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// How many inbound frames one `poll_event` pump will read before yielding
/// back to the main loop.
const MAX_FRAMES_PER_PUMP: usize = 8;

// ----------------------------------------------------------------------------
// Connection Phases
// ----------------------------------------------------------------------------

enum Conn {
    Idle,
    Handshaking(Box<MidHandshake<ClientHandshake<TcpStream>>>),
    Open(Box<WebSocket<TcpStream>>),
}

// ----------------------------------------------------------------------------
// WebSocket Transport
// ----------------------------------------------------------------------------

/// A single client WebSocket connection, driven cooperatively.
pub struct WsTransport {
    conn: Conn,
    pending: VecDeque<TransportEvent>,
    connect_timeout: Duration,
}

impl WsTransport {
    pub fn new() -> Self {
        Self {
            conn: Conn::Idle,
            pending: VecDeque::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Bound the blocking portion of `open` (TCP connect only)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// The `ws://` endpoint for a host/port pair
    fn endpoint(host: &str, port: u16) -> Result<url::Url, TransportError> {
        url::Url::parse(&format!("ws://{host}:{port}/")).map_err(|e| TransportError::OpenFailed {
            host: host.to_string(),
            port,
            reason: e.to_string(),
        })
    }

    fn open_failed(host: &str, port: u16, reason: impl ToString) -> TransportError {
        TransportError::OpenFailed {
            host: host.to_string(),
            port,
            reason: reason.to_string(),
        }
    }

    /// Queue `Error` + `Closed` and drop the connection
    fn fail(&mut self, reason: String) {
        log::warn!("websocket failure: {reason}");
        self.pending.push_back(TransportEvent::Error(reason));
        self.pending.push_back(TransportEvent::Closed);
        self.conn = Conn::Idle;
    }

    /// Advance an in-flight handshake by one step
    fn drive_handshake(&mut self, mid: MidHandshake<ClientHandshake<TcpStream>>) {
        match mid.handshake() {
            Ok((socket, _response)) => {
                log::debug!("websocket handshake complete");
                self.conn = Conn::Open(Box::new(socket));
                self.pending.push_back(TransportEvent::Opened);
            }
            Err(HandshakeError::Interrupted(mid)) => {
                self.conn = Conn::Handshaking(Box::new(mid));
            }
            Err(HandshakeError::Failure(e)) => {
                self.fail(format!("handshake failed: {e}"));
            }
        }
    }

    /// Flush the send queue and read up to a bounded number of frames
    fn pump_open(&mut self, mut socket: Box<WebSocket<TcpStream>>) {
        // Flush whatever the last send left queued.
        match socket.write_pending() {
            Ok(()) => {}
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => {}
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                self.pending.push_back(TransportEvent::Closed);
                return;
            }
            Err(e) => {
                self.fail(format!("flush failed: {e}"));
                return;
            }
        }

        for _ in 0..MAX_FRAMES_PER_PUMP {
            match socket.read_message() {
                Ok(Message::Text(text)) => {
                    self.pending.push_back(TransportEvent::Text(text.into_bytes()));
                }
                Ok(Message::Close(_)) => {
                    // Queue our close reply on a best-effort basis, then drop.
                    let _ = socket.close(None);
                    let _ = socket.write_pending();
                    self.pending.push_back(TransportEvent::Closed);
                    return;
                }
                // Pings are answered by the protocol layer; binary frames are
                // not part of this protocol.
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => break,
                Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => {
                    self.pending.push_back(TransportEvent::Closed);
                    return;
                }
                Err(e) => {
                    self.fail(format!("read failed: {e}"));
                    return;
                }
            }
        }
        self.conn = Conn::Open(socket);
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WsTransport {
    fn open(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        // One socket at a time: a dangling previous connection is torn down.
        self.close();

        let endpoint = Self::endpoint(host, port)?;
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| Self::open_failed(host, port, e))?
            .next()
            .ok_or_else(|| Self::open_failed(host, port, "no address resolved"))?;

        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| Self::open_failed(host, port, e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Self::open_failed(host, port, e))?;
        stream
            .set_nonblocking(true)
            .map_err(|e| Self::open_failed(host, port, e))?;

        // One frame in flight at a time; a second send while the first is
        // still unflushed is reported as busy and dropped by the caller.
        let mut config = WebSocketConfig::default();
        config.max_send_queue = Some(1);

        match tungstenite::client::client_with_config(endpoint.as_str(), stream, Some(config)) {
            Ok((socket, _response)) => {
                self.conn = Conn::Open(Box::new(socket));
                self.pending.push_back(TransportEvent::Opened);
                Ok(())
            }
            Err(HandshakeError::Interrupted(mid)) => {
                self.conn = Conn::Handshaking(Box::new(mid));
                Ok(())
            }
            Err(HandshakeError::Failure(e)) => Err(Self::open_failed(host, port, e)),
        }
    }

    fn close(&mut self) {
        if let Conn::Open(mut socket) = mem::replace(&mut self.conn, Conn::Idle) {
            let _ = socket.close(None);
            let _ = socket.write_pending();
        }
        self.pending.clear();
    }

    fn send_text(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let socket = match &mut self.conn {
            Conn::Open(socket) => socket,
            _ => return Err(TransportError::NotOpen),
        };
        let text = std::str::from_utf8(frame)
            .map_err(|_| TransportError::SendFailed {
                reason: "frame is not valid UTF-8".to_string(),
            })?
            .to_string();

        match socket.write_message(Message::Text(text)) {
            Ok(()) => Ok(()),
            // Queued but not yet flushed; the poll pump finishes the write.
            Err(tungstenite::Error::Io(ref e)) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(tungstenite::Error::SendQueueFull(_)) => Err(TransportError::Busy),
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Err(TransportError::NotOpen)
            }
            Err(e) => Err(TransportError::SendFailed {
                reason: e.to_string(),
            }),
        }
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        match mem::replace(&mut self.conn, Conn::Idle) {
            Conn::Idle => {}
            Conn::Handshaking(mid) => self.drive_handshake(*mid),
            Conn::Open(socket) => self.pump_open(socket),
        }
        self.pending.pop_front()
    }

    fn is_open(&self) -> bool {
        matches!(self.conn, Conn::Open(_))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_formats_ws_urls() {
        let url = WsTransport::endpoint("192.168.4.20", 8080).unwrap();
        assert_eq!(url.as_str(), "ws://192.168.4.20:8080/");
        assert!(WsTransport::endpoint("bad host", 8080).is_err());
    }

    #[test]
    fn starts_idle() {
        let mut transport = WsTransport::new();
        assert!(!transport.is_open());
        assert_eq!(transport.poll_event(), None);
        assert!(matches!(
            transport.send_text(b"{}"),
            Err(TransportError::NotOpen)
        ));
    }

    #[test]
    fn open_fails_fast_on_unroutable_port() {
        let mut transport =
            WsTransport::new().with_connect_timeout(Duration::from_millis(100));
        // A port nothing listens on: connect is refused or times out.
        let result = transport.open("127.0.0.1", 1);
        assert!(matches!(result, Err(TransportError::OpenFailed { .. })));
        assert!(!transport.is_open());
    }
}
