/*!
 * Byte-stream transports for the SDN bus.
 *
 * A [`Transport`] owns one endpoint (TCP socket, RFC 2217 remote serial
 * port, pseudo-terminal or local serial device), buffers partial reads and
 * runs the [frame scanner](crate::scanner) over them. It can be used
 * directly for request/response work, or split into a [`FrameReader`] and
 * [`FrameWriter`] so reading and writing run in separate tasks.
 */
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn, Instrument};
use url::Url;

use sdn_core::logging::operation_span;
use sdn_core::utils::with_timeout;

use crate::codec::hex;
use crate::error::{DeviceError, Result};
use crate::message::{Body, Message};
use crate::scanner::{scan, Scan};

pub mod telnet;

/// How long to wait for the rest of a partially received frame
pub const WAIT_TIME: Duration = Duration::from_millis(250);
/// How long `transact` collects responses
pub const TRANSACT_TIMEOUT: Duration = Duration::from_secs(1);
/// Consecutive end-of-stream reads after which the link is considered dead
pub const MAX_EOFS: u32 = 5;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TELNET_PORT: u16 = 23;
const READ_CHUNK: usize = 1024;

/// Where the bus is reached, parsed from a connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Raw TCP socket, `tcp://host:port`
    Tcp {
        /// Host name or IP
        host: String,
        /// Port
        port: u16,
    },
    /// RFC 2217 remote serial port, `telnet://host[:port]` or `rfc2217://host[:port]`
    Telnet {
        /// Host name or IP
        host: String,
        /// Port, 23 unless given
        port: u16,
    },
    /// A new pseudo-terminal pair, `/dev/ptmx`
    Pty,
    /// A local serial device path
    Serial(String),
}

impl FromStr for Endpoint {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "/dev/ptmx" {
            return Ok(Endpoint::Pty);
        }
        let url = match Url::parse(s) {
            Ok(url) => url,
            Err(_) => return Ok(Endpoint::Serial(s.to_string())),
        };
        let host = || {
            url.host_str()
                .map(str::to_string)
                .ok_or_else(|| DeviceError::format(format!("{} has no host", s)))
        };
        match url.scheme() {
            "tcp" => Ok(Endpoint::Tcp {
                host: host()?,
                port: url
                    .port()
                    .ok_or_else(|| DeviceError::format(format!("{} has no port", s)))?,
            }),
            "telnet" | "rfc2217" => Ok(Endpoint::Telnet {
                host: host()?,
                port: url.port().unwrap_or(TELNET_PORT),
            }),
            "file" => Ok(Endpoint::Serial(url.path().to_string())),
            other => Err(DeviceError::format(format!("unsupported port scheme {:?}", other))),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            Endpoint::Telnet { host, port } => write!(f, "telnet://{}:{}", host, port),
            Endpoint::Pty => f.write_str("/dev/ptmx"),
            Endpoint::Serial(path) => f.write_str(path),
        }
    }
}

type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Anything that accepts outbound messages
#[async_trait]
pub trait MessageSink: Send {
    /// Write one message to the bus
    async fn send(&mut self, message: &Message) -> Result<()>;
}

/// Anything that yields inbound messages
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next decoded message. Recoverable errors (see
    /// [`DeviceError::is_recoverable`]) leave the source usable.
    async fn recv(&mut self) -> Result<Message>;
}

/// Inbound half: buffers reads and decodes frames
pub struct FrameReader {
    stream: BoxedRead,
    buffer: BytesMut,
    telnet: Option<telnet::Decoder>,
    eofs: u32,
    trace: bool,
    // Keeps a pseudo-terminal's slave side open for the bridge's lifetime
    _hold: Option<Box<dyn std::any::Any + Send>>,
}

impl fmt::Debug for FrameReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameReader")
            .field("buffered", &self.buffer.len())
            .field("telnet", &self.telnet.is_some())
            .field("eofs", &self.eofs)
            .finish()
    }
}

enum Fill {
    Data,
    TimedOut,
}

impl FrameReader {
    fn new(stream: BoxedRead, use_telnet: bool, trace: bool) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            telnet: use_telnet.then(telnet::Decoder::new),
            eofs: 0,
            trace,
            _hold: None,
        }
    }

    /// Bytes received but not yet decoded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Take the next frame from the buffer, if one is complete. Malformed
    /// frames are dropped from the buffer and returned as errors.
    fn take_frame(&mut self) -> Option<Result<Message>> {
        match scan(&self.buffer) {
            Scan::Frame { message, consumed } => {
                if self.trace {
                    trace!("Frame {}", hex(&self.buffer[..consumed]));
                }
                self.buffer.advance(consumed);
                debug!("Received {}", message);
                Some(Ok(message))
            }
            Scan::Malformed { error, skip } => {
                self.buffer.advance(skip);
                Some(Err(error))
            }
            Scan::Incomplete => None,
        }
    }

    /// Read more bytes, waiting at most `wait` (forever when `None`).
    /// On timeout the undecodable buffer is discarded.
    async fn fill(&mut self, wait: Option<Duration>) -> Result<Fill> {
        let mut chunk = [0u8; READ_CHUNK];
        let read = self.stream.read(&mut chunk);
        let n = match wait {
            Some(wait) => match tokio::time::timeout(wait, read).await {
                Ok(n) => n?,
                Err(_) => {
                    if !self.buffer.is_empty() {
                        debug!("Discarding {} due to timeout", hex(&self.buffer));
                        self.buffer.clear();
                    }
                    return Ok(Fill::TimedOut);
                }
            },
            None => read.await?,
        };

        if n == 0 {
            self.eofs += 1;
            if self.eofs >= MAX_EOFS {
                return Err(DeviceError::Closed);
            }
            return Ok(Fill::Data);
        }
        self.eofs = 0;

        if self.trace {
            trace!("Read {}", hex(&chunk[..n]));
        }
        match self.telnet.as_mut() {
            Some(decoder) => decoder.decode(&chunk[..n], &mut self.buffer),
            None => self.buffer.extend_from_slice(&chunk[..n]),
        }
        Ok(Fill::Data)
    }

    fn wait_for(&self, timeout: Option<Duration>) -> Option<Duration> {
        if self.buffer.is_empty() {
            timeout
        } else {
            Some(WAIT_TIME)
        }
    }

    /// Wait for one message.
    ///
    /// Returns `Ok(None)` when `timeout` is given and passes with the buffer
    /// empty; with no timeout it waits indefinitely. A malformed frame is
    /// returned as an error after skipping one byte.
    pub async fn next_message(&mut self, timeout: Option<Duration>) -> Result<Option<Message>> {
        loop {
            if let Some(frame) = self.take_frame() {
                return frame.map(Some);
            }
            if let Fill::TimedOut = self.fill(self.wait_for(timeout)).await? {
                if timeout.is_some() {
                    return Ok(None);
                }
            }
        }
    }

    /// Collect messages until the buffer runs dry after at least one arrived,
    /// or until `timeout` passes. Malformed frames are logged and skipped.
    pub async fn receive(&mut self, timeout: Option<Duration>) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        loop {
            match self.take_frame() {
                Some(Ok(message)) => {
                    messages.push(message);
                    continue;
                }
                Some(Err(e)) => {
                    warn!("Skipping malformed frame: {}", e);
                    continue;
                }
                None if !messages.is_empty() => return Ok(messages),
                None => {}
            }
            if let Fill::TimedOut = self.fill(self.wait_for(timeout)).await? {
                if timeout.is_some() {
                    return Ok(messages);
                }
            }
        }
    }

    /// Hand every message to `on_message` until `timeout` passes with no
    /// data; runs until the link fails when no timeout is given
    pub async fn receive_each<F>(&mut self, timeout: Option<Duration>, mut on_message: F) -> Result<()>
    where
        F: FnMut(Message) + Send,
    {
        loop {
            match self.take_frame() {
                Some(Ok(message)) => {
                    on_message(message);
                    continue;
                }
                Some(Err(e)) => {
                    warn!("Skipping malformed frame: {}", e);
                    continue;
                }
                None => {}
            }
            if let Fill::TimedOut = self.fill(self.wait_for(timeout)).await? {
                if timeout.is_some() {
                    return Ok(());
                }
            }
        }
    }
}

#[async_trait]
impl MessageSource for FrameReader {
    async fn recv(&mut self) -> Result<Message> {
        loop {
            if let Some(message) = self.next_message(None).await? {
                return Ok(message);
            }
        }
    }
}

/// Outbound half: encodes and writes frames
pub struct FrameWriter {
    stream: BoxedWrite,
    telnet: bool,
    trace: bool,
}

impl fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameWriter")
            .field("telnet", &self.telnet)
            .finish()
    }
}

impl FrameWriter {
    async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Encode and write one message
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        debug!("Sending {}", message);
        let frame = message.encode()?;
        if self.trace {
            trace!("Write {}", hex(&frame));
        }
        if self.telnet {
            self.write_raw(&telnet::escape(&frame)).await
        } else {
            self.write_raw(&frame).await
        }
    }
}

#[async_trait]
impl MessageSink for FrameWriter {
    async fn send(&mut self, message: &Message) -> Result<()> {
        FrameWriter::send(self, message).await
    }
}

/// A connected bus endpoint
#[derive(Debug)]
pub struct Transport {
    reader: FrameReader,
    writer: FrameWriter,
}

impl Transport {
    /// Connect to the endpoint named by `port`
    pub async fn connect(port: &str, trace: bool) -> Result<Self> {
        let endpoint: Endpoint = port.parse()?;
        info!("Connecting to {}", endpoint);
        match endpoint {
            Endpoint::Tcp { host, port } => {
                let stream = connect_tcp(&host, port).await?;
                Ok(Self::from_parts(stream, false, trace))
            }
            Endpoint::Telnet { host, port } => {
                let stream = connect_tcp(&host, port).await?;
                let mut transport = Self::from_parts(stream, true, trace);
                transport.writer.write_raw(&telnet::negotiation()).await?;
                Ok(transport)
            }
            Endpoint::Pty => open_pty(trace),
            Endpoint::Serial(path) => open_serial(&path, trace),
        }
    }

    /// Wrap an already connected byte stream
    pub fn from_stream<S>(stream: S, trace: bool) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::from_parts(stream, false, trace)
    }

    fn from_parts<S>(stream: S, use_telnet: bool, trace: bool) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: FrameReader::new(Box::new(read), use_telnet, trace),
            writer: FrameWriter {
                stream: Box::new(write),
                telnet: use_telnet,
                trace,
            },
        }
    }

    /// Separate the halves so they can be driven by different tasks
    pub fn split(self) -> (FrameReader, FrameWriter) {
        (self.reader, self.writer)
    }

    /// Write one message
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        self.writer.send(message).await
    }

    /// See [`FrameReader::next_message`]
    pub async fn next_message(&mut self, timeout: Option<Duration>) -> Result<Option<Message>> {
        self.reader.next_message(timeout).await
    }

    /// See [`FrameReader::receive`]
    pub async fn receive(&mut self, timeout: Option<Duration>) -> Result<Vec<Message>> {
        self.reader.receive(timeout).await
    }

    /// See [`FrameReader::receive_each`]
    pub async fn receive_each<F>(&mut self, timeout: Option<Duration>, on_message: F) -> Result<()>
    where
        F: FnMut(Message) + Send,
    {
        self.reader.receive_each(timeout, on_message).await
    }

    /// Send `message` with the ack flag set and collect whatever arrives
    /// within a second
    pub async fn transact(&mut self, message: &Message) -> Result<Vec<Message>> {
        let message = message.clone().with_ack();
        self.send(&message).await?;
        self.receive(Some(TRANSACT_TIMEOUT)).await
    }

    /// Repeat `transact` until the expected response arrives. A Nack ends
    /// the exchange with [`DeviceError::Nack`].
    pub async fn ensure(&mut self, message: &Message) -> Result<Message> {
        let span = operation_span("ensure", &message.kind().to_string());
        async {
            loop {
                for response in self.transact(message).await? {
                    if let Body::Nack(nack) = &response.body {
                        return Err(DeviceError::Nack(nack.error_code));
                    }
                    if message.expects(&response) {
                        return Ok(response);
                    }
                    debug!("Ignoring {} while waiting for a response to {}", response, message.kind());
                }
            }
        }
        .instrument(span)
        .await
    }
}

async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream> {
    let stream = with_timeout(CONNECT_TIMEOUT, "connect", TcpStream::connect((host, port))).await??;
    if let Err(e) = stream.set_nodelay(true) {
        debug!("TCP_NODELAY: {}", e);
    }
    info!("Connected to {}:{}", host, port);
    Ok(stream)
}

#[cfg(all(unix, feature = "serial"))]
fn open_pty(trace: bool) -> Result<Transport> {
    use tokio_serial::{SerialPort, SerialStream};

    let (master, slave) = SerialStream::pair().map_err(|e| DeviceError::Io(e.into()))?;
    let path = slave.name().unwrap_or_else(|| "<unknown>".to_string());
    info!("Slave PTY available at {}", path);
    let mut transport = Transport::from_parts(master, false, trace);
    transport.reader._hold = Some(Box::new(slave));
    Ok(transport)
}

#[cfg(not(all(unix, feature = "serial")))]
fn open_pty(_trace: bool) -> Result<Transport> {
    Err(DeviceError::Unsupported(
        "pseudo-terminals need the serial feature on unix".to_string(),
    ))
}

#[cfg(feature = "serial")]
fn open_serial(path: &str, trace: bool) -> Result<Transport> {
    use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};

    let port = tokio_serial::new(path, telnet::BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::Odd)
        .stop_bits(StopBits::One)
        .open_native_async()
        .map_err(|e| DeviceError::Io(e.into()))?;
    info!("Opened serial port {}", path);
    Ok(Transport::from_parts(port, false, trace))
}

#[cfg(not(feature = "serial"))]
fn open_serial(path: &str, _trace: bool) -> Result<Transport> {
    Err(DeviceError::Unsupported(format!(
        "serial port {} needs the serial feature",
        path
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::message::{
        Ack, GetMotorPosition, Kind, Nack, NackCode, NackReason, PostMotorPosition, Wink,
    };
    use tokio::io::{duplex, DuplexStream};

    const MOTOR: Address = Address::new([0x0a, 0x0b, 0x0c]);

    fn report(pulses: u16) -> Message {
        Message::from_parts(
            crate::message::NodeType::St30,
            false,
            MOTOR,
            Address::BRIDGE,
            PostMotorPosition {
                position_pulses: Some(pulses),
                position_percent: Some(10),
                ip: None,
            },
        )
    }

    fn pair() -> (Transport, DuplexStream) {
        let (ours, theirs) = duplex(1024);
        (Transport::from_stream(ours, true), theirs)
    }

    #[test]
    fn test_endpoint_parsing() -> Result<()> {
        assert_eq!(
            "tcp://10.0.0.5:4001".parse::<Endpoint>()?,
            Endpoint::Tcp {
                host: "10.0.0.5".to_string(),
                port: 4001
            }
        );
        assert_eq!(
            "rfc2217://bridge.local".parse::<Endpoint>()?,
            Endpoint::Telnet {
                host: "bridge.local".to_string(),
                port: 23
            }
        );
        assert_eq!(
            "telnet://bridge.local:2217".parse::<Endpoint>()?,
            Endpoint::Telnet {
                host: "bridge.local".to_string(),
                port: 2217
            }
        );
        assert_eq!("/dev/ptmx".parse::<Endpoint>()?, Endpoint::Pty);
        assert_eq!(
            "/dev/ttyUSB0".parse::<Endpoint>()?,
            Endpoint::Serial("/dev/ttyUSB0".to_string())
        );
        assert!("tcp://host".parse::<Endpoint>().is_err());
        assert!("http://host:80".parse::<Endpoint>().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() -> Result<()> {
        let frame = report(500).encode()?;
        let stream = tokio_test::io::Builder::new()
            .read(&frame[..4])
            .read(&frame[4..])
            .build();
        let mut transport = Transport::from_stream(stream, false);
        let message = transport.next_message(Some(Duration::from_secs(1))).await?;
        assert_eq!(message, Some(report(500)));
        Ok(())
    }

    #[tokio::test]
    async fn test_receive_collects_a_burst() -> Result<()> {
        let (mut transport, mut device) = pair();
        let mut burst = report(1).encode()?;
        burst.extend([0x00, 0x01]);
        burst.extend(report(2).encode()?);
        device.write_all(&burst).await?;

        let messages = transport.receive(Some(Duration::from_secs(1))).await?;
        assert_eq!(messages, vec![report(1), report(2)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_frame_is_an_error_then_skipped() -> Result<()> {
        let (mut transport, mut device) = pair();
        let mut bad = Message::new(MOTOR, GetMotorPosition).encode()?;
        bad.truncate(9);
        bad[1] = crate::codec::invert(12);
        bad.push(0xff);
        let sum = crate::codec::checksum(&bad);
        bad.extend_from_slice(&sum);
        bad.extend(report(3).encode()?);
        device.write_all(&bad).await?;

        let timeout = Some(Duration::from_secs(1));
        assert!(matches!(
            transport.next_message(timeout).await,
            Err(DeviceError::Malformed(_))
        ));
        assert_eq!(transport.next_message(timeout).await?, Some(report(3)));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_discards_partial_frame() -> Result<()> {
        let (mut transport, mut device) = pair();
        let frame = report(4).encode()?;
        device.write_all(&frame[..6]).await?;

        let messages = transport.receive(Some(Duration::from_millis(100))).await?;
        assert!(messages.is_empty());
        assert_eq!(transport.reader.buffered(), 0);

        device.write_all(&frame).await?;
        assert_eq!(transport.next_message(Some(Duration::from_secs(1))).await?, Some(report(4)));
        Ok(())
    }

    #[tokio::test]
    async fn test_repeated_eof_closes() {
        let (mut transport, device) = pair();
        drop(device);
        assert!(matches!(transport.receive(None).await, Err(DeviceError::Closed)));
    }

    #[tokio::test]
    async fn test_transact_requests_ack() -> Result<()> {
        let (mut transport, mut device) = pair();
        let responder = tokio::spawn(async move {
            let mut frame = [0u8; 11];
            device.read_exact(&mut frame).await?;
            let ack = Message::from_parts(Default::default(), false, MOTOR, Address::BRIDGE, Ack);
            device.write_all(&ack.encode()?).await?;
            Ok::<_, DeviceError>(frame)
        });

        let responses = transport.transact(&Message::new(MOTOR, Wink)).await?;
        let frame = responder.await.map_err(|e| DeviceError::Io(e.into()))??;
        assert_eq!(crate::codec::invert(frame[1]), 0x80 | 11);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind(), Kind::Ack);
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_surfaces_nack() -> Result<()> {
        let (mut transport, mut device) = pair();
        let nack = Message::from_parts(
            Default::default(),
            false,
            MOTOR,
            Address::BRIDGE,
            Nack {
                error_code: NackCode::Known(NackReason::NodeIsLocked),
            },
        );
        device.write_all(&nack.encode()?).await?;

        match transport.ensure(&Message::new(MOTOR, Wink)).await {
            Err(DeviceError::Nack(NackCode::Known(NackReason::NodeIsLocked))) => Ok(()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_telnet_writer_escapes_iac() -> Result<()> {
        let (ours, mut theirs) = duplex(1024);
        let (_, mut writer) = Transport::from_parts(ours, true, false).split();
        // Pulses 0x00ff leave an all-ones byte in the frame
        let message = report(0x00ff);
        let frame = message.encode()?;
        assert!(frame.contains(&0xff));
        MessageSink::send(&mut writer, &message).await?;
        drop(writer);

        let mut written = Vec::new();
        theirs.read_to_end(&mut written).await?;
        assert_eq!(written, telnet::escape(&frame));
        Ok(())
    }
}
