//! Device link: TCP server for one device at a time; packets out, acks and requests in.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use verse_core::{
    encode_frame, Frame, FrameBuffer, FrameDecodeError, Packet, SendOutcome, PROTOCOL_VERSION,
};

use crate::runtime::Event;

/// Sends one packet to the device and reports how it went. Exactly one outcome per call.
#[async_trait]
pub trait DeviceChannel: Send + Sync + 'static {
    async fn send(&self, packet: Packet) -> SendOutcome;
}

type AckResult = Result<(), String>;

struct Link {
    connection: u64,
    writer: Option<OwnedWriteHalf>,
}

pub struct TcpDevice {
    link: Mutex<Link>,
    waiters: Mutex<HashMap<u32, oneshot::Sender<AckResult>>>,
    next_transaction_id: AtomicU32,
    ack_timeout: Duration,
}

impl TcpDevice {
    pub fn new(ack_timeout: Duration) -> Self {
        Self {
            link: Mutex::new(Link {
                connection: 0,
                writer: None,
            }),
            waiters: Mutex::new(HashMap::new()),
            next_transaction_id: AtomicU32::new(1),
            ack_timeout,
        }
    }

    /// Install a new connection's writer, replacing the old one. Outstanding sends fail.
    async fn attach(&self, writer: OwnedWriteHalf) -> u64 {
        let mut link = self.link.lock().await;
        link.connection += 1;
        link.writer = Some(writer);
        self.waiters.lock().await.clear();
        link.connection
    }

    /// Drop the writer if `connection` is still the current one.
    async fn detach(&self, connection: u64) {
        let mut link = self.link.lock().await;
        if link.connection == connection {
            link.writer = None;
            self.waiters.lock().await.clear();
        }
    }

    async fn resolve(&self, transaction_id: u32, result: AckResult) {
        match self.waiters.lock().await.remove(&transaction_id) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => tracing::debug!(transaction_id, "ack for unknown transaction"),
        }
    }
}

#[async_trait]
impl DeviceChannel for TcpDevice {
    async fn send(&self, packet: Packet) -> SendOutcome {
        let transaction_id = self.next_transaction_id.fetch_add(1, Ordering::Relaxed);
        let failure = |error: &str| SendOutcome::Failure {
            transaction_id,
            error: error.to_string(),
        };
        let frame = match encode_frame(&Frame::Packet {
            transaction_id,
            packet,
        }) {
            Ok(f) => f,
            Err(e) => return failure(&e.to_string()),
        };
        let (tx, rx) = oneshot::channel();
        {
            let mut link = self.link.lock().await;
            let Some(writer) = link.writer.as_mut() else {
                return failure("no device connected");
            };
            self.waiters.lock().await.insert(transaction_id, tx);
            let error = match tokio::time::timeout(self.ack_timeout, writer.write_all(&frame)).await
            {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some("write timeout".to_string()),
            };
            if let Some(error) = error {
                self.waiters.lock().await.remove(&transaction_id);
                link.writer = None;
                return failure(&error);
            }
        }
        let result = tokio::time::timeout(self.ack_timeout, rx).await;
        self.waiters.lock().await.remove(&transaction_id);
        match result {
            Ok(Ok(Ok(()))) => SendOutcome::Success { transaction_id },
            Ok(Ok(Err(reason))) => failure(&reason),
            Ok(Err(_)) => failure("device disconnected"),
            Err(_) => failure("ack timeout"),
        }
    }
}

/// Accept device connections forever. Each accepted device gets the startup signal via `DeviceConnected`.
pub async fn run_listener(
    listener: TcpListener,
    device: Arc<TcpDevice>,
    events: mpsc::UnboundedSender<Event>,
) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        tokio::spawn(serve_connection(stream, addr, device.clone(), events.clone()));
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    device: Arc<TcpDevice>,
    events: mpsc::UnboundedSender<Event>,
) {
    match tokio::time::timeout(device.ack_timeout, handshake_accept(&mut stream)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(%addr, error = %e, "device handshake failed");
            return;
        }
        Err(_) => {
            tracing::warn!(%addr, "device handshake timed out");
            return;
        }
    }
    tracing::info!(%addr, "device connected");
    let (reader, writer) = stream.into_split();
    let connection = device.attach(writer).await;
    let _ = events.send(Event::DeviceConnected);
    if let Err(e) = read_frames(reader, &device, &events).await {
        tracing::debug!(%addr, error = %e, "device read loop ended");
    }
    device.detach(connection).await;
    tracing::info!(%addr, "device disconnected");
}

/// Device sends its protocol version byte; we answer with ours.
async fn handshake_accept(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut version = [0u8; 1];
    stream.read_exact(&mut version).await?;
    if version[0] != PROTOCOL_VERSION {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "unsupported protocol version",
        ));
    }
    stream.write_all(&[PROTOCOL_VERSION]).await?;
    stream.flush().await
}

async fn read_frames(
    mut reader: OwnedReadHalf,
    device: &TcpDevice,
    events: &mpsc::UnboundedSender<Event>,
) -> std::io::Result<()> {
    let mut frames = FrameBuffer::new();
    let mut chunk = [0u8; 512];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        frames.extend(&chunk[..n]);
        loop {
            let frame = match frames.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(FrameDecodeError::Decode(e)) => {
                    tracing::warn!(error = %e, "dropping undecodable frame");
                    continue;
                }
                Err(e) => {
                    return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e));
                }
            };
            match frame {
                Frame::Request { token, request } => {
                    if events.send(Event::Request { token, request }).is_err() {
                        return Ok(());
                    }
                }
                Frame::Ack { transaction_id } => device.resolve(transaction_id, Ok(())).await,
                Frame::Nack {
                    transaction_id,
                    reason,
                } => device.resolve(transaction_id, Err(reason)).await,
                Frame::Packet { transaction_id, .. } => {
                    tracing::warn!(transaction_id, "device sent a packet frame, ignoring");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verse_core::wire::LEN_SIZE;
    use verse_core::{decode_frame, Payload, Request, Token};

    fn packet() -> Packet {
        Packet {
            token: Some(Token(3)),
            index: 0,
            payload: Payload::VerseBatchName {
                range: "1-15".into(),
            },
        }
    }

    async fn read_frame(stream: &mut TcpStream) -> Frame {
        let mut len = [0u8; LEN_SIZE];
        stream.read_exact(&mut len).await.unwrap();
        let mut buf = len.to_vec();
        buf.resize(LEN_SIZE + u32::from_le_bytes(len) as usize, 0);
        stream.read_exact(&mut buf[LEN_SIZE..]).await.unwrap();
        decode_frame(&buf).unwrap().0
    }

    async fn listen(
        ack_timeout: Duration,
    ) -> (
        Arc<TcpDevice>,
        SocketAddr,
        mpsc::UnboundedReceiver<Event>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let device = Arc::new(TcpDevice::new(ack_timeout));
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_listener(listener, device.clone(), tx));
        (device, addr, rx)
    }

    async fn handshake(addr: SocketAddr) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&[PROTOCOL_VERSION]).await.unwrap();
        let mut version = [0u8; 1];
        stream.read_exact(&mut version).await.unwrap();
        assert_eq!(version[0], PROTOCOL_VERSION);
        stream
    }

    async fn connect(
        ack_timeout: Duration,
    ) -> (
        Arc<TcpDevice>,
        TcpStream,
        mpsc::UnboundedReceiver<Event>,
    ) {
        let (device, addr, mut rx) = listen(ack_timeout).await;
        let stream = handshake(addr).await;
        assert!(matches!(rx.recv().await, Some(Event::DeviceConnected)));
        (device, stream, rx)
    }

    #[tokio::test]
    async fn no_device_fails_fast() {
        let device = TcpDevice::new(Duration::from_secs(5));
        let outcome = device.send(packet()).await;
        assert!(matches!(outcome, SendOutcome::Failure { ref error, .. } if error == "no device connected"));
    }

    #[tokio::test]
    async fn ack_resolves_send() {
        let (device, mut stream, _rx) = connect(Duration::from_secs(5)).await;
        let send = tokio::spawn(async move { device.send(packet()).await });
        let transaction_id = match read_frame(&mut stream).await {
            Frame::Packet {
                transaction_id,
                packet: p,
            } => {
                assert_eq!(p, packet());
                transaction_id
            }
            other => panic!("unexpected frame {other:?}"),
        };
        stream
            .write_all(&encode_frame(&Frame::Ack { transaction_id }).unwrap())
            .await
            .unwrap();
        assert_eq!(send.await.unwrap(), SendOutcome::Success { transaction_id });
    }

    #[tokio::test]
    async fn nack_and_timeout_fail_send() {
        let (device, mut stream, _rx) = connect(Duration::from_millis(200)).await;
        let sender = device.clone();
        let send = tokio::spawn(async move { sender.send(packet()).await });
        let Frame::Packet { transaction_id, .. } = read_frame(&mut stream).await else {
            panic!("expected packet frame");
        };
        let nack = Frame::Nack {
            transaction_id,
            reason: "busy".into(),
        };
        stream
            .write_all(&encode_frame(&nack).unwrap())
            .await
            .unwrap();
        assert_eq!(
            send.await.unwrap(),
            SendOutcome::Failure {
                transaction_id,
                error: "busy".into()
            }
        );

        // Never acknowledged.
        let outcome = device.send(packet()).await;
        assert!(matches!(outcome, SendOutcome::Failure { ref error, .. } if error == "ack timeout"));
    }

    #[tokio::test]
    async fn requests_become_events() {
        let (_device, mut stream, mut rx) = connect(Duration::from_secs(5)).await;
        let frame = Frame::Request {
            token: Token(12),
            request: Request::ListBooksForTestament { testament: 1 },
        };
        stream
            .write_all(&encode_frame(&frame).unwrap())
            .await
            .unwrap();
        match rx.recv().await {
            Some(Event::Request { token, request }) => {
                assert_eq!(token, Token(12));
                assert_eq!(request, Request::ListBooksForTestament { testament: 1 });
            }
            _ => panic!("expected request event"),
        }
    }

    #[tokio::test]
    async fn silent_client_does_not_block_new_devices() {
        let (_device, addr, mut rx) = listen(Duration::from_secs(30)).await;
        let _silent = TcpStream::connect(addr).await.unwrap();
        let _stream = tokio::time::timeout(Duration::from_secs(3), handshake(addr))
            .await
            .expect("second device never got a handshake reply");
        assert!(matches!(rx.recv().await, Some(Event::DeviceConnected)));
    }

    #[tokio::test]
    async fn stalled_handshake_is_dropped() {
        let (_device, addr, _rx) = listen(Duration::from_millis(100)).await;
        let mut silent = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(3), silent.read(&mut buf))
            .await
            .expect("connection was never closed")
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn device_that_stops_reading_fails_sends() {
        let (device, _stream, _rx) = connect(Duration::from_millis(500)).await;
        let big = Packet {
            token: Some(Token(1)),
            index: 0,
            payload: Payload::ViewerContent {
                content: "x".repeat(900),
            },
        };
        // Enough unread bytes to fill both socket buffers.
        let sends: Vec<_> = (0..20_000)
            .map(|_| {
                let device = device.clone();
                let packet = big.clone();
                tokio::spawn(async move { device.send(packet).await })
            })
            .collect();
        let mut write_timeouts = 0;
        for send in sends {
            let outcome = tokio::time::timeout(Duration::from_secs(10), send)
                .await
                .expect("send never produced an outcome")
                .unwrap();
            if let SendOutcome::Failure { error, .. } = outcome {
                if error == "write timeout" {
                    write_timeouts += 1;
                }
            }
        }
        assert!(write_timeouts >= 1);
    }
}
