use crate::adapters::protocol::constants::MAX_FRAME_SIZE;
use crate::adapters::protocol::dto::{KafkaRequest, KafkaResponse};
use crate::adapters::protocol::KafkaProtocolCodec;
use crate::application::error::TransportError;
use crate::domain::BrokerAddress;
use crate::ports::outgoing::{ConnectionSettings, KafkaTransport, TransportConnector};
use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

enum SocketState {
    Idle,
    Connected(TcpStream),
    Closed,
}

/// Blocking-style request/response channel over one TCP socket.
///
/// The socket is opened on the first request and reopened on the next request
/// after any I/O failure.
pub struct TcpTransport {
    broker: BrokerAddress,
    settings: ConnectionSettings,
    codec: KafkaProtocolCodec,
    state: Mutex<SocketState>,
}

impl TcpTransport {
    pub fn new(broker: BrokerAddress, settings: ConnectionSettings) -> Self {
        Self {
            broker,
            settings,
            codec: KafkaProtocolCodec::new(),
            state: Mutex::new(SocketState::Idle),
        }
    }

    async fn connect(&self) -> Result<TcpStream, TransportError> {
        let target = (self.broker.host(), self.broker.port());
        let addrs = with_timeout(self.settings.socket_timeout, async {
            lookup_host(target).await.map_err(TransportError::Io)
        })
        .await?;

        let mut last_error = None;
        for addr in addrs {
            let attempt = async {
                let socket = if addr.is_ipv6() {
                    TcpSocket::new_v6()?
                } else {
                    TcpSocket::new_v4()?
                };
                let buffer_size = u32::try_from(self.settings.buffer_size).unwrap_or(u32::MAX);
                socket.set_recv_buffer_size(buffer_size)?;
                socket.set_send_buffer_size(buffer_size)?;

                let stream = socket.connect(addr).await?;
                stream.set_nodelay(true)?;
                Ok::<_, io::Error>(stream)
            };

            match with_timeout(self.settings.socket_timeout, async {
                attempt.await.map_err(TransportError::Io)
            })
            .await
            {
                Ok(stream) => {
                    debug!(broker = %self.broker, %addr, "connected");
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(broker = %self.broker, %addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TransportError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no address resolved for {}", self.broker),
            ))
        }))
    }

    async fn round_trip(&self, stream: &mut TcpStream, request: &KafkaRequest) -> Result<KafkaResponse, TransportError> {
        let timeout = self.settings.socket_timeout;
        let frame = self.codec.encode_request(request);
        trace!(broker = %self.broker, raw = %hex::encode(&frame), "sending request");

        with_timeout(timeout, async { stream.write_all(&frame).await.map_err(TransportError::Io) }).await?;

        let mut size_bytes = [0u8; 4];
        with_timeout(timeout, async {
            stream.read_exact(&mut size_bytes).await.map_err(TransportError::Io)
        })
        .await?;

        let size = i32::from_be_bytes(size_bytes);
        if size < 0 || size as usize > MAX_FRAME_SIZE {
            return Err(TransportError::Protocol(format!("invalid response size {}", size)));
        }

        let mut data = vec![0u8; size as usize];
        with_timeout(timeout, async {
            stream.read_exact(&mut data).await.map_err(TransportError::Io)
        })
        .await?;
        trace!(broker = %self.broker, size, "received response");

        self.codec.parse_response(request, &data)
    }
}

#[async_trait]
impl KafkaTransport for TcpTransport {
    async fn send(&self, request: KafkaRequest) -> Result<KafkaResponse, TransportError> {
        let mut state = self.state.lock().await;

        if let SocketState::Idle = *state {
            *state = SocketState::Connected(self.connect().await?);
        }
        let stream = match &mut *state {
            SocketState::Connected(stream) => stream,
            _ => return Err(TransportError::Closed),
        };

        match self.round_trip(stream, &request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                // The stream position is unknown after a failed exchange.
                warn!(broker = %self.broker, error = %e, "dropping socket after failed request");
                *state = SocketState::Idle;
                Err(e)
            }
        }
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        if let SocketState::Connected(mut stream) = std::mem::replace(&mut *state, SocketState::Closed) {
            if let Err(e) = stream.shutdown().await {
                debug!(broker = %self.broker, error = %e, "socket shutdown failed");
            }
        }
    }
}

async fn with_timeout<T, F>(timeout: Duration, future: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
}

#[derive(Debug, Default, Clone)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

impl TransportConnector for TcpConnector {
    fn open(&self, broker: &BrokerAddress, settings: &ConnectionSettings) -> Arc<dyn KafkaTransport> {
        Arc::new(TcpTransport::new(broker.clone(), settings.clone()))
    }
}
