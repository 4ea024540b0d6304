//! TCP transport carrying fixed-layout frames
//!
//! - [`TcpPublisher`] binds and fans frames out to every connected subscriber.
//!   Each connection has its own writer task, so a stalled or dead peer never
//!   holds up the others or the publisher.
//! - [`TcpSubscriber`] connects and yields frames matching a byte prefix.
//! - [`TcpResponder`] binds and runs a strict request/reply loop per connection,
//!   forwarding every request into one [`ChannelRequester`].
//! - [`TcpRequester`] connects and keeps at most one request in flight.

use crate::error::TransportError;
use crate::transport::channel::ChannelRequester;
use crate::transport::{Endpoint, Publisher, Requester, Subscriber};
use async_trait::async_trait;
use log::{debug, info, warn};
use pedlar_core::WireFormat;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 1024;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Reassembles frames from a byte stream using the message layout
#[derive(Debug, Default)]
struct FrameReader {
    buffer: Vec<u8>,
}

impl FrameReader {
    /// Pop one complete frame if the buffer holds one
    fn take<M: WireFormat>(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.buffer.len() < M::HEADER_LEN {
            return Ok(None);
        }
        let len = M::frame_len(&self.buffer[..M::HEADER_LEN])?;
        if self.buffer.len() < len {
            return Ok(None);
        }
        Ok(Some(self.buffer.drain(..len).collect()))
    }

    /// Read until one complete frame is available. Cancel-safe: partial
    /// reads stay buffered.
    async fn next<M, R>(&mut self, reader: &mut R) -> Result<Vec<u8>, TransportError>
    where
        M: WireFormat,
        R: AsyncRead + Unpin,
    {
        loop {
            if let Some(frame) = self.take::<M>()? {
                return Ok(frame);
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(TransportError::ChannelClosed);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    fn fill_nonblocking(&mut self, stream: &TcpStream) -> Result<bool, TransportError> {
        let mut chunk = [0u8; READ_CHUNK];
        match stream.try_read(&mut chunk) {
            Ok(0) => Err(TransportError::ChannelClosed),
            Ok(n) => {
                self.buffer.extend_from_slice(&chunk[..n]);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

async fn bind_listener(endpoint: &Endpoint) -> Result<TcpListener, TransportError> {
    TcpListener::bind(endpoint.addr())
        .await
        .map_err(|e| TransportError::Connection(format!("bind {}: {}", endpoint, e)))
}

async fn connect_stream(endpoint: &Endpoint) -> Result<TcpStream, TransportError> {
    let stream = TcpStream::connect(endpoint.addr())
        .await
        .map_err(|e| TransportError::Connection(format!("connect {}: {}", endpoint, e)))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Pub side of a pub/sub endpoint
pub struct TcpPublisher<M> {
    tx: broadcast::Sender<Vec<u8>>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    _marker: PhantomData<fn(M)>,
}

impl<M> TcpPublisher<M> {
    /// Bind and start accepting subscribers. `capacity` is how many frames a
    /// slow subscriber may fall behind before it starts skipping.
    pub async fn bind(endpoint: &Endpoint, capacity: usize) -> Result<Self, TransportError> {
        let listener = bind_listener(endpoint).await?;
        let local_addr = listener.local_addr()?;
        let (tx, _) = broadcast::channel(capacity);

        info!("Publishing on tcp://{}", local_addr);
        let accept_task = tokio::spawn(accept_subscribers(listener, tx.clone()));

        Ok(Self {
            tx,
            local_addr,
            accept_task,
            _marker: PhantomData,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an already encoded frame
    pub fn publish_frame(&self, frame: Vec<u8>) {
        // Err only means no subscriber is connected
        let _ = self.tx.send(frame);
    }
}

impl<M> Drop for TcpPublisher<M> {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_subscribers(listener: TcpListener, tx: broadcast::Sender<Vec<u8>>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("Subscriber connected from {}", peer);
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("set_nodelay failed for {}: {}", peer, e);
                }
                tokio::spawn(forward_frames(stream, tx.subscribe(), peer));
            }
            Err(e) => {
                warn!("Accepting subscriber failed: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn forward_frames(
    mut stream: TcpStream,
    mut rx: broadcast::Receiver<Vec<u8>>,
    peer: SocketAddr,
) {
    loop {
        match rx.recv().await {
            Ok(frame) => {
                if let Err(e) = stream.write_all(&frame).await {
                    debug!("Subscriber {} dropped: {}", peer, e);
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Subscriber {} lagged, skipped {} frames", peer, skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[async_trait]
impl<M> Publisher<M> for TcpPublisher<M>
where
    M: WireFormat + Send + Sync,
{
    async fn publish(&self, msg: &M) -> Result<(), TransportError> {
        self.publish_frame(msg.encode()?);
        Ok(())
    }
}

/// Sub side of a pub/sub endpoint
pub struct TcpSubscriber<M> {
    stream: TcpStream,
    reader: FrameReader,
    prefix: Vec<u8>,
    _marker: PhantomData<fn() -> M>,
}

impl<M: WireFormat> TcpSubscriber<M> {
    /// Connect and receive frames starting with `prefix` (empty = everything)
    pub async fn connect(endpoint: &Endpoint, prefix: &[u8]) -> Result<Self, TransportError> {
        let stream = connect_stream(endpoint).await?;
        debug!("Subscribed to {} with prefix {:02x?}", endpoint, prefix);
        Ok(Self {
            stream,
            reader: FrameReader::default(),
            prefix: prefix.to_vec(),
            _marker: PhantomData,
        })
    }

    fn decode_if_wanted(&self, frame: Vec<u8>) -> Result<Option<M>, TransportError> {
        if !frame.starts_with(&self.prefix) {
            return Ok(None);
        }
        Ok(Some(M::decode(&frame)?))
    }
}

#[async_trait]
impl<M> Subscriber<M> for TcpSubscriber<M>
where
    M: WireFormat + Send,
{
    /// A malformed frame desynchronises the stream; callers should reconnect
    async fn next(&mut self) -> Result<M, TransportError> {
        loop {
            let frame = self.reader.next::<M, _>(&mut self.stream).await?;
            if let Some(msg) = self.decode_if_wanted(frame)? {
                return Ok(msg);
            }
        }
    }

    fn try_next(&mut self) -> Result<Option<M>, TransportError> {
        loop {
            while let Some(frame) = self.reader.take::<M>()? {
                if let Some(msg) = self.decode_if_wanted(frame)? {
                    return Ok(Some(msg));
                }
            }
            if !self.reader.fill_nonblocking(&self.stream)? {
                return Ok(None);
            }
        }
    }
}

/// Rep side of a request/reply endpoint
pub struct TcpResponder<Req, Res> {
    listener: TcpListener,
    _marker: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> TcpResponder<Req, Res>
where
    Req: WireFormat + Clone + Send + Sync + 'static,
    Res: WireFormat + Send + 'static,
{
    pub async fn bind(endpoint: &Endpoint) -> Result<Self, TransportError> {
        let listener = bind_listener(endpoint).await?;
        Ok(Self {
            listener,
            _marker: PhantomData,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, answering each request through `handler`
    pub async fn serve(self, handler: ChannelRequester<Req, Res>) -> Result<(), TransportError> {
        info!("Serving requests on tcp://{}", self.local_addr()?);
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("Requester connected from {}", peer);
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        match serve_connection(stream, handler).await {
                            Ok(()) => debug!("Requester {} disconnected", peer),
                            Err(e) => warn!("Requester {} dropped: {}", peer, e),
                        }
                    });
                }
                Err(e) => {
                    warn!("Accepting requester failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

/// One request, one response, repeat. The next request is not read until the
/// previous response has been written.
async fn serve_connection<Req, Res>(
    stream: TcpStream,
    handler: ChannelRequester<Req, Res>,
) -> Result<(), TransportError>
where
    Req: WireFormat + Clone + Send + Sync + 'static,
    Res: WireFormat + Send + 'static,
{
    stream.set_nodelay(true)?;
    let (mut rd, mut wr) = stream.into_split();
    let mut reader = FrameReader::default();

    loop {
        let frame = match reader.next::<Req, _>(&mut rd).await {
            Ok(frame) => frame,
            Err(TransportError::ChannelClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        let req = Req::decode(&frame)?;
        let res = handler.request(&req).await?;
        wr.write_all(&res.encode()?).await?;
    }
}

/// Req side of a request/reply endpoint
pub struct TcpRequester<Req, Res> {
    conn: Mutex<(TcpStream, FrameReader)>,
    endpoint: Endpoint,
    _marker: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> TcpRequester<Req, Res> {
    /// Connect; `linger` bounds how long unsent data is kept on close
    pub async fn connect(
        endpoint: &Endpoint,
        linger: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let stream = connect_stream(endpoint).await?;
        #[allow(deprecated)]
        stream.set_linger(linger)?;
        debug!("Connected requester to {}", endpoint);
        Ok(Self {
            conn: Mutex::new((stream, FrameReader::default())),
            endpoint: endpoint.clone(),
            _marker: PhantomData,
        })
    }
}

#[async_trait]
impl<Req, Res> Requester<Req, Res> for TcpRequester<Req, Res>
where
    Req: WireFormat + Send + Sync,
    Res: WireFormat + Send,
{
    async fn request(&self, req: &Req) -> Result<Res, TransportError> {
        let frame = req.encode()?;
        // Held across the round trip: one outstanding request per connection
        let mut guard = self.conn.lock().await;
        let (stream, reader) = &mut *guard;

        stream
            .write_all(&frame)
            .await
            .map_err(|e| TransportError::Send(format!("{}: {}", self.endpoint, e)))?;
        let reply = reader.next::<Res, _>(stream).await?;
        Ok(Res::decode(&reply)?)
    }
}
