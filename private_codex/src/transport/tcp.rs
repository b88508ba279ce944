//! Length-prefixed bincode over TCP.
//!
//! Each accepted socket gets a reader loop and a writer task. The writer
//! drains the connection's queue and sends a `Ping` every probe interval;
//! the reader decodes commands, confirms liveness and submits everything
//! else to the session. Whichever side stops first ends the connection,
//! and the loss is always reported to the session.

use std::{io, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    sync::mpsc,
    time::{MissedTickBehavior, interval, timeout},
};
use uuid::Uuid;

use super::{ConnectionId, ConnectionRegistry, Delivery, Liveness, Outbound, TransportAdapter};
use crate::{
    net::{
        messages::{ClientError, ServerMessage, UserCommand},
        utils::{self, Frame},
    },
    session::SessionHandle,
};

#[derive(Debug, Default)]
pub struct TcpTransport {
    registry: ConnectionRegistry,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept connections until the listener fails.
    ///
    /// # Arguments
    ///
    /// * `listener` - Bound listener
    /// * `transport` - Shared transport, also registered with the session
    /// * `session` - Where decoded commands go
    /// * `probe_interval` - Time between liveness probes
    ///
    /// # Errors
    ///
    /// Returns the accept error that stopped the loop.
    pub async fn serve(
        listener: TcpListener,
        transport: Arc<Self>,
        session: SessionHandle,
        probe_interval: Duration,
    ) -> io::Result<()> {
        log::info!("TCP transport listening on {}", listener.local_addr()?);
        loop {
            let (stream, addr) = listener.accept().await?;
            if let Err(e) = stream.set_nodelay(true) {
                log::warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }
            let id = Uuid::new_v4();
            log::info!("TCP connection {} from {}", id, addr);
            tokio::spawn(handle_connection(
                stream,
                id,
                transport.clone(),
                session.clone(),
                probe_interval,
            ));
        }
    }
}

impl TransportAdapter for TcpTransport {
    fn protocol(&self) -> &'static str {
        "tcp"
    }

    fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

async fn handle_connection(
    stream: TcpStream,
    id: ConnectionId,
    transport: Arc<TcpTransport>,
    session: SessionHandle,
    probe_interval: Duration,
) {
    let (mut reader, writer) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    transport.registry().register(id, outbound_tx);

    let liveness = Arc::new(Liveness::new());
    let mut send_task = tokio::spawn(write_loop(
        writer,
        outbound_rx,
        liveness.clone(),
        probe_interval,
        id,
    ));

    loop {
        tokio::select! {
            frame = utils::read_frame(&mut reader) => {
                if !handle_frame(frame, id, &transport, &session, &liveness).await {
                    break;
                }
            }
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    drop(reader);

    match session.connection_lost(id).await {
        Ok(true) => log::info!("TCP connection {} ended the match", id),
        Ok(false) => log::info!("TCP connection {} closed", id),
        Err(e) => log::debug!("TCP connection {} closed after session: {}", id, e),
    }
}

/// # Returns
///
/// `false` once the connection should be dropped.
async fn handle_frame(
    frame: io::Result<Frame>,
    id: ConnectionId,
    transport: &TcpTransport,
    session: &SessionHandle,
    liveness: &Liveness,
) -> bool {
    let body = match frame {
        Ok(Frame::Body(body)) => body,
        Ok(Frame::Oversized(len)) => {
            log::debug!("TCP connection {} sent an oversized frame ({} bytes)", id, len);
            transport.deliver(
                Delivery::Connection(id),
                ServerMessage::ClientError(ClientError::InvalidMessage),
            );
            return true;
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            log::debug!("TCP connection {} hung up", id);
            return false;
        }
        Err(e) => {
            log::warn!("TCP connection {} read failed: {}", id, e);
            return false;
        }
    };

    match utils::decode::<UserCommand>(&body) {
        Ok(UserCommand::Pong) => {
            liveness.confirm();
            true
        }
        Ok(command) => {
            liveness.confirm();
            session.submit(id, command).await.is_ok()
        }
        Err(e) => {
            log::debug!("TCP connection {} sent a malformed frame: {}", id, e);
            transport.deliver(
                Delivery::Connection(id),
                ServerMessage::ClientError(ClientError::InvalidMessage),
            );
            true
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    liveness: Arc<Liveness>,
    probe_interval: Duration,
    id: ConnectionId,
) {
    let mut probes = interval(probe_interval);
    probes.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    probes.tick().await;

    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(Outbound::Message(msg)) => {
                    if let Err(e) = send(&mut writer, &msg, probe_interval).await {
                        log::warn!("TCP connection {} write failed: {}", id, e);
                        break;
                    }
                }
                Some(Outbound::Close(msg)) => {
                    let _ = send(&mut writer, &msg, probe_interval).await;
                    break;
                }
                None => break,
            },
            _ = probes.tick() => {
                if !liveness.probe() {
                    log::warn!("TCP connection {} missed a liveness probe", id);
                    break;
                }
                if send(&mut writer, &ServerMessage::Ping, probe_interval).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = timeout(probe_interval, writer.shutdown()).await;
}

/// Write one message. A peer that stops reading for a whole probe interval
/// counts as a missed probe.
async fn send<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &ServerMessage,
    deadline: Duration,
) -> io::Result<()> {
    let frame = utils::encode(msg)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    timeout(deadline, utils::write_frame(writer, &frame))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "peer stopped reading"))?
}
