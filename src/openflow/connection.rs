//! A single switch's OpenFlow TCP connection: handshake, decode loop, and a
//! non-blocking outbound queue.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::OpenFlowError;
use crate::openflow::message::{
    self, FeaturesReply, Header, PacketIn, OFPT_ECHO_REPLY, OFPT_ECHO_REQUEST, OFPT_FEATURES_REPLY,
    OFPT_FEATURES_REQUEST, OFPT_HELLO, OFPT_PACKET_IN,
};

/// Events the transport hands up to the Balancer actor.
#[derive(Debug)]
pub enum SwitchEvent {
    PacketIn(PacketIn),
    Disconnected,
}

/// Handle for sending raw OpenFlow messages to the switch without blocking
/// the caller; the write task drains this queue independently.
#[derive(Debug, Clone)]
pub struct SwitchSender {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

#[cfg(test)]
pub(crate) fn test_sender(tx: mpsc::UnboundedSender<Vec<u8>>) -> SwitchSender {
    SwitchSender { tx }
}

impl SwitchSender {
    pub fn send(&self, msg: Vec<u8>) -> Result<(), crate::error::BalancerError> {
        self.tx
            .send(msg)
            .map_err(|_| crate::error::BalancerError::SwitchSendFailure(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "switch connection closed",
            )))
    }
}

/// Drive the `HELLO` -> `FEATURES_REQUEST` -> `FEATURES_REPLY` handshake on a
/// freshly accepted stream and split it into a read loop (feeding `events`)
/// and a write task (draining an outbound queue), returning the switch's
/// `dpid` and a sender handle once the handshake completes.
pub async fn handshake(
    mut stream: TcpStream,
) -> Result<(u64, SwitchSender, mpsc::UnboundedReceiver<SwitchEvent>), OpenFlowError> {
    stream.write_all(&message::encode_empty(OFPT_HELLO, 0)).await?;

    let mut xid_counter: u32 = 1;
    let dpid = loop {
        let (hdr, body) = read_message(&mut stream).await?;
        match hdr.msg_type {
            OFPT_HELLO => {
                let xid = xid_counter;
                xid_counter += 1;
                stream
                    .write_all(&message::encode_empty(OFPT_FEATURES_REQUEST, xid))
                    .await?;
            }
            OFPT_FEATURES_REPLY => {
                let reply = FeaturesReply::parse(&body)?;
                break reply.dpid;
            }
            OFPT_ECHO_REQUEST => {
                stream
                    .write_all(&message::encode_empty(OFPT_ECHO_REPLY, hdr.xid))
                    .await?;
            }
            other => return Err(OpenFlowError::UnexpectedMessage(other)),
        }
    };

    let (read_half, mut write_half) = stream.into_split();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = write_half.write_all(&msg).await {
                warn!(error = %e, "switch write failed, closing connection");
                break;
            }
        }
    });

    let echo_tx = out_tx.clone();
    tokio::spawn(async move {
        let mut stream = read_half;
        loop {
            match read_message(&mut stream).await {
                Ok((hdr, body)) => match hdr.msg_type {
                    OFPT_PACKET_IN => match PacketIn::parse(&body) {
                        Ok(pin) => {
                            if event_tx.send(SwitchEvent::PacketIn(pin)).is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!(error = %e, "dropping unparsable packet-in"),
                    },
                    OFPT_ECHO_REQUEST => {
                        debug!("received echo request post-handshake, replying");
                        if echo_tx.send(message::encode_empty(OFPT_ECHO_REPLY, hdr.xid)).is_err() {
                            break;
                        }
                    }
                    other => debug!(msg_type = other, "ignoring unhandled openflow message"),
                },
                Err(e) => {
                    debug!(error = %e, "switch read loop ending");
                    let _ = event_tx.send(SwitchEvent::Disconnected);
                    break;
                }
            }
        }
    });

    Ok((dpid, SwitchSender { tx: out_tx }, event_rx))
}

async fn read_message<R: AsyncReadExt + Unpin>(
    stream: &mut R,
) -> Result<(Header, Vec<u8>), OpenFlowError> {
    let mut hdr_buf = [0u8; 8];
    stream.read_exact(&mut hdr_buf).await?;
    let hdr = Header::parse(&hdr_buf)?;
    let body_len = (hdr.length as usize).checked_sub(8).ok_or(OpenFlowError::Truncated {
        need: 8,
        have: hdr.length as usize,
    })?;
    let mut body = vec![0u8; body_len];
    if body_len > 0 {
        stream.read_exact(&mut body).await?;
    }
    Ok((hdr, body))
}
