use crate::{
    components::radio::link::{InboundSink, SendCompletion},
    devices::radio::transport::Transport,
    error::TransportError,
};
use bytes::Bytes;
use log::{debug, info, warn};
use std::{io::ErrorKind, net::SocketAddr, sync::Arc};
use tokio::{net::UdpSocket, task::JoinHandle};

/// Largest datagram expected back from the aircraft.
const RECEIVE_BUFFER_LEN: usize = 512;

/// Sends every payload as one datagram to the onboard bridge and reports
/// any datagram coming back as inbound data.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    /// Background reader, started once the link registers its inbound sink.
    reader: Option<JoinHandle<()>>,
}

impl UdpTransport {
    /// Bind the local socket and connect it to the aircraft.
    ///
    /// * `bind_address`: local address, port 0 picks a free one.
    /// * `aircraft_address`: where payloads are sent.
    pub async fn bind(
        bind_address: SocketAddr,
        aircraft_address: SocketAddr,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(bind_address).await?;
        socket.connect(aircraft_address).await?;
        info!(
            "Radio transport bound on {} towards {aircraft_address}",
            socket.local_addr()?
        );
        Ok(Self {
            socket: Arc::new(socket),
            reader: None,
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }
}

/// A datagram is only useful to the onboard decoder if it went out whole.
///
/// * `sent`: bytes written by the socket.
/// * `expected`: length of the encoded payload.
fn check_sent(sent: usize, expected: usize) -> Result<(), TransportError> {
    if sent == expected {
        Ok(())
    } else {
        Err(TransportError::Rejected(format!(
            "only {sent} of {expected} bytes were sent"
        )))
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, bytes: Bytes, completion: SendCompletion) {
        let socket = self.socket.clone();
        tokio::spawn(async move {
            let result = match socket.send(&bytes).await {
                Ok(sent) => check_sent(sent, bytes.len()),
                Err(e) => Err(TransportError::from(e)),
            };
            completion.complete(result);
        });
    }

    fn on_receive(&mut self, inbound: InboundSink) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        let socket = self.socket.clone();
        self.reader = Some(tokio::spawn(async move {
            let mut buffer = [0u8; RECEIVE_BUFFER_LEN];
            loop {
                match socket.recv(&mut buffer).await {
                    Ok(len) => {
                        let data = Bytes::copy_from_slice(&buffer[..len]);
                        if inbound.data_received(data).is_err() {
                            break;
                        }
                    }
                    // Reported after a datagram hit a closed port, the send
                    // side already handles it.
                    Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                        debug!("Aircraft port refused a datagram");
                    }
                    Err(e) => {
                        warn!("Stopped reading from the aircraft {e}");
                        break;
                    }
                }
            }
        }));
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
