use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::debug;

use crate::constants::SESSION_TERMINATED;
use crate::error::TransportError;
use crate::event::{CorrelationId, Event, EventType};
use crate::request::Request;
use crate::session::{Identity, Session};
use crate::wire::ClientFrame;

/// [`Session`] поверх пары каналов: кадры уходят в `outbound`,
/// события приходят из `inbound`.
///
/// Кто стоит на другом конце (сетевой поток или хост в том же процессе),
/// сессии не важно.
#[derive(Debug)]
pub struct ChannelSession {
    outbound: Option<Sender<ClientFrame>>,
    inbound: Receiver<Event>,
}

impl ChannelSession {
    pub fn new(outbound: Sender<ClientFrame>, inbound: Receiver<Event>) -> Self {
        Self {
            outbound: Some(outbound),
            inbound,
        }
    }

    fn push(&self, frame: ClientFrame) -> Result<(), TransportError> {
        let tx = self.outbound.as_ref().ok_or(TransportError::Disconnected)?;
        tx.send(frame).map_err(|_| TransportError::Disconnected)
    }
}

// закрытый канал = сессия оборвалась
fn terminated() -> Event {
    Event::status(EventType::SessionStatus, SESSION_TERMINATED)
}

impl Session for ChannelSession {
    fn start(&mut self) -> Result<bool, TransportError> {
        self.push(ClientFrame::Start)?;
        Ok(true)
    }

    fn open_service(&mut self, name: &str) -> Result<bool, TransportError> {
        self.push(ClientFrame::OpenService {
            name: name.to_string(),
        })?;
        Ok(true)
    }

    fn send_request(
        &mut self,
        request: &Request,
        identity: Option<&Identity>,
        correlation_id: Option<CorrelationId>,
    ) -> Result<(), TransportError> {
        self.push(ClientFrame::SendRequest {
            request: request.clone(),
            identity: identity.cloned(),
            correlation_id,
        })
    }

    fn next_event(&mut self, timeout: Duration) -> Event {
        match self.inbound.recv_timeout(timeout) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => Event::timeout(),
            Err(RecvTimeoutError::Disconnected) => terminated(),
        }
    }

    fn try_next_event(&mut self) -> Option<Event> {
        match self.inbound.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn stop(&mut self) {
        if let Some(tx) = self.outbound.take() {
            if tx.send(ClientFrame::Stop).is_err() {
                debug!("peer already gone on stop");
            }
        }
    }
}
