use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info, warn};

use crate::channel::ChannelSession;
use crate::error::TransportError;
use crate::event::{CorrelationId, Event};
use crate::request::Request;
use crate::session::{Identity, Session};
use crate::wire::{ClientFrame, ServerFrame, read_frame, write_frame};

const TCP_WRITE_TIMEOUT_S: u64 = 5;

/// Закрывает сокет из другого потока (например из обработчика Ctrl+C)
#[derive(Debug, Clone)]
pub struct TcpCloser(Arc<TcpStream>);

impl TcpCloser {
    pub fn close(&self) {
        // ошибка = сокет уже закрыт
        let _ = self.0.shutdown(Shutdown::Both);
    }
}

/// TCP-транспорт: поток чтения кадров и поток записи поверх [`ChannelSession`]
pub struct TcpSession {
    inner: ChannelSession,
    stream: Arc<TcpStream>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl TcpSession {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true).ok();
        stream
            .set_write_timeout(Some(Duration::from_secs(TCP_WRITE_TIMEOUT_S)))
            .ok();
        info!("connected to {}", stream.peer_addr()?);

        let (out_tx, out_rx) = unbounded();
        let (ev_tx, ev_rx) = unbounded();

        let read_half = stream.try_clone()?;
        let reader = thread::Builder::new()
            .name("blp-reader".into())
            .spawn(move || read_loop(read_half, ev_tx))?;

        let write_half = stream.try_clone()?;
        let writer = thread::Builder::new()
            .name("blp-writer".into())
            .spawn(move || write_loop(write_half, out_rx))?;

        Ok(Self {
            inner: ChannelSession::new(out_tx, ev_rx),
            stream: Arc::new(stream),
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    pub fn closer(&self) -> TcpCloser {
        TcpCloser(Arc::clone(&self.stream))
    }
}

fn read_loop(stream: TcpStream, events: Sender<Event>) {
    let mut r = BufReader::new(stream);
    loop {
        match read_frame::<ServerFrame, _>(&mut r) {
            Ok(Some(ServerFrame::Event(ev))) => {
                if events.send(ev).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("host closed connection");
                break;
            }
            Err(e) => {
                warn!("read error: {e}");
                break;
            }
        }
    }
    // `events` дропается здесь: сессия увидит SessionTerminated
}

fn write_loop(stream: TcpStream, frames: Receiver<ClientFrame>) {
    let mut w = BufWriter::new(stream);
    for frame in frames.iter() {
        let last = frame == ClientFrame::Stop;
        if let Err(e) = write_frame(&mut w, &frame) {
            warn!("write error: {e}");
            break;
        }
        if last {
            break;
        }
    }
    if let Ok(stream) = w.into_inner() {
        stream.shutdown(Shutdown::Write).ok();
    }
}

impl Session for TcpSession {
    fn start(&mut self) -> Result<bool, TransportError> {
        self.inner.start()
    }

    fn open_service(&mut self, name: &str) -> Result<bool, TransportError> {
        self.inner.open_service(name)
    }

    fn send_request(
        &mut self,
        request: &Request,
        identity: Option<&Identity>,
        correlation_id: Option<CorrelationId>,
    ) -> Result<(), TransportError> {
        self.inner.send_request(request, identity, correlation_id)
    }

    fn next_event(&mut self, timeout: Duration) -> Event {
        self.inner.next_event(timeout)
    }

    fn try_next_event(&mut self) -> Option<Event> {
        self.inner.try_next_event()
    }

    fn stop(&mut self) {
        self.inner.stop();
        if let Some(h) = self.writer.take() {
            let _ = h.join();
        }
        // хост мог не закрыть соединение сам
        self.stream.shutdown(Shutdown::Both).ok();
        if let Some(h) = self.reader.take() {
            let _ = h.join();
        }
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) {
        self.stop();
    }
}
