use crate::config::ConnId;
use crate::registry::ConnectionRegistry;
use crate::session::{HostSession, SharedMarket};
use anyhow::Context;
use blp_core::wire::{ClientFrame, ServerFrame, read_frame, write_frame};
use log::{debug, info, warn};
use std::io::{BufReader, BufWriter};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, atomic::AtomicBool, atomic::AtomicU64, atomic::Ordering};
use std::thread;
use std::time::Duration;

const TCP_WRITE_TIMEOUT_S: u64 = 5;

// accept loop + поток на соединение
pub(crate) fn run_tcp_listener(
    listener: TcpListener,
    market: SharedMarket,
    registry: Arc<ConnectionRegistry>,
    next_conn_id: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    listener
        .set_nonblocking(true)
        .context("listener.set_nonblocking(true)")?;
    let mut conn_handles = Vec::new();

    loop {
        reap_finished_conns(&mut conn_handles);

        if shutdown.load(Ordering::Relaxed) {
            info!("shutting down tcp listener");
            break;
        }

        match listener.accept() {
            Ok((stream, addr)) => {
                stream
                    .set_nonblocking(false)
                    .context("stream.set_nonblocking(false)")?;

                stream.set_nodelay(true).ok();
                stream
                    .set_write_timeout(Some(Duration::from_secs(TCP_WRITE_TIMEOUT_S)))
                    .ok();

                let cid = next_conn_id.fetch_add(1, Ordering::Relaxed);
                let registered = stream
                    .try_clone()
                    .map_err(anyhow::Error::from)
                    .and_then(|s| registry.add(cid, s).map_err(anyhow::Error::from));
                if let Err(e) = registered {
                    warn!("cannot register connection {cid} from {addr}: {e}");
                    continue;
                }
                info!("connection {cid} from {addr}");

                let market = market.clone();
                let registry = registry.clone();

                let h = thread::spawn(move || {
                    if let Err(e) = handle_conn(cid, stream, market) {
                        warn!("handle_conn {cid} error: {e:#}");
                    }
                    registry.remove(cid);
                });
                conn_handles.push(h);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // нет новых соединений прямо сейчас
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                warn!("accept error: {e}");
                thread::sleep(Duration::from_millis(50));
            }
        }
    }

    // будим потоки, ждущие следующего кадра
    let closed = registry.shutdown_all();
    debug!("closed {closed} open connections");

    for h in conn_handles {
        if let Err(panic) = h.join() {
            warn!("connection thread panicked: {:?}", panic);
        }
    }

    Ok(())
}

fn reap_finished_conns(handles: &mut Vec<thread::JoinHandle<()>>) {
    let mut i = 0;
    while i < handles.len() {
        if handles[i].is_finished() {
            let h = handles.swap_remove(i);
            if let Err(panic) = h.join() {
                warn!("connection thread panicked: {:?}", panic);
            }
        } else {
            i += 1;
        }
    }
}

/// Кадры клиента читаются по одному; ответные события пишутся сразу.
fn handle_conn(cid: ConnId, stream: TcpStream, market: SharedMarket) -> anyhow::Result<()> {
    let mut reader = BufReader::new(stream.try_clone().context("stream.try_clone()")?);
    let mut writer = BufWriter::new(stream);
    let mut host = HostSession::new(cid, market);

    loop {
        let frame: ClientFrame = match read_frame(&mut reader)? {
            Some(frame) => frame,
            None => {
                info!("connection {cid} closed by peer");
                break;
            }
        };

        let Some(events) = host.handle_frame(frame) else {
            break;
        };
        for ev in events {
            write_frame(&mut writer, &ServerFrame::Event(ev))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_securities;
    use crate::generator::{GeneratorConfig, MarketData};
    use blp_core::transport::TcpSession;
    use blp_core::{BlpError, Connection, SessionOptions, ValidationError};
    use std::net::SocketAddr;
    use std::sync::Mutex;

    struct Server {
        addr: SocketAddr,
        registry: Arc<ConnectionRegistry>,
        shutdown: Arc<AtomicBool>,
        handle: thread::JoinHandle<anyhow::Result<()>>,
    }

    impl Server {
        fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let market = Arc::new(Mutex::new(MarketData::new(
                load_securities(None).unwrap(),
                GeneratorConfig::default(),
                Some(1),
            )));
            let registry = Arc::new(ConnectionRegistry::new());
            let shutdown = Arc::new(AtomicBool::new(false));

            let handle = {
                let registry = registry.clone();
                let shutdown = shutdown.clone();
                thread::spawn(move || {
                    run_tcp_listener(
                        listener,
                        market,
                        registry,
                        Arc::new(AtomicU64::new(1)),
                        shutdown,
                    )
                })
            };

            Self {
                addr,
                registry,
                shutdown,
                handle,
            }
        }

        fn connect(&self) -> Connection<TcpSession> {
            let session = TcpSession::connect(self.addr).unwrap();
            let options = SessionOptions {
                host: self.addr.ip().to_string(),
                port: self.addr.port(),
                ..SessionOptions::default()
            }
            .with_timeout(Duration::from_secs(2));
            let mut con = Connection::new(session, options);
            con.start().unwrap();
            con
        }

        fn stop(self) {
            self.shutdown.store(true, Ordering::Relaxed);
            self.handle.join().unwrap().unwrap();
            assert_eq!(self.registry.len(), 0);
        }
    }

    #[test]
    fn serves_reference_and_history_over_tcp() {
        let server = Server::start();
        let mut con = server.connect();

        let tickers = ["IBM US Equity", "SPY US Equity", "AUD Curncy"];
        let rows = con.reference(&tickers, &["NAME", "CRNCY"], &[]).unwrap();
        let got: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            got,
            vec![
                "IBM US Equity\tNAME\tIBM",
                "IBM US Equity\tCRNCY\tUSD",
                "SPY US Equity\tNAME\tSPY",
                "SPY US Equity\tCRNCY\tUSD",
                "AUD Curncy\tNAME\tAUD",
                "AUD Curncy\tCRNCY\tAUD",
            ]
        );

        let hist = con
            .bdh(&["IBM US Equity"], &["PX_LAST", "VOLUME"], "20150626", "20150630", &[], &[])
            .unwrap();
        // 3 рабочих дня x 2 поля
        assert_eq!(hist.len(), 6);

        con.stop();
        server.stop();
    }

    #[test]
    fn unknown_security_keeps_earlier_rows() {
        let server = Server::start();
        let mut con = server.connect();

        let err = con
            .reference(&["IBM US Equity", "XXX Equity"], &["NAME"], &[])
            .unwrap_err();
        assert!(matches!(
            err.kind,
            BlpError::Validation(ValidationError::Security { .. })
        ));
        assert_eq!(err.partial.len(), 1);

        con.stop();
        server.stop();
    }

    #[test]
    fn shutdown_closes_idle_connections() {
        let server = Server::start();
        let mut con = server.connect();

        // клиент висит на открытой сессии; сервер должен закрыть её сам
        server.stop();
        con.stop();
    }
}
