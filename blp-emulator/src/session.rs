use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use blp_core::constants::{
    BEQS_REQUEST, EXCEL_GET_GRID_REQUEST, EXR_SERVICE, HISTORICAL_DATA_REQUEST,
    INTRADAY_BAR_REQUEST, REFDATA_SERVICE, REFERENCE_DATA_REQUEST, SERVICE_OPEN_FAILURE,
    SERVICE_OPENED, SESSION_CONNECTION_UP, SESSION_STARTED,
};
use blp_core::responses::{
    beqs_response, grid_response, historical_response, intraday_response, reference_response,
    response_error,
};
use blp_core::wire::ClientFrame;
use blp_core::{CorrelationId, Event, EventType, Message, Request};
use log::{debug, info, warn};

use crate::config::{ConnId, SECURITIES_PER_MESSAGE};
use crate::generator::MarketData;

pub(crate) type SharedMarket = Arc<Mutex<MarketData>>;

/// Серверная сторона одной сессии: кадр клиента -> события в ответ.
pub(crate) struct HostSession {
    cid: ConnId,
    market: SharedMarket,
    started: bool,
    services: HashSet<String>,
}

impl HostSession {
    pub(crate) fn new(cid: ConnId, market: SharedMarket) -> Self {
        Self {
            cid,
            market,
            started: false,
            services: HashSet::new(),
        }
    }

    /// `None`: клиент закрыл сессию
    pub(crate) fn handle_frame(&mut self, frame: ClientFrame) -> Option<Vec<Event>> {
        let events = match frame {
            ClientFrame::Start => {
                self.started = true;
                info!("{}: session started", self.cid);
                vec![
                    Event::status(EventType::SessionStatus, SESSION_CONNECTION_UP),
                    Event::status(EventType::SessionStatus, SESSION_STARTED),
                ]
            }
            ClientFrame::OpenService { name } => vec![self.open_service(name)],
            ClientFrame::SendRequest {
                request,
                identity,
                correlation_id,
            } => {
                if let Some(identity) = identity {
                    debug!("{}: request under identity {}", self.cid, identity.token());
                }
                self.respond(&request, correlation_id)
            }
            ClientFrame::Stop => {
                info!("{}: session stopped by client", self.cid);
                return None;
            }
        };
        Some(events)
    }

    fn open_service(&mut self, name: String) -> Event {
        let known = name == REFDATA_SERVICE || name == EXR_SERVICE;
        if self.started && known {
            info!("{}: opened {name}", self.cid);
            self.services.insert(name);
            Event::status(EventType::ServiceStatus, SERVICE_OPENED)
        } else {
            warn!("{}: cannot open {name} (started={})", self.cid, self.started);
            Event::status(EventType::ServiceStatus, SERVICE_OPEN_FAILURE)
        }
    }

    fn market(&self) -> MutexGuard<'_, MarketData> {
        match self.market.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(), // продолжаем, несмотря на poison
        }
    }

    fn respond(&self, request: &Request, correlation_id: Option<CorrelationId>) -> Vec<Event> {
        debug!("{}: {}", self.cid, request.kind());
        let reply = reply_type(request.kind());

        let messages = if !self.services.contains(request.service()) {
            vec![response_error(
                reply,
                "BAD_ARGS",
                &format!("service {} is not open", request.service()),
            )]
        } else {
            self.messages(request, reply)
        };

        let messages = messages
            .into_iter()
            .map(|m| match &correlation_id {
                Some(id) => m.with_correlation(id.clone()),
                None => m,
            })
            .collect();
        into_events(messages)
    }

    fn messages(&self, request: &Request, reply: &str) -> Vec<Message> {
        let mut market = self.market();
        match request.kind() {
            REFERENCE_DATA_REQUEST => {
                let mut records = market.reference(request);
                if records.is_empty() {
                    return vec![reference_response(Vec::new())];
                }
                let mut out = Vec::new();
                while !records.is_empty() {
                    let rest = records.split_off(SECURITIES_PER_MESSAGE.min(records.len()));
                    out.push(reference_response(records));
                    records = rest;
                }
                out
            }
            HISTORICAL_DATA_REQUEST => match market.history(request) {
                Ok(records) if records.is_empty() => {
                    vec![response_error(reply, "BAD_ARGS", "no securities requested")]
                }
                Ok(records) => records.into_iter().map(historical_response).collect(),
                Err(e) => vec![response_error(reply, "BAD_ARGS", &e.to_string())],
            },
            INTRADAY_BAR_REQUEST => match market.bars(request) {
                Ok(bars) => vec![intraday_response(bars)],
                Err(e) => vec![response_error(reply, "BAD_ARGS", &e.to_string())],
            },
            EXCEL_GET_GRID_REQUEST => match request.setting("Domain") {
                Some(domain) => vec![grid_response(&market.search(&domain.to_string()))],
                None => vec![response_error(reply, "BAD_ARGS", "missing Domain")],
            },
            BEQS_REQUEST => match request.setting("screenName") {
                Some(name) => vec![beqs_response(market.screen(&name.to_string()))],
                None => vec![response_error(reply, "BAD_ARGS", "missing screenName")],
            },
            other => vec![response_error(
                reply,
                "BAD_ARGS",
                &format!("unsupported request {other}"),
            )],
        }
    }
}

fn reply_type(kind: &str) -> &'static str {
    match kind {
        REFERENCE_DATA_REQUEST => "ReferenceDataResponse",
        HISTORICAL_DATA_REQUEST => "HistoricalDataResponse",
        INTRADAY_BAR_REQUEST => "IntradayBarResponse",
        EXCEL_GET_GRID_REQUEST => "GridResponse",
        BEQS_REQUEST => "BeqsResponse",
        _ => "RequestFailure",
    }
}

// все сообщения, кроме последнего, уходят как PARTIAL_RESPONSE
fn into_events(messages: Vec<Message>) -> Vec<Event> {
    let last = messages.len().saturating_sub(1);
    messages
        .into_iter()
        .enumerate()
        .map(|(i, m)| {
            let event_type = if i == last {
                EventType::Response
            } else {
                EventType::PartialResponse
            };
            Event::new(event_type, vec![m])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GeneratorConfig;
    use blp_core::channel::ChannelSession;
    use blp_core::constants::DEFAULT_DATE_FIELD;
    use blp_core::query::Screen;
    use blp_core::{Connection, SessionOptions, Value};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    fn market() -> SharedMarket {
        let securities = [
            "IBM US Equity",
            "SPY US Equity",
            "AUD Curncy",
            "NG1 Comdty",
            "NG2 Comdty",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        Arc::new(Mutex::new(MarketData::new(
            securities,
            GeneratorConfig::default(),
            Some(42),
        )))
    }

    fn started() -> HostSession {
        let mut host = HostSession::new(1, market());
        host.handle_frame(ClientFrame::Start).unwrap();
        host.handle_frame(ClientFrame::OpenService {
            name: REFDATA_SERVICE.into(),
        })
        .unwrap();
        host
    }

    fn send(host: &mut HostSession, request: Request, id: Option<&str>) -> Vec<Event> {
        host.handle_frame(ClientFrame::SendRequest {
            request,
            identity: None,
            correlation_id: id.map(CorrelationId::from),
        })
        .unwrap()
    }

    // хост в соседнем потоке, связь через каналы
    fn spawn_host() -> (ChannelSession, JoinHandle<()>) {
        let (frame_tx, frame_rx) = crossbeam_channel::unbounded::<ClientFrame>();
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<Event>();
        let mut host = HostSession::new(7, market());
        let h = thread::spawn(move || {
            for frame in frame_rx {
                let Some(events) = host.handle_frame(frame) else {
                    return;
                };
                for ev in events {
                    if event_tx.send(ev).is_err() {
                        return;
                    }
                }
            }
        });
        (ChannelSession::new(frame_tx, event_rx), h)
    }

    #[test]
    fn start_reports_connection_then_session() {
        let mut host = HostSession::new(1, market());
        let events = host.handle_frame(ClientFrame::Start).unwrap();
        assert!(events[0].has_message_type(SESSION_CONNECTION_UP));
        assert!(events[1].has_message_type(SESSION_STARTED));
        assert!(host.handle_frame(ClientFrame::Stop).is_none());
    }

    #[test]
    fn unknown_service_fails_to_open() {
        let mut host = started();
        let events = host
            .handle_frame(ClientFrame::OpenService {
                name: "//blp/mktdata".into(),
            })
            .unwrap();
        assert!(events[0].has_message_type(SERVICE_OPEN_FAILURE));
    }

    #[test]
    fn reference_is_chunked_into_partials() {
        let mut host = started();
        let request = Request::builder(REFDATA_SERVICE, REFERENCE_DATA_REQUEST)
            .subjects(&["IBM US Equity", "SPY US Equity", "AUD Curncy"])
            .field("PX_LAST")
            .build();

        let events = send(&mut host, request, Some("r1"));
        let types: Vec<EventType> = events.iter().map(Event::event_type).collect();
        assert_eq!(types, vec![EventType::PartialResponse, EventType::Response]);
        for ev in &events {
            assert_eq!(ev.messages()[0].correlation_ids, vec![CorrelationId::from("r1")]);
        }
    }

    #[test]
    fn closed_service_gets_response_error() {
        let mut host = started();
        let request = Request::builder(EXR_SERVICE, EXCEL_GET_GRID_REQUEST)
            .setting("Domain", "COMDTY:NGFLOW")
            .build();

        let events = send(&mut host, request, None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), EventType::Response);
        let doc = events[0].messages()[0].decode().document;
        assert!(blp_core::validate::check_response_error(&doc).is_err());
    }

    #[test]
    fn unknown_request_kind_is_rejected() {
        let mut host = started();
        let request = Request::builder(REFDATA_SERVICE, "PortfolioDataRequest").build();
        let events = send(&mut host, request, None);
        assert!(events[0].has_message_type("RequestFailure"));
    }

    #[test]
    fn in_process_host_serves_queries() {
        let (session, host) = spawn_host();
        let options = SessionOptions::default().with_timeout(Duration::from_secs(2));
        let mut con = Connection::new(session, options);
        con.start().unwrap();

        let rows = con
            .reference(&["IBM US Equity", "AUD Curncy"], &["NAME", "CRNCY"], &[])
            .unwrap();
        let got: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            got,
            vec![
                "IBM US Equity\tNAME\tIBM",
                "IBM US Equity\tCRNCY\tUSD",
                "AUD Curncy\tNAME\tAUD",
                "AUD Curncy\tCRNCY\tAUD",
            ]
        );

        let dated = con
            .ref_hist(
                &["AUD Curncy"],
                &["SETTLE_DT"],
                &["20150626", "20150625"],
                &[],
                DEFAULT_DATE_FIELD,
            )
            .unwrap();
        let settle: Vec<(&str, Option<Value>)> = dated
            .iter()
            .map(|d| (d.date.as_str(), d.row.value.clone()))
            .collect();
        assert_eq!(
            settle,
            vec![
                ("20150625", Some(Value::from("2015-06-29"))),
                ("20150626", Some(Value::from("2015-06-30"))),
            ]
        );

        let tickers = con.bsrch("COMDTY:NGFLOW").unwrap();
        assert_eq!(tickers.len(), 2);

        let screen = con.beqs(&Screen::new("Core Capital Ratios")).unwrap();
        assert_eq!(screen.len(), 5 * 3);

        con.stop();
        host.join().unwrap();
    }
}
