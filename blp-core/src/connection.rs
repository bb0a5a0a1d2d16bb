use std::collections::BTreeMap;
use std::mem;
use std::time::Duration;

use log::{debug, info, warn};

use crate::constants::service_for_kind;
use crate::error::SessionError;
use crate::event::{CorrelationId, Event, EventType};
use crate::lifecycle::SessionState;
use crate::pump::{EventPump, Receive};
use crate::request::{Override, Request, Setting};
use crate::session::{Service, Session, SessionOptions};

/// Сессия вместе с её жизненным циклом.
///
/// Владеет транспортом от создания до `stop()`; запросы уходят только
/// в состоянии `Ready`.
pub struct Connection<S: Session> {
    session: S,
    options: SessionOptions,
    state: SessionState,
    services: BTreeMap<String, Service>,
}

impl<S: Session> Connection<S> {
    /// Свежая сессия, ещё не стартовавшая
    pub fn new(session: S, options: SessionOptions) -> Self {
        Self {
            session,
            options,
            state: SessionState::Disconnected,
            services: BTreeMap::new(),
        }
    }

    /// Принимает уже созданную сессию.
    ///
    /// Очередь такой сессии обязана быть пустой: один опрос должен вернуть
    /// `Timeout`, иначе события от чужих запросов попадут в наши ответы.
    pub fn adopt(mut session: S, options: SessionOptions) -> Result<Self, SessionError> {
        let ev = session.next_event(options.timeout);
        if ev.event_type() != EventType::Timeout {
            return Err(SessionError::QueueNotEmpty {
                event_type: ev.event_type(),
            });
        }
        Ok(Self::new(session, options))
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn timeout(&self) -> Duration {
        self.options.timeout
    }

    /// Меняет таймаут опроса (например, после `PumpError::Timeout`)
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.options.timeout = timeout;
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    /// Поднимает сессию и открывает все обязательные сервисы
    pub fn start(&mut self) -> Result<(), SessionError> {
        let required = self.options.services.clone();
        let current = mem::take(&mut self.state);
        match current.clone().begin_start(required.clone()) {
            Ok(next) => self.state = next,
            Err(e) => {
                self.state = current;
                return Err(e);
            }
        }

        let started = match self.session.start() {
            Ok(started) => started,
            Err(e) => {
                self.state = SessionState::Disconnected;
                return Err(e.into());
            }
        };

        if !started {
            let ev = self.session.next_event(self.options.timeout);
            warn!("session refused to start, Event Type: {}", ev.event_type());
            for msg in ev.messages() {
                warn!("Message Received:\n{msg}");
            }
            self.state = SessionState::Disconnected;
            return Err(SessionError::StartFailed {
                reason: format!("transport did not start ({} event)", ev.event_type()),
            });
        }

        // два SessionStatus подряд: соединение поднято, сессия готова
        for _ in 0..2 {
            let ev = self.session.next_event(self.options.start_timeout);
            log_event(&ev);
            self.advance(&ev, None)?;
        }

        for name in &required {
            self.open_service(name)?;
        }

        info!("session ready, services: {}", required.join(", "));
        Ok(())
    }

    /// Открывает сервис на стартовавшей сессии
    pub fn open_service(&mut self, name: &str) -> Result<&Service, SessionError> {
        if !self.state.can_open_service() {
            return Err(SessionError::InvalidState {
                action: "open service",
                state: self.state.name(),
            });
        }

        let opened = match self.session.open_service(name) {
            Ok(opened) => opened,
            Err(e) => {
                self.state = SessionState::Disconnected;
                return Err(e.into());
            }
        };
        let ev = self.session.next_event(self.options.start_timeout);
        log_event(&ev);
        self.advance(&ev, Some(name))?;

        if !opened {
            warn!("Failed to open {name}");
            self.state = SessionState::Disconnected;
            return Err(SessionError::ServiceOpenFailed {
                name: name.to_string(),
            });
        }

        self.services
            .entry(name.to_string())
            .or_insert_with(|| Service::new(name));
        Ok(&self.services[name])
    }

    /// Закрывает сессию; можно звать сколько угодно раз
    pub fn stop(&mut self) {
        if self.state != SessionState::Stopped {
            self.session.stop();
            self.services.clear();
            info!("session stopped");
        }
        self.state = mem::take(&mut self.state).stop();
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> &S {
        &self.session
    }

    /// Помпа событий поверх сессии
    pub fn pump(&mut self) -> EventPump<'_, S> {
        EventPump::new(&mut self.session, self.options.timeout)
    }

    /// Собирает запрос, предварительно выкинув устаревшие события
    pub fn create_request<T: AsRef<str>, F: AsRef<str>>(
        &mut self,
        kind: &str,
        subjects: &[T],
        fields: &[F],
        overrides: &[Override],
        settings: &[Setting],
    ) -> Result<Request, SessionError> {
        let service = service_for_kind(kind);
        self.ensure_service(service)?;

        self.pump().reset();

        Ok(Request::builder(service, kind)
            .subjects(subjects)
            .fields(fields)
            .settings(settings)
            .overrides(overrides)
            .build())
    }

    /// Отправляет запрос; `correlation_id` нужен для multi-send
    pub fn send(
        &mut self,
        request: &Request,
        correlation_id: Option<CorrelationId>,
    ) -> Result<(), SessionError> {
        self.ensure_service(request.service())?;
        debug!("Sending Request:\n{request}");
        self.session
            .send_request(request, self.options.identity.as_ref(), correlation_id)?;
        Ok(())
    }

    /// Приём ответов, см. [`EventPump::receive`]
    pub fn receive(&mut self, expected_terminal_count: usize) -> Receive<'_, S> {
        self.pump().receive(expected_terminal_count)
    }

    fn ensure_service(&self, name: &str) -> Result<(), SessionError> {
        if !self.state.is_ready() {
            return Err(SessionError::InvalidState {
                action: "send requests",
                state: self.state.name(),
            });
        }
        if !self.services.contains_key(name) {
            return Err(SessionError::ServiceNotOpen {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    // Переход по событию; при любой ошибке состояние -> Disconnected
    fn advance(&mut self, ev: &Event, service: Option<&str>) -> Result<(), SessionError> {
        let state = mem::take(&mut self.state);
        let next = match ev.event_type() {
            EventType::SessionStatus => state.on_session_status(ev),
            EventType::ServiceStatus => state.on_service_status(service.unwrap_or_default(), ev),
            EventType::Timeout => Err(state.on_timeout(self.options.start_timeout)),
            other => Err(state.on_other(other)),
        };
        self.state = next?;
        Ok(())
    }
}

impl<S: Session> Drop for Connection<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn log_event(ev: &Event) {
    info!("Event Type: {}", ev.event_type());
    for msg in ev.messages() {
        debug!("Message Received:\n{msg}");
    }
}
