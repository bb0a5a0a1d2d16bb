use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT, EXR_SERVICE, REFDATA_SERVICE, START_TIMEOUT,
};
use crate::error::TransportError;
use crate::event::{CorrelationId, Event};
use crate::request::Request;

/// Контракт транспорта.
///
/// Сеть и протокол живут за этим трейтом; ядру нужен только
/// последовательный источник событий с опросом по таймауту.
pub trait Session {
    /// `true`, если handshake начался (его исход придёт событиями)
    fn start(&mut self) -> Result<bool, TransportError>;

    fn open_service(&mut self, name: &str) -> Result<bool, TransportError>;

    fn send_request(
        &mut self,
        request: &Request,
        identity: Option<&Identity>,
        correlation_id: Option<CorrelationId>,
    ) -> Result<(), TransportError>;

    /// Следующее событие; по истечении `timeout` приходит событие `Timeout`
    fn next_event(&mut self, timeout: Duration) -> Event;

    /// Неблокирующий вариант: `None`, если очередь пуста
    fn try_next_event(&mut self) -> Option<Event>;

    fn stop(&mut self);
}

/// Удостоверение для авторизации запросов (SAPI/B-Pipe)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

/// Открытый удалённый сервис
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    name: String,
}

impl Service {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Настройки сессии
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub host: String,
    pub port: u16,
    /// Таймаут одного опроса очереди при приёме ответов
    pub timeout: Duration,
    /// Таймаут ожидания статусов при старте и открытии сервисов
    pub start_timeout: Duration,
    /// Сервисы, без которых сессия не считается готовой
    pub services: Vec<String>,
    pub identity: Option<Identity>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            start_timeout: START_TIMEOUT,
            services: vec![REFDATA_SERVICE.to_string(), EXR_SERVICE.to_string()],
            identity: None,
        }
    }
}

impl SessionOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn with_services<S: AsRef<str>>(mut self, services: &[S]) -> Self {
        self.services = services.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
