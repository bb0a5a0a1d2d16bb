use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::event::EventType;
use crate::validate::Shape;

/// Верхнеуровневый тип ошибок крейта
#[derive(Debug, Error)]
pub enum BlpError {
    /// Сессия или сервис не поднялись
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Ошибки очереди событий
    #[error(transparent)]
    Pump(#[from] PumpError),

    /// Ошибки в содержимом ответа
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Ошибки сериализации
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Пустой список дат для `*_history` запросов
    #[error("dates must be non empty")]
    EmptyDates,
}

/// Ошибки жизненного цикла сессии (ConnectionError)
#[derive(Debug, Error)]
pub enum SessionError {
    /// Транспорт отказался стартовать или прислал отказ
    #[error("could not start session: {reason}")]
    StartFailed { reason: String },

    /// Сервис не открылся
    #[error("could not open service {name}")]
    ServiceOpenFailed { name: String },

    /// Во время handshake пришло событие не того типа
    #[error("expected a {expected} event but received {got} (state: {state})")]
    UnexpectedEvent {
        expected: EventType,
        got: EventType,
        state: &'static str,
    },

    /// Handshake не уложился в таймаут
    #[error("timed out after {waited:?} waiting for {expected} (state: {state})")]
    HandshakeTimeout {
        expected: EventType,
        waited: Duration,
        state: &'static str,
    },

    /// Операция недопустима в текущем состоянии
    #[error("cannot {action} while session is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    /// Запрос адресован сервису, который не открыт
    #[error("service {name} is not open")]
    ServiceNotOpen { name: String },

    /// Переданная извне сессия уже содержит события
    #[error("flush event queue of the session prior to adoption (got {event_type} event)")]
    QueueNotEmpty { event_type: EventType },

    /// Ошибки транспорта
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Ошибки приёма событий
#[derive(Debug, Error)]
pub enum PumpError {
    /// Нет событий в течение таймаута
    #[error("timeout after {waited:?}, increase the session timeout")]
    Timeout { waited: Duration },

    /// Событие вне ожидаемого набора (рассинхрон протокола)
    #[error("unexpected event type: {event_type}")]
    UnexpectedEvent { event_type: EventType },

    /// Сообщение с неизвестным correlation id
    #[error("message carries no known correlation id: {ids:?}")]
    UnknownCorrelation { ids: Vec<String> },
}

/// Ошибки содержимого ответа
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Инструмент не распознан
    #[error("unknown security {security:?}")]
    Security { security: String },

    /// Поле не прошло валидацию (INVALID_FIELD)
    #[error("{field}: INVALID_FIELD")]
    FieldException { field: String },

    /// Исключение поля в историческом ответе, любой подкатегории
    #[error("{field}: {subcategory}")]
    HistoryFieldException { field: String, subcategory: String },

    /// Форма поля не совпала с ожидаемой
    #[error("field {field:?} is not {expected} data")]
    BulkFieldMismatch { field: String, expected: Shape },

    /// Сервис отклонил запрос целиком
    #[error("response error ({category}): {message}")]
    ResponseError { category: String, message: String },

    /// В ответе нет обязательной части
    #[error("malformed response: missing {what}")]
    Malformed { what: String },
}

/// Ошибки транспорта
#[derive(Debug, Error)]
pub enum TransportError {
    /// Соединение закрыто
    #[error("transport disconnected")]
    Disconnected,

    /// Ошибки ввода/вывода
    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ошибки сериализации
#[derive(Debug, Error)]
pub enum WireError {
    /// Пакет слишком короткий (нет байта версии)
    #[error("packet too short")]
    PacketTooShort,

    /// Неверная версия протокола
    #[error("unsupported wire version: {0}")]
    UnsupportedWireVersion(u8),

    /// Кадр больше допустимого
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    /// Ошибка сериализации/десериализации
    #[error("postcard encode/decode error: {0}")]
    Postcard(#[from] postcard::Error),

    /// Ошибки ввода/вывода при чтении/записи кадра
    #[error("frame io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ошибки разбора элемента
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ElementError {
    /// Элемент не скалярный
    #[error("element {0} is not a scalar")]
    NotAScalar(String),

    /// Элемент не choice
    #[error("element {0} is not a choice")]
    NotAChoice(String),

    /// Значение нельзя извлечь
    #[error("element {0} holds a malformed value")]
    Malformed(String),
}

/// Ошибка запроса вместе со строками, полученными до сбоя
#[derive(Debug)]
pub struct QueryError<R> {
    /// Причина
    pub kind: BlpError,
    /// Строки, разобранные до ошибки
    pub partial: Vec<R>,
}

impl<R> QueryError<R> {
    pub fn new(kind: impl Into<BlpError>, partial: Vec<R>) -> Self {
        Self {
            kind: kind.into(),
            partial,
        }
    }
}

impl<R> fmt::Display for QueryError<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.partial.is_empty() {
            write!(f, " ({} rows received before failure)", self.partial.len())?;
        }
        Ok(())
    }
}

impl<R: fmt::Debug> std::error::Error for QueryError<R> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl<R> From<BlpError> for QueryError<R> {
    fn from(kind: BlpError) -> Self {
        Self::new(kind, Vec::new())
    }
}

impl<R> From<SessionError> for QueryError<R> {
    fn from(e: SessionError) -> Self {
        Self::new(e, Vec::new())
    }
}

impl<R> From<PumpError> for QueryError<R> {
    fn from(e: PumpError) -> Self {
        Self::new(e, Vec::new())
    }
}

impl<R> From<ValidationError> for QueryError<R> {
    fn from(e: ValidationError) -> Self {
        Self::new(e, Vec::new())
    }
}
