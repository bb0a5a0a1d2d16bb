use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{Document, decode};
use crate::element::ElementNode;

/// Классификация события
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    SessionStatus,
    ServiceStatus,
    Response,
    PartialResponse,
    Timeout,
    Request,
    Unknown,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::SessionStatus => "SESSION_STATUS",
            EventType::ServiceStatus => "SERVICE_STATUS",
            EventType::Response => "RESPONSE",
            EventType::PartialResponse => "PARTIAL_RESPONSE",
            EventType::Timeout => "TIMEOUT",
            EventType::Request => "REQUEST",
            EventType::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Непрозрачный токен, связывающий запрос с ответами на него
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u64> for CorrelationId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// Сообщение в том виде, в каком его доставил транспорт
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub correlation_ids: Vec<CorrelationId>,
    pub message_type: String,
    pub topic_name: String,
    pub element: ElementNode,
}

impl Message {
    pub fn new(message_type: impl Into<String>, element: ElementNode) -> Self {
        Self {
            correlation_ids: Vec::new(),
            message_type: message_type.into(),
            topic_name: String::new(),
            element,
        }
    }

    pub fn with_correlation(mut self, id: impl Into<CorrelationId>) -> Self {
        self.correlation_ids.push(id.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic_name = topic.into();
        self
    }

    /// Декодирует полезную нагрузку
    pub fn decode(&self) -> DecodedMessage {
        DecodedMessage {
            correlation_ids: self.correlation_ids.clone(),
            message_type: self.message_type.clone(),
            topic_name: self.topic_name.clone(),
            document: decode(&self.element),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.correlation_ids.is_empty() {
            let ids: Vec<&str> = self.correlation_ids.iter().map(CorrelationId::as_str).collect();
            writeln!(f, "CorrelationIds = [{}]", ids.join(", "))?;
        }
        write!(f, "{}", self.element)
    }
}

/// Сообщение после декодирования: то, что отдаёт [`crate::pump::Receive`]
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub correlation_ids: Vec<CorrelationId>,
    pub message_type: String,
    pub topic_name: String,
    pub document: Document,
}

/// Пачка сообщений одного типа
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    event_type: EventType,
    messages: Vec<Message>,
}

impl Event {
    pub fn new(event_type: EventType, messages: Vec<Message>) -> Self {
        Self {
            event_type,
            messages,
        }
    }

    /// Событие "ничего не пришло"
    pub fn timeout() -> Self {
        Self::new(EventType::Timeout, Vec::new())
    }

    /// Событие статуса с одним сообщением без полезной нагрузки
    pub fn status(event_type: EventType, message_type: &str) -> Self {
        let element = ElementNode::sequence(message_type, Vec::new());
        Self::new(event_type, vec![Message::new(message_type, element)])
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Есть ли сообщение данного типа
    pub fn has_message_type(&self, message_type: &str) -> bool {
        self.messages.iter().any(|m| m.message_type == message_type)
    }
}

impl IntoIterator for Event {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl<'a> IntoIterator for &'a Event {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SESSION_STARTED;

    #[test]
    fn event_type_names_match_wire_names() {
        assert_eq!(EventType::PartialResponse.to_string(), "PARTIAL_RESPONSE");
        assert_eq!(EventType::SessionStatus.to_string(), "SESSION_STATUS");
    }

    #[test]
    fn correlation_ids_order_like_dates() {
        let mut ids = vec![CorrelationId::from("20160626"), CorrelationId::from("20160625")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "20160625");
        assert_eq!(CorrelationId::from(7_u64).as_str(), "7");
    }

    #[test]
    fn status_event_carries_message_type() {
        let ev = Event::status(EventType::SessionStatus, SESSION_STARTED);
        assert!(ev.has_message_type(SESSION_STARTED));
        assert_eq!(ev.messages().len(), 1);
    }

    #[test]
    fn message_decode_keeps_metadata() {
        let msg = Message::new("ReferenceDataResponse", ElementNode::value("x", 1_i64))
            .with_correlation("20160625")
            .with_topic("IBM");
        let decoded = msg.decode();
        assert_eq!(decoded.correlation_ids, vec![CorrelationId::from("20160625")]);
        assert_eq!(decoded.message_type, "ReferenceDataResponse");
        assert_eq!(decoded.topic_name, "IBM");
    }
}
