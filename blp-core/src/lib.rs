//! # blp-core
//!
//! Клиентское ядро сессии для сервиса рыночных данных в стиле запрос/ответ.
//!
//! Этот крейт содержит:
//!
//! - [`connection`] и [`lifecycle`] — подъём сессии и сервисов как явная машина состояний
//! - [`request`] — построение запросов (`ReferenceDataRequest`, ...)
//! - [`pump`] и [`correlation`] — опрос очереди событий и сборка ответов по correlation id
//! - [`element`] и [`document`] — самоописываемое дерево ответа и его декодер
//! - [`validate`] — ошибки по инструментам и полям поверх декодированного дерева
//! - [`query`] — готовые виды запросов (`reference`, `bdh`, `ref_hist`, ...)
//! - [`wire`], [`channel`], [`transport`] — кадры по TCP и адаптеры транспорта
//! - [`subjects`] — чтение списка инструментов из текста/файла
//!
//! ## Быстрый пример: декодирование ответа
//!
//! ```rust
//! use blp_core::document::{decode, Document};
//! use blp_core::element::{ElementNode, Value};
//!
//! let root = ElementNode::sequence(
//!     "fieldData",
//!     vec![ElementNode::value("PX_LAST", 140.5), ElementNode::value("NAME", "IBM")],
//! );
//! let doc = decode(&root);
//! assert_eq!(doc.get("PX_LAST"), Some(&Document::Scalar(Value::Float(140.5))));
//! assert_eq!(doc.get("NAME").and_then(Document::as_str), Some("IBM"));
//! ```
//!
//! ## Пример: чтение инструментов
//!
//! ```rust
//! use blp_core::subjects::read_subjects;
//! use std::io::Cursor;
//!
//! let input = "IBM US Equity\n# comment\n AUD Curncy \nIBM US Equity\n";
//! let subjects = read_subjects(Cursor::new(input)).unwrap();
//! assert_eq!(subjects, vec!["IBM US Equity".to_string(), "AUD Curncy".to_string()]);
//! ```
//!
//! ## Пример: wire-формат
//!
//! ```rust
//! use blp_core::wire::{encode_v1, decode, ClientFrame};
//!
//! let frame = ClientFrame::OpenService { name: "//blp/refdata".to_string() };
//! let bytes = encode_v1(&frame).unwrap();
//! assert_eq!(decode::<ClientFrame>(&bytes).unwrap(), frame);
//! ```
//!
//! ## Дизайн
//!
//! Ядро не знает о сети: транспорт спрятан за трейтом [`Session`], а всё,
//! что выше него (состояния, помпа, декодер, валидация), работает с любой
//! реализацией, в том числе со сценарной сессией в тестах.
//! Один потребитель на сессию: приём заимствует соединение через `&mut`.

#![forbid(unsafe_code)]

/// Владеющее дерево элементов и трейт интроспекции.
pub mod element;

/// Декодер элемента в [`document::Document`].
pub mod document;

/// События, сообщения, correlation id.
pub mod event;

/// Запросы и их построение.
pub mod request;

/// Контракт транспорта и настройки сессии.
pub mod session;

/// Машина состояний подъёма сессии.
pub mod lifecycle;

/// Сессия вместе с жизненным циклом.
pub mod connection;

/// Опрос очереди событий.
pub mod pump;

/// Учёт correlation id.
pub mod correlation;

/// Проверка ответов и извлечение полей.
pub mod validate;

/// Строки результатов.
pub mod rows;

/// Виды запросов.
pub mod query;

/// Построение ответов на стороне хоста.
pub mod responses;

/// Кадры поверх TCP.
pub mod wire;

/// Сессия поверх каналов.
pub mod channel;

/// TCP-транспорт.
pub mod transport;

/// Чтение списка инструментов.
pub mod subjects;

/// Ошибки `blp-core`.
pub mod error;

/// Общие константы
pub mod constants;

#[cfg(test)]
mod testing;

// --- Re-exports (публичный фасад API) ---

pub use crate::connection::Connection;
pub use crate::document::Document;
pub use crate::element::{Element, ElementNode, Value};
pub use crate::error::{BlpError, PumpError, QueryError, SessionError, ValidationError, WireError};
pub use crate::event::{CorrelationId, DecodedMessage, Event, EventType, Message};
pub use crate::request::{Override, Request, Setting};
pub use crate::session::{Identity, Service, Session, SessionOptions};
