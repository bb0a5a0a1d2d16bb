use std::collections::VecDeque;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::PumpError;
use crate::event::{DecodedMessage, EventType};
use crate::session::Session;

/// Опрос очереди событий одной сессии.
///
/// Держит `&mut` на сессию: пока живёт помпа (или её [`Receive`]),
/// второй приём на той же сессии не запустить.
pub struct EventPump<'a, S: Session> {
    session: &'a mut S,
    timeout: Duration,
}

impl<'a, S: Session> EventPump<'a, S> {
    pub fn new(session: &'a mut S, timeout: Duration) -> Self {
        Self { session, timeout }
    }

    /// Выбрасывает события, оставшиеся от прошлого (упавшего) запроса.
    /// Возвращает число выброшенных событий.
    pub fn reset(&mut self) -> usize {
        let mut dropped = 0;
        while let Some(ev) = self.session.try_next_event() {
            debug!("dropping stale {} event", ev.event_type());
            dropped += 1;
        }
        if dropped > 0 {
            warn!("dropped {dropped} stale events before building a new request");
        }
        dropped
    }

    /// Ленивая последовательность декодированных сообщений.
    ///
    /// Заканчивается после `expected_terminal_count` событий `Response`.
    pub fn receive(self, expected_terminal_count: usize) -> Receive<'a, S> {
        Receive {
            session: self.session,
            timeout: self.timeout,
            remaining: expected_terminal_count,
            buffered: VecDeque::new(),
            failed: false,
        }
    }
}

/// Итератор приёма, см. [`EventPump::receive`]
pub struct Receive<'a, S: Session> {
    session: &'a mut S,
    timeout: Duration,
    remaining: usize,
    // сообщения текущего события, ещё не отданные
    buffered: VecDeque<DecodedMessage>,
    failed: bool,
}

impl<S: Session> Receive<'_, S> {
    /// Сколько ещё `Response` осталось дождаться
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<S: Session> Iterator for Receive<'_, S> {
    type Item = Result<DecodedMessage, PumpError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(msg) = self.buffered.pop_front() {
                return Some(Ok(msg));
            }
            if self.failed || self.remaining == 0 {
                return None;
            }

            let event = self.session.next_event(self.timeout);
            let event_type = event.event_type();
            info!("Event Type: {event_type}");

            match event_type {
                EventType::Response | EventType::PartialResponse => {
                    if event_type == EventType::Response {
                        self.remaining -= 1;
                    }
                    for msg in event.messages() {
                        debug!("Message Received:\n{msg}");
                        self.buffered.push_back(msg.decode());
                    }
                }
                EventType::Timeout => {
                    warn!("Unexpected Event Type: {event_type}");
                    self.failed = true;
                    return Some(Err(PumpError::Timeout {
                        waited: self.timeout,
                    }));
                }
                other => {
                    warn!("Unexpected Event Type: {other}");
                    for msg in event.messages() {
                        warn!("Message Received:\n{msg}");
                    }
                    self.failed = true;
                    return Some(Err(PumpError::UnexpectedEvent { event_type: other }));
                }
            }
        }
    }
}
