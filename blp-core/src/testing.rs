//! Сессия-заглушка для тестов: события выдаются по сценарию.

use std::collections::VecDeque;
use std::time::Duration;

use crate::constants::{SERVICE_OPENED, SESSION_CONNECTION_UP, SESSION_STARTED};
use crate::error::TransportError;
use crate::event::{CorrelationId, Event, EventType};
use crate::request::Request;
use crate::session::{Identity, Session};

/// Каждое действие (start / open_service / send_request) выкладывает
/// в очередь следующую пачку событий из `replies`.
#[derive(Debug, Default)]
pub(crate) struct ScriptedSession {
    queue: VecDeque<Event>,
    replies: VecDeque<Vec<Event>>,
    pub(crate) start_result: bool,
    pub(crate) open_result: bool,
    pub(crate) opened: Vec<String>,
    pub(crate) sent: Vec<(Request, Option<CorrelationId>)>,
    pub(crate) stopped: usize,
}

impl ScriptedSession {
    pub(crate) fn with_queue(events: Vec<Event>) -> Self {
        Self {
            queue: events.into(),
            start_result: true,
            open_result: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_replies(replies: Vec<Vec<Event>>) -> Self {
        Self {
            replies: replies.into(),
            start_result: true,
            open_result: true,
            ..Self::default()
        }
    }

    /// Сценарий успешного подъёма с refdata + exrsvc, затем `replies`
    pub(crate) fn ready_then(replies: Vec<Vec<Event>>) -> Self {
        let mut all = vec![
            vec![
                Event::status(EventType::SessionStatus, SESSION_CONNECTION_UP),
                Event::status(EventType::SessionStatus, SESSION_STARTED),
            ],
            vec![Event::status(EventType::ServiceStatus, SERVICE_OPENED)],
            vec![Event::status(EventType::ServiceStatus, SERVICE_OPENED)],
        ];
        all.extend(replies);
        Self::with_replies(all)
    }

    pub(crate) fn push(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    fn release_next(&mut self) {
        if let Some(batch) = self.replies.pop_front() {
            self.queue.extend(batch);
        }
    }
}

impl Session for ScriptedSession {
    fn start(&mut self) -> Result<bool, TransportError> {
        self.release_next();
        Ok(self.start_result)
    }

    fn open_service(&mut self, name: &str) -> Result<bool, TransportError> {
        self.opened.push(name.to_string());
        self.release_next();
        Ok(self.open_result)
    }

    fn send_request(
        &mut self,
        request: &Request,
        _identity: Option<&Identity>,
        correlation_id: Option<CorrelationId>,
    ) -> Result<(), TransportError> {
        self.sent.push((request.clone(), correlation_id));
        self.release_next();
        Ok(())
    }

    fn next_event(&mut self, _timeout: Duration) -> Event {
        self.queue.pop_front().unwrap_or_else(Event::timeout)
    }

    fn try_next_event(&mut self) -> Option<Event> {
        self.queue.pop_front()
    }

    fn stop(&mut self) {
        self.stopped += 1;
    }
}
