use std::time::Duration;

use crate::constants::{
    SERVICE_OPEN_FAILURE, SESSION_STARTUP_FAILURE, SESSION_TERMINATED,
};
use crate::error::SessionError;
use crate::event::{Event, EventType};

/// Состояние подъёма сессии.
///
/// Переходы: по одной функции на вид события; всё, что не описано,
/// возвращает ошибку.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// Старт запрошен, ждём первый SessionStatus (соединение поднято)
    Starting { required: Vec<String> },
    /// Ждём второй SessionStatus (сессия готова к работе)
    AwaitingSessionUp { required: Vec<String> },
    /// Открываем сервисы; `pending`: ещё не открытые обязательные
    ServicesOpening { pending: Vec<String> },
    Ready,
    Stopped,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Starting { .. } => "Starting",
            SessionState::AwaitingSessionUp { .. } => "AwaitingSessionUp",
            SessionState::ServicesOpening { .. } => "ServicesOpening",
            SessionState::Ready => "Ready",
            SessionState::Stopped => "Stopped",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    /// Событие, которого ждёт состояние
    pub fn expected_event(&self) -> EventType {
        match self {
            SessionState::Starting { .. } | SessionState::AwaitingSessionUp { .. } => {
                EventType::SessionStatus
            }
            SessionState::ServicesOpening { .. } | SessionState::Ready => EventType::ServiceStatus,
            SessionState::Disconnected | SessionState::Stopped => EventType::Unknown,
        }
    }

    /// Disconnected -> Starting
    pub fn begin_start(self, required: Vec<String>) -> Result<Self, SessionError> {
        match self {
            SessionState::Disconnected => Ok(SessionState::Starting { required }),
            other => Err(SessionError::InvalidState {
                action: "start",
                state: other.name(),
            }),
        }
    }

    /// Можно ли сейчас открывать сервис
    pub fn can_open_service(&self) -> bool {
        matches!(
            self,
            SessionState::ServicesOpening { .. } | SessionState::Ready
        )
    }

    pub fn on_session_status(self, event: &Event) -> Result<Self, SessionError> {
        for failure in [SESSION_STARTUP_FAILURE, SESSION_TERMINATED] {
            if event.has_message_type(failure) {
                return Err(SessionError::StartFailed {
                    reason: failure.to_string(),
                });
            }
        }

        match self {
            SessionState::Starting { required } => Ok(SessionState::AwaitingSessionUp { required }),
            SessionState::AwaitingSessionUp { required } if required.is_empty() => {
                Ok(SessionState::Ready)
            }
            SessionState::AwaitingSessionUp { required } => {
                Ok(SessionState::ServicesOpening { pending: required })
            }
            other => Err(other.on_other(EventType::SessionStatus)),
        }
    }

    pub fn on_service_status(self, service: &str, event: &Event) -> Result<Self, SessionError> {
        if event.has_message_type(SERVICE_OPEN_FAILURE) {
            return Err(SessionError::ServiceOpenFailed {
                name: service.to_string(),
            });
        }

        match self {
            SessionState::ServicesOpening { mut pending } => {
                pending.retain(|s| s != service);
                if pending.is_empty() {
                    Ok(SessionState::Ready)
                } else {
                    Ok(SessionState::ServicesOpening { pending })
                }
            }
            // дополнительный сервис на готовой сессии
            SessionState::Ready => Ok(SessionState::Ready),
            other => Err(other.on_other(EventType::ServiceStatus)),
        }
    }

    pub fn on_timeout(self, waited: Duration) -> SessionError {
        SessionError::HandshakeTimeout {
            expected: self.expected_event(),
            waited,
            state: self.name(),
        }
    }

    pub fn on_other(self, got: EventType) -> SessionError {
        SessionError::UnexpectedEvent {
            expected: self.expected_event(),
            got,
            state: self.name(),
        }
    }

    /// Из любого состояния
    pub fn stop(self) -> Self {
        SessionState::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SERVICE_OPENED, SESSION_CONNECTION_UP, SESSION_STARTED};

    fn required() -> Vec<String> {
        vec!["//blp/refdata".to_string(), "//blp/exrsvc".to_string()]
    }

    fn session_status(kind: &str) -> Event {
        Event::status(EventType::SessionStatus, kind)
    }

    fn service_status(kind: &str) -> Event {
        Event::status(EventType::ServiceStatus, kind)
    }

    #[test]
    fn full_bring_up_reaches_ready() {
        let st = SessionState::Disconnected.begin_start(required()).unwrap();
        let st = st.on_session_status(&session_status(SESSION_CONNECTION_UP)).unwrap();
        assert_eq!(st.name(), "AwaitingSessionUp");
        let st = st.on_session_status(&session_status(SESSION_STARTED)).unwrap();
        assert!(st.can_open_service());

        let st = st
            .on_service_status("//blp/refdata", &service_status(SERVICE_OPENED))
            .unwrap();
        assert!(!st.is_ready());
        let st = st
            .on_service_status("//blp/exrsvc", &service_status(SERVICE_OPENED))
            .unwrap();
        assert!(st.is_ready());
    }

    #[test]
    fn no_required_services_is_ready_after_session_up() {
        let st = SessionState::Disconnected.begin_start(Vec::new()).unwrap();
        let st = st.on_session_status(&session_status(SESSION_CONNECTION_UP)).unwrap();
        let st = st.on_session_status(&session_status(SESSION_STARTED)).unwrap();
        assert!(st.is_ready());
    }

    #[test]
    fn start_twice_is_rejected() {
        let st = SessionState::Ready;
        let err = st.begin_start(required()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                action: "start",
                state: "Ready"
            }
        ));
    }

    #[test]
    fn startup_failure_message_fails_transition() {
        let st = SessionState::Disconnected.begin_start(required()).unwrap();
        let err = st
            .on_session_status(&session_status(SESSION_STARTUP_FAILURE))
            .unwrap_err();
        assert!(matches!(err, SessionError::StartFailed { .. }));
    }

    #[test]
    fn service_status_while_starting_is_unexpected() {
        let st = SessionState::Disconnected.begin_start(required()).unwrap();
        let err = st
            .on_service_status("//blp/refdata", &service_status(SERVICE_OPENED))
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::UnexpectedEvent {
                expected: EventType::SessionStatus,
                got: EventType::ServiceStatus,
                ..
            }
        ));
    }

    #[test]
    fn service_open_failure_names_service() {
        let st = SessionState::ServicesOpening { pending: required() };
        let err = st
            .on_service_status("//blp/exrsvc", &service_status(SERVICE_OPEN_FAILURE))
            .unwrap_err();
        assert!(matches!(err, SessionError::ServiceOpenFailed { name } if name == "//blp/exrsvc"));
    }

    #[test]
    fn timeout_reports_expected_event() {
        let st = SessionState::AwaitingSessionUp { required: required() };
        let err = st.on_timeout(Duration::from_millis(10));
        assert!(matches!(
            err,
            SessionError::HandshakeTimeout {
                expected: EventType::SessionStatus,
                state: "AwaitingSessionUp",
                ..
            }
        ));
    }

    #[test]
    fn stop_from_any_state() {
        assert_eq!(SessionState::Ready.stop(), SessionState::Stopped);
        assert_eq!(SessionState::Stopped.stop(), SessionState::Stopped);
        assert_eq!(
            SessionState::Starting { required: required() }.stop(),
            SessionState::Stopped
        );
    }
}
