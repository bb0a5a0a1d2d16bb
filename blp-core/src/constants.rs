use std::time::Duration;

/// Хост по умолчанию
pub const DEFAULT_HOST: &str = "localhost";

/// Порт по умолчанию
pub const DEFAULT_PORT: u16 = 8194;

/// Таймаут одного опроса очереди событий
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Таймаут ожидания событий при старте сессии и открытии сервисов
pub const START_TIMEOUT: Duration = Duration::from_secs(5);

/// Сервис справочных и исторических данных
pub const REFDATA_SERVICE: &str = "//blp/refdata";

/// Сервис поиска (SRCH)
pub const EXR_SERVICE: &str = "//blp/exrsvc";

pub const REFERENCE_DATA_REQUEST: &str = "ReferenceDataRequest";
pub const HISTORICAL_DATA_REQUEST: &str = "HistoricalDataRequest";
pub const INTRADAY_BAR_REQUEST: &str = "IntradayBarRequest";
pub const BEQS_REQUEST: &str = "BeqsRequest";
pub const EXCEL_GET_GRID_REQUEST: &str = "ExcelGetGridRequest";

/// Поле, которое по умолчанию перебирается в `*_history` запросах
pub const DEFAULT_DATE_FIELD: &str = "REFERENCE_DATE";

/// Подкатегория исключения поля, которая считается фатальной
pub const INVALID_FIELD: &str = "INVALID_FIELD";

// типы сообщений статуса сессии/сервиса
pub const SESSION_CONNECTION_UP: &str = "SessionConnectionUp";
pub const SESSION_STARTED: &str = "SessionStarted";
pub const SESSION_STARTUP_FAILURE: &str = "SessionStartupFailure";
pub const SESSION_TERMINATED: &str = "SessionTerminated";
pub const SERVICE_OPENED: &str = "ServiceOpened";
pub const SERVICE_OPEN_FAILURE: &str = "ServiceOpenFailure";

/// Сервис, которому адресуется запрос данного вида
pub fn service_for_kind(kind: &str) -> &'static str {
    match kind {
        EXCEL_GET_GRID_REQUEST => EXR_SERVICE,
        _ => REFDATA_SERVICE,
    }
}
