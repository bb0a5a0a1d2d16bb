//! Виды запросов поверх [`Connection`]: запрос -> отправка -> приём -> разбор.
//!
//! Каждый метод возвращает все строки либо [`QueryError`], в котором лежат
//! строки, разобранные до сбоя.

use log::debug;

use crate::connection::Connection;
use crate::constants::{
    BEQS_REQUEST, EXCEL_GET_GRID_REQUEST, HISTORICAL_DATA_REQUEST, INTRADAY_BAR_REQUEST,
    REFERENCE_DATA_REQUEST,
};
use crate::correlation::CorrelationTracker;
use crate::document::Document;
use crate::element::Value;
use crate::error::{BlpError, QueryError, ValidationError};
use crate::event::{CorrelationId, DecodedMessage};
use crate::pump::Receive;
use crate::request::{Override, Setting};
use crate::rows::{Bar, BulkRow, DatedRow, HistRow, RefRow, ScreenRow, SearchRow};
use crate::session::Session;
use crate::validate::{
    Shape, bulk_rows, check_response_error, field_data, lookup, record_pairs,
    reject_field_exceptions, scalar_field, security_records, validate_record,
};

const NONE: &[&str] = &[];

/// Параметры скрина EQS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub name: String,
    pub screen_type: String,
    pub group: String,
    pub language_id: String,
    /// Дата `YYYYmmdd` для point-in-time скрина
    pub asof: Option<String>,
}

impl Screen {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            screen_type: "PRIVATE".to_string(),
            group: "General".to_string(),
            language_id: "ENGLISH".to_string(),
            asof: None,
        }
    }

    pub fn screen_type(mut self, screen_type: impl Into<String>) -> Self {
        self.screen_type = screen_type.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn language(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = language_id.into();
        self
    }

    pub fn asof(mut self, date: impl Into<String>) -> Self {
        self.asof = Some(date.into());
        self
    }
}

/// Параметры `IntradayBarRequest`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarQuery {
    pub ticker: String,
    /// `YYYY-mm-ddTHH:MM:SS`, UTC
    pub start: String,
    pub end: String,
    /// TRADE, BID, ASK, ...
    pub event_type: String,
    /// Длина бара в минутах, 1..=1440
    pub interval: u32,
}

fn finish<R>(rows: Vec<R>, outcome: Result<(), BlpError>) -> Result<Vec<R>, QueryError<R>> {
    match outcome {
        Ok(()) => Ok(rows),
        Err(kind) => Err(QueryError::new(kind, rows)),
    }
}

// Прогоняет все сообщения через `on_msg`, останавливаясь на первой ошибке
fn drain<S: Session>(
    rx: Receive<'_, S>,
    mut on_msg: impl FnMut(&DecodedMessage) -> Result<(), BlpError>,
) -> Result<(), BlpError> {
    for msg in rx {
        on_msg(&msg?)?;
    }
    Ok(())
}

fn names<F: AsRef<str>>(fields: &[F]) -> Vec<String> {
    fields.iter().map(|f| f.as_ref().to_string()).collect()
}

fn parse_reference(
    doc: &Document,
    fields: &[String],
    rows: &mut Vec<RefRow>,
) -> Result<(), ValidationError> {
    for record in security_records(doc)? {
        let ticker = validate_record(record)?;
        let fd = field_data(record)?;
        for field in fields {
            let value = scalar_field(fd, field)?;
            rows.push(RefRow {
                ticker: ticker.to_string(),
                field: field.clone(),
                value,
            });
        }
    }
    Ok(())
}

fn parse_bulk_reference(
    doc: &Document,
    fields: &[String],
    rows: &mut Vec<BulkRow>,
) -> Result<(), ValidationError> {
    for record in security_records(doc)? {
        let ticker = validate_record(record)?;
        let fd = field_data(record)?;
        for field in fields {
            rows.extend(bulk_rows(ticker, fd, field)?);
        }
    }
    Ok(())
}

fn parse_history(doc: &Document, rows: &mut Vec<HistRow>) -> Result<(), ValidationError> {
    for record in security_records(doc)? {
        let ticker = validate_record(record)?;
        reject_field_exceptions(record)?;
        // нет данных за период: fieldData приходит пустой записью
        let entries = field_data(record)?.as_sequence().unwrap_or(&[]);
        for entry in entries {
            let date = entry
                .get("date")
                .and_then(Document::as_value)
                .cloned()
                .unwrap_or(Value::Null);
            for (field, value) in entry.as_mapping().unwrap_or(&[]) {
                if field == "date" {
                    continue;
                }
                let value = value.as_value().cloned().ok_or_else(|| {
                    ValidationError::BulkFieldMismatch {
                        field: field.clone(),
                        expected: Shape::Scalar,
                    }
                })?;
                rows.push(HistRow {
                    date: date.clone(),
                    ticker: ticker.to_string(),
                    field: field.clone(),
                    value,
                });
            }
        }
    }
    Ok(())
}

fn number<'a>(bar: &'a Document, key: &str) -> Result<&'a Value, ValidationError> {
    bar.get(key)
        .and_then(Document::as_value)
        .filter(|v| !v.is_null())
        .ok_or_else(|| ValidationError::Malformed {
            what: format!("barTickData.{key}"),
        })
}

fn parse_bar(bar: &Document) -> Result<Bar, ValidationError> {
    let float = |key: &str| -> Result<f64, ValidationError> {
        number(bar, key)?.as_f64().ok_or_else(|| ValidationError::Malformed {
            what: format!("numeric barTickData.{key}"),
        })
    };
    let int = |key: &str| -> Result<i64, ValidationError> {
        number(bar, key)?.as_i64().ok_or_else(|| ValidationError::Malformed {
            what: format!("integer barTickData.{key}"),
        })
    };
    Ok(Bar {
        time: number(bar, "time")?.to_string(),
        open: float("open")?,
        high: float("high")?,
        low: float("low")?,
        close: float("close")?,
        volume: int("volume")?,
        num_events: int("numEvents")?,
    })
}

fn parse_bars(doc: &Document, bars: &mut Vec<Bar>) -> Result<(), ValidationError> {
    check_response_error(doc)?;
    let ticks = lookup(doc, "barData")
        .and_then(|d| d.get("barTickData"))
        .and_then(Document::as_sequence)
        .ok_or_else(|| ValidationError::Malformed {
            what: "barData.barTickData".to_string(),
        })?;
    for tick in ticks {
        bars.push(parse_bar(tick)?);
    }
    Ok(())
}

// Значение ячейки таблицы SRCH: выбранный вариант или `StringValue`
fn grid_value(cell: &Document) -> Option<String> {
    let value = match cell {
        Document::Choice(_, inner) => inner.as_value(),
        other => other.get("StringValue").and_then(Document::as_value),
    }?;
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_grid(doc: &Document, rows: &mut Vec<SearchRow>) -> Result<(), ValidationError> {
    check_response_error(doc)?;
    let records = lookup(doc, "DataRecords")
        .and_then(Document::as_sequence)
        .ok_or_else(|| ValidationError::Malformed {
            what: "DataRecords".to_string(),
        })?;
    for record in records {
        let cells = record
            .get("DataFields")
            .and_then(Document::as_sequence)
            .unwrap_or(&[]);
        rows.extend(cells.iter().filter_map(grid_value).map(|ticker| SearchRow { ticker }));
    }
    Ok(())
}

fn parse_screen(
    msg: &DecodedMessage,
    rows: &mut Vec<ScreenRow>,
) -> Result<(), ValidationError> {
    let doc = &msg.document;
    check_response_error(doc)?;
    let data = lookup(doc, "data").ok_or_else(|| ValidationError::Malformed {
        what: "data".to_string(),
    })?;
    let asof = msg.correlation_ids.first().cloned();

    for record in security_records(data)? {
        let ticker = validate_record(record)?;
        let fd = field_data(record)?;
        for (field, doc) in fd.as_mapping().unwrap_or(&[]) {
            let mut push = |value: Value| {
                rows.push(ScreenRow {
                    ticker: ticker.to_string(),
                    field: field.clone(),
                    value,
                    asof: asof.clone(),
                })
            };
            match doc {
                // массив раскладывается поэлементно, каждый подэлемент отдельной строкой
                Document::Sequence(items) => {
                    for item in items {
                        for (_, value) in record_pairs(item) {
                            push(value);
                        }
                    }
                }
                Document::Scalar(value) => push(value.clone()),
                other => debug!("skipping non-scalar screen field {field}: {other:?}"),
            }
        }
    }
    Ok(())
}

fn dated<T>(tracker: CorrelationTracker<T>) -> Vec<DatedRow<T>> {
    tracker
        .into_results()
        .flat_map(|(date, rows)| {
            rows.into_iter().map(move |row| DatedRow {
                date: date.clone(),
                row,
            })
        })
        .collect()
}

impl<S: Session> Connection<S> {
    /// Справочные (скалярные) поля: строка на пару (инструмент, поле)
    pub fn reference<T: AsRef<str>, F: AsRef<str>>(
        &mut self,
        tickers: &[T],
        fields: &[F],
        overrides: &[Override],
    ) -> Result<Vec<RefRow>, QueryError<RefRow>> {
        let request = self.create_request(REFERENCE_DATA_REQUEST, tickers, fields, overrides, &[])?;
        self.send(&request, None)?;

        let fields = names(fields);
        let mut rows = Vec::new();
        let outcome = drain(self.receive(1), |msg| {
            Ok(parse_reference(&msg.document, &fields, &mut rows)?)
        });
        finish(rows, outcome)
    }

    /// Bulk-поля: строка на элемент массива
    pub fn bulk_reference<T: AsRef<str>, F: AsRef<str>>(
        &mut self,
        tickers: &[T],
        fields: &[F],
        overrides: &[Override],
    ) -> Result<Vec<BulkRow>, QueryError<BulkRow>> {
        let request = self.create_request(REFERENCE_DATA_REQUEST, tickers, fields, overrides, &[])?;
        self.send(&request, None)?;

        let fields = names(fields);
        let mut rows = Vec::new();
        let outcome = drain(self.receive(1), |msg| {
            Ok(parse_bulk_reference(&msg.document, &fields, &mut rows)?)
        });
        finish(rows, outcome)
    }

    /// Исторические данные за `[start_date, end_date]` (`YYYYmmdd`).
    ///
    /// `elms`: дополнительные настройки запроса, например `periodicitySelection`.
    pub fn bdh<T: AsRef<str>, F: AsRef<str>>(
        &mut self,
        tickers: &[T],
        fields: &[F],
        start_date: &str,
        end_date: &str,
        elms: &[Setting],
        overrides: &[Override],
    ) -> Result<Vec<HistRow>, QueryError<HistRow>> {
        let mut settings = vec![
            Setting::new("startDate", start_date),
            Setting::new("endDate", end_date),
        ];
        settings.extend_from_slice(elms);

        let request =
            self.create_request(HISTORICAL_DATA_REQUEST, tickers, fields, overrides, &settings)?;
        self.send(&request, None)?;

        let mut rows = Vec::new();
        let outcome = drain(self.receive(1), |msg| {
            Ok(parse_history(&msg.document, &mut rows)?)
        });
        finish(rows, outcome)
    }

    /// Справочные поля на каждую дату из `dates`.
    ///
    /// Один и тот же запрос уходит по разу на дату: дата подставляется в
    /// override `date_field` и служит correlation id. Строки отсортированы по дате.
    pub fn ref_hist<T: AsRef<str>, F: AsRef<str>, D: AsRef<str>>(
        &mut self,
        tickers: &[T],
        fields: &[F],
        dates: &[D],
        overrides: &[Override],
        date_field: &str,
    ) -> Result<Vec<DatedRow<RefRow>>, QueryError<DatedRow<RefRow>>> {
        let tracker: CorrelationTracker<RefRow> =
            self.send_per_date(tickers, fields, dates, overrides, date_field)?;
        let fields = names(fields);
        self.collect_dated(tracker, |doc, rows| parse_reference(doc, &fields, rows))
    }

    /// Bulk-поля на каждую дату; сортировка по (дата, позиция)
    pub fn bulkref_hist<T: AsRef<str>, F: AsRef<str>, D: AsRef<str>>(
        &mut self,
        tickers: &[T],
        fields: &[F],
        dates: &[D],
        overrides: &[Override],
        date_field: &str,
    ) -> Result<Vec<DatedRow<BulkRow>>, QueryError<DatedRow<BulkRow>>> {
        let tracker: CorrelationTracker<BulkRow> =
            self.send_per_date(tickers, fields, dates, overrides, date_field)?;
        let fields = names(fields);
        let mut rows =
            self.collect_dated(tracker, |doc, rows| parse_bulk_reference(doc, &fields, rows))?;
        rows.sort_by(|a, b| (&a.date, a.row.position).cmp(&(&b.date, b.row.position)));
        Ok(rows)
    }

    /// Внутридневные бары одного инструмента, по возрастанию времени
    pub fn bdib(
        &mut self,
        query: &BarQuery,
        elms: &[Setting],
    ) -> Result<Vec<Bar>, QueryError<Bar>> {
        let mut settings = vec![
            Setting::new("security", query.ticker.as_str()),
            Setting::new("eventType", query.event_type.as_str()),
            Setting::new("interval", query.interval),
            Setting::new("startDateTime", query.start.as_str()),
            Setting::new("endDateTime", query.end.as_str()),
        ];
        settings.extend_from_slice(elms);

        let request = self.create_request(INTRADAY_BAR_REQUEST, NONE, NONE, &[], &settings)?;
        self.send(&request, None)?;

        let mut bars = Vec::new();
        let outcome = drain(self.receive(1), |msg| Ok(parse_bars(&msg.document, &mut bars)?));
        bars.sort_by(|a, b| a.time.cmp(&b.time));
        finish(bars, outcome)
    }

    /// Тикеры из SRCH-домена вида `COMDTY:NGFLOW`
    pub fn bsrch(&mut self, domain: &str) -> Result<Vec<SearchRow>, QueryError<SearchRow>> {
        let settings = [Setting::new("Domain", domain)];
        let request = self.create_request(EXCEL_GET_GRID_REQUEST, NONE, NONE, &[], &settings)?;
        self.send(&request, None)?;

        let mut rows = Vec::new();
        let outcome = drain(self.receive(1), |msg| Ok(parse_grid(&msg.document, &mut rows)?));
        finish(rows, outcome)
    }

    /// Результаты сохранённого скрина EQS
    pub fn beqs(&mut self, screen: &Screen) -> Result<Vec<ScreenRow>, QueryError<ScreenRow>> {
        let settings = [
            Setting::new("screenName", screen.name.as_str()),
            Setting::new("screenType", screen.screen_type.as_str()),
            Setting::new("Group", screen.group.as_str()),
            Setting::new("languageId", screen.language_id.as_str()),
        ];
        let overrides: Vec<Override> = screen
            .asof
            .iter()
            .map(|date| Override::new("PiTDate", date.as_str()))
            .collect();

        let request = self.create_request(BEQS_REQUEST, NONE, NONE, &overrides, &settings)?;
        self.send(&request, screen.asof.as_deref().map(CorrelationId::from))?;

        let mut rows = Vec::new();
        let outcome = drain(self.receive(1), |msg| Ok(parse_screen(msg, &mut rows)?));
        finish(rows, outcome)
    }

    fn send_per_date<T: AsRef<str>, F: AsRef<str>, D: AsRef<str>, R>(
        &mut self,
        tickers: &[T],
        fields: &[F],
        dates: &[D],
        overrides: &[Override],
        date_field: &str,
    ) -> Result<CorrelationTracker<R>, QueryError<DatedRow<R>>> {
        if dates.is_empty() {
            return Err(QueryError::new(BlpError::EmptyDates, Vec::new()));
        }
        let mut request =
            self.create_request(REFERENCE_DATA_REQUEST, tickers, fields, overrides, &[])?;

        let mut tracker = CorrelationTracker::new();
        for date in dates {
            let date = date.as_ref();
            request.set_override(date_field, date);
            let id = tracker.register(CorrelationId::from(date));
            self.send(&request, Some(id))?;
        }
        Ok(tracker)
    }

    fn collect_dated<R>(
        &mut self,
        mut tracker: CorrelationTracker<R>,
        parse: impl Fn(&Document, &mut Vec<R>) -> Result<(), ValidationError>,
    ) -> Result<Vec<DatedRow<R>>, QueryError<DatedRow<R>>> {
        let outcome = drain(self.receive(tracker.outstanding()), |msg| {
            let id = tracker.resolve(&msg.correlation_ids)?;
            let mut rows = Vec::new();
            let parsed = parse(&msg.document, &mut rows);
            // строки до ошибки остаются в частичном результате
            tracker.extend(&id, rows)?;
            Ok(parsed?)
        });
        finish(dated(tracker), outcome)
    }
}
