use std::fmt;

use crate::element::Value;
use crate::event::CorrelationId;

/// Строка в "длинном" табличном формате
pub trait Tabular: fmt::Display {
    /// Заголовки колонок, в том же порядке, что и `Display`
    const COLUMNS: &'static [&'static str];
}

// отсутствующее значение (поле не применимо к инструменту)
const MISSING: &str = "NaN";

fn write_opt<T: fmt::Display>(f: &mut fmt::Formatter<'_>, v: &Option<T>) -> fmt::Result {
    match v {
        Some(v) => write!(f, "{v}"),
        None => f.write_str(MISSING),
    }
}

/// Справочное значение: `(ticker, field, value)`; `None`, если поле не применимо
#[derive(Debug, Clone, PartialEq)]
pub struct RefRow {
    pub ticker: String,
    pub field: String,
    pub value: Option<Value>,
}

impl fmt::Display for RefRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t", self.ticker, self.field)?;
        write_opt(f, &self.value)
    }
}

impl Tabular for RefRow {
    const COLUMNS: &'static [&'static str] = &["ticker", "field", "value"];
}

/// Один элемент bulk-поля; `position`: индекс в массиве.
/// `position == None` и пустые `values` значат, что поле не применимо.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRow {
    pub ticker: String,
    pub field: String,
    pub position: Option<usize>,
    pub values: Vec<(String, Value)>,
}

impl BulkRow {
    /// Разворачивает элемент в строки `(name, value)`
    pub fn expand(&self) -> Vec<ExpandedRow> {
        if self.values.is_empty() {
            return vec![ExpandedRow {
                ticker: self.ticker.clone(),
                field: self.field.clone(),
                name: None,
                value: None,
                position: self.position,
            }];
        }
        self.values
            .iter()
            .map(|(name, value)| ExpandedRow {
                ticker: self.ticker.clone(),
                field: self.field.clone(),
                name: Some(name.clone()),
                value: Some(value.clone()),
                position: self.position,
            })
            .collect()
    }
}

impl fmt::Display for BulkRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.expand();
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{row}")?;
        }
        Ok(())
    }
}

impl Tabular for BulkRow {
    const COLUMNS: &'static [&'static str] = ExpandedRow::COLUMNS;
}

/// Bulk-значение в длинном формате: `(ticker, field, name, value, position)`
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedRow {
    pub ticker: String,
    pub field: String,
    pub name: Option<String>,
    pub value: Option<Value>,
    pub position: Option<usize>,
}

impl fmt::Display for ExpandedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t", self.ticker, self.field)?;
        write_opt(f, &self.name)?;
        f.write_str("\t")?;
        write_opt(f, &self.value)?;
        f.write_str("\t")?;
        write_opt(f, &self.position)
    }
}

impl Tabular for ExpandedRow {
    const COLUMNS: &'static [&'static str] = &["ticker", "field", "name", "value", "position"];
}

/// Историческое значение: `(date, ticker, field, value)`
#[derive(Debug, Clone, PartialEq)]
pub struct HistRow {
    pub date: Value,
    pub ticker: String,
    pub field: String,
    pub value: Value,
}

impl fmt::Display for HistRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}", self.date, self.ticker, self.field, self.value)
    }
}

impl Tabular for HistRow {
    const COLUMNS: &'static [&'static str] = &["date", "ticker", "field", "value"];
}

/// Строка ответа на запрос с перебором дат; дата: correlation id запроса
#[derive(Debug, Clone, PartialEq)]
pub struct DatedRow<T> {
    pub date: CorrelationId,
    pub row: T,
}

impl<T: fmt::Display> fmt::Display for DatedRow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // bulk-строка может занимать несколько линий
        let text = self.row.to_string();
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}\t{line}", self.date)?;
        }
        Ok(())
    }
}

impl Tabular for DatedRow<RefRow> {
    const COLUMNS: &'static [&'static str] = &["date", "ticker", "field", "value"];
}

impl Tabular for DatedRow<BulkRow> {
    const COLUMNS: &'static [&'static str] =
        &["date", "ticker", "field", "name", "value", "position"];
}

/// Бар внутридневных данных
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub num_events: i64,
}

impl fmt::Display for Bar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.time, self.open, self.high, self.low, self.close, self.volume, self.num_events
        )
    }
}

impl Tabular for Bar {
    const COLUMNS: &'static [&'static str] =
        &["time", "open", "high", "low", "close", "volume", "numEvents"];
}

/// Строка скрина EQS: `(ticker, field, value, asof)`
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenRow {
    pub ticker: String,
    pub field: String,
    pub value: Value,
    pub asof: Option<CorrelationId>,
}

impl fmt::Display for ScreenRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t", self.ticker, self.field, self.value)?;
        write_opt(f, &self.asof)
    }
}

impl Tabular for ScreenRow {
    const COLUMNS: &'static [&'static str] = &["ticker", "field", "value", "date"];
}

/// Тикер из результатов SRCH
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRow {
    pub ticker: String,
}

impl fmt::Display for SearchRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ticker)
    }
}

impl Tabular for SearchRow {
    const COLUMNS: &'static [&'static str] = &["ticker"];
}
