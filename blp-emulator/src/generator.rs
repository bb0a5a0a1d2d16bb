use std::collections::HashMap;

use blp_core::Request;
use blp_core::Value;
use blp_core::constants::DEFAULT_DATE_FIELD;
use blp_core::element::{DataType, ElementNode};
use blp_core::responses::{BarTick, SecurityData, bulk_field, field_exception, invalid_field};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Weekday};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::SCREEN_SIZE;

const DATE_FMT: &str = "%Y%m%d";
const ISO_DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// Верхняя граница числа баров в одном ответе
const MAX_BARS: usize = 10_000;
// календарных дней в одном историческом запросе
const MAX_HISTORY_DAYS: usize = 10_000;

/// Поля, у которых есть история
const HISTORY_FIELDS: &[&str] = &["PX_LAST", "PX_OPEN", "PX_HIGH", "PX_LOW", "VOLUME"];

/// Поля только для справочного запроса
const REFERENCE_ONLY_FIELDS: &[&str] = &[
    "NAME",
    "CRNCY",
    "SETTLE_DT",
    "DVD_EX_DT",
    "INDX_MWEIGHT",
    "DVD_HIST",
];

#[derive(Debug, Error, PartialEq)]
pub(crate) enum RequestError {
    #[error("missing request element {0}")]
    Missing(&'static str),

    #[error("invalid {name}: {value:?}")]
    BadValue { name: &'static str, value: String },

    #[error("unknown security {0:?}")]
    UnknownSecurity(String),
}

#[derive(Debug, Clone)]
pub(crate) struct GeneratorConfig {
    /// Максимальный относительный шаг цены за тик (пример: 0.002 = 0.2%)
    pub(crate) max_rel_step: f64,
    /// Минимальная допустимая цена
    pub(crate) min_price: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_rel_step: 0.002,
            min_price: 0.01,
        }
    }
}

// Значение поля или исключение по нему
enum Generated {
    Node(ElementNode),
    Exception(ElementNode),
}

/// Синтетический рынок: известные инструменты и случайное блуждание цен.
pub(crate) struct MarketData {
    cfg: GeneratorConfig,
    securities: Vec<String>,
    prices: HashMap<String, f64>,
    rng: StdRng,
}

impl MarketData {
    /// `seed` делает ответы воспроизводимыми
    pub(crate) fn new(securities: Vec<String>, cfg: GeneratorConfig, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        let prices = securities
            .iter()
            .map(|s| (s.clone(), rng.random_range(10.0..500.0)))
            .collect::<HashMap<_, _>>();

        Self {
            cfg,
            securities,
            prices,
            rng,
        }
    }

    pub(crate) fn knows(&self, security: &str) -> bool {
        self.prices.contains_key(security)
    }

    /// Следующая цена инструмента
    fn tick(&mut self, security: &str) -> f64 {
        let price = self
            .prices
            .get(security)
            .copied()
            .unwrap_or(self.cfg.min_price);
        let delta = self
            .rng
            .random_range(-self.cfg.max_rel_step..self.cfg.max_rel_step);
        let next = ((1.0 + delta) * price).max(self.cfg.min_price);
        self.prices.insert(security.to_string(), next);
        round2(next)
    }

    fn volume(&mut self) -> i64 {
        self.rng.random_range(1_000..1_000_000)
    }

    /// `securityData` справочного запроса, по записи на инструмент
    pub(crate) fn reference(&mut self, request: &Request) -> Vec<SecurityData> {
        let as_of = reference_date(request);
        request
            .subjects()
            .iter()
            .enumerate()
            .map(|(seq, security)| {
                let data = SecurityData::new(security.as_str(), seq);
                if !self.knows(security) {
                    return data.security_error(&unknown_security(security));
                }
                let mut data = data;
                let mut nodes = Vec::new();
                for field in request.fields() {
                    match self.field(security, field, as_of) {
                        Generated::Node(node) => nodes.push(node),
                        Generated::Exception(ex) => data = data.exception(ex),
                    }
                }
                data.fields(nodes)
            })
            .collect()
    }

    fn field(&mut self, security: &str, field: &str, as_of: NaiveDate) -> Generated {
        let node = match field {
            "PX_LAST" | "PX_OPEN" | "PX_HIGH" | "PX_LOW" => {
                ElementNode::value(field, self.tick(security))
            }
            "VOLUME" => ElementNode::value(field, self.volume()),
            "NAME" => ElementNode::value(field, short_name(security)),
            "CRNCY" => ElementNode::value(field, currency(security)),
            "SETTLE_DT" => ElementNode::typed(
                field,
                DataType::Date,
                add_weekdays(as_of, 2).format(ISO_DATE_FMT).to_string(),
            ),
            "DVD_EX_DT" => {
                return Generated::Exception(field_exception(
                    field,
                    "NOT_APPLICABLE_TO_REF_DATA",
                    "Field not applicable to security",
                ));
            }
            "INDX_MWEIGHT" => bulk_field(field, self.members(security)),
            "DVD_HIST" => bulk_field(field, self.dividends(as_of)),
            _ => return Generated::Exception(invalid_field(field)),
        };
        Generated::Node(node)
    }

    // Состав "индекса": остальные инструменты с весами, в сумме 100
    fn members(&mut self, security: &str) -> Vec<Vec<(String, Value)>> {
        let others: Vec<String> = self
            .securities
            .iter()
            .filter(|s| s.as_str() != security)
            .take(SCREEN_SIZE)
            .cloned()
            .collect();
        let raw: Vec<f64> = others
            .iter()
            .map(|_| self.rng.random_range(1.0..10.0))
            .collect();
        let total: f64 = raw.iter().sum();

        others
            .into_iter()
            .zip(raw)
            .map(|(member, w)| {
                vec![
                    (
                        "Member Ticker and Exchange Code".to_string(),
                        Value::from(member),
                    ),
                    (
                        "Percentage Weight".to_string(),
                        Value::from(round2(w / total * 100.0)),
                    ),
                ]
            })
            .collect()
    }

    // Квартальные дивиденды за год до `as_of`
    fn dividends(&mut self, as_of: NaiveDate) -> Vec<Vec<(String, Value)>> {
        (0..4_i64)
            .map(|q| {
                let ex = as_of - Duration::days(30 + 91 * q);
                let declared = ex - Duration::days(14);
                vec![
                    (
                        "Declared Date".to_string(),
                        Value::from(declared.format(ISO_DATE_FMT).to_string()),
                    ),
                    (
                        "Ex-Date".to_string(),
                        Value::from(ex.format(ISO_DATE_FMT).to_string()),
                    ),
                    (
                        "Dividend Amount".to_string(),
                        Value::from(round2(self.rng.random_range(0.1..2.0))),
                    ),
                    ("Dividend Frequency".to_string(), Value::from("Quarter")),
                ]
            })
            .collect()
    }

    /// История за `startDate..=endDate` по рабочим дням, по записи на инструмент
    pub(crate) fn history(&mut self, request: &Request) -> Result<Vec<SecurityData>, RequestError> {
        let start = date_setting(request, "startDate")?;
        let end = date_setting(request, "endDate")?;
        let weekly = request
            .setting("periodicitySelection")
            .is_some_and(|v| v.to_string().eq_ignore_ascii_case("WEEKLY"));

        let days: Vec<NaiveDate> = start
            .iter_days()
            .take_while(|d| *d <= end)
            .take(MAX_HISTORY_DAYS)
            .filter(|d| is_weekday(*d))
            .filter(|d| !weekly || d.weekday() == Weekday::Fri)
            .collect();

        let mut out = Vec::with_capacity(request.subjects().len());
        for (seq, security) in request.subjects().iter().enumerate() {
            let mut data = SecurityData::new(security.as_str(), seq);
            if !self.knows(security) {
                out.push(data.security_error(&unknown_security(security)));
                continue;
            }

            let mut fields = Vec::new();
            for field in request.fields() {
                if HISTORY_FIELDS.contains(&field.as_str()) {
                    fields.push(field.as_str());
                } else if REFERENCE_ONLY_FIELDS.contains(&field.as_str()) {
                    data = data.exception(field_exception(
                        field,
                        "NOT_APPLICABLE_TO_HIST_DATA",
                        "Field not applicable to history",
                    ));
                } else {
                    data = data.exception(invalid_field(field));
                }
            }

            let rows = days
                .iter()
                .map(|day| {
                    let mut row = vec![ElementNode::typed(
                        "date",
                        DataType::Date,
                        day.format(ISO_DATE_FMT).to_string(),
                    )];
                    for field in &fields {
                        row.push(match *field {
                            "VOLUME" => ElementNode::value(*field, self.volume()),
                            _ => ElementNode::value(*field, self.tick(security)),
                        });
                    }
                    row
                })
                .collect();
            out.push(data.history(rows));
        }
        Ok(out)
    }

    /// Бары `[startDateTime, endDateTime)` с шагом `interval` минут
    pub(crate) fn bars(&mut self, request: &Request) -> Result<Vec<BarTick>, RequestError> {
        let security = request
            .setting("security")
            .map(|v| v.to_string())
            .ok_or(RequestError::Missing("security"))?;
        if !self.knows(&security) {
            return Err(RequestError::UnknownSecurity(security));
        }
        let start = datetime_setting(request, "startDateTime")?;
        let end = datetime_setting(request, "endDateTime")?;
        let interval = request
            .setting("interval")
            .and_then(|v| v.as_i64().or_else(|| v.to_string().parse().ok()))
            .filter(|m| (1..=1440).contains(m))
            .ok_or_else(|| RequestError::BadValue {
                name: "interval",
                value: request
                    .setting("interval")
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            })?;
        let step = Duration::minutes(interval);

        let mut bars = Vec::new();
        let mut t = start;
        while t < end && bars.len() < MAX_BARS {
            let open = self.tick(&security);
            let close = self.tick(&security);
            let spread = round2(open.max(close) * self.cfg.max_rel_step);
            bars.push(BarTick {
                time: t.format(DATETIME_FMT).to_string(),
                open,
                high: round2(open.max(close) + spread),
                low: round2((open.min(close) - spread).max(self.cfg.min_price)),
                close,
                volume: self.volume(),
                num_events: self.rng.random_range(1..500),
            });
            t += step;
        }
        debug!("{} bars for {security}", bars.len());
        Ok(bars)
    }

    /// Тикеры SRCH-домена `YELLOWKEY:NAME`: все инструменты с этим сектором
    pub(crate) fn search(&self, domain: &str) -> Vec<String> {
        let Some((yellow_key, _)) = domain.split_once(':') else {
            return self.securities.clone();
        };
        self.securities
            .iter()
            .filter(|s| {
                s.rsplit(' ')
                    .next()
                    .is_some_and(|k| k.eq_ignore_ascii_case(yellow_key))
            })
            .cloned()
            .collect()
    }

    /// Результат скрина: `SCREEN_SIZE` инструментов, выбор зависит от имени
    pub(crate) fn screen(&mut self, name: &str) -> Vec<SecurityData> {
        if self.securities.is_empty() {
            return Vec::new();
        }
        let offset = name.bytes().map(usize::from).sum::<usize>() % self.securities.len();
        let picked: Vec<String> = self
            .securities
            .iter()
            .cycle()
            .skip(offset)
            .take(SCREEN_SIZE.min(self.securities.len()))
            .cloned()
            .collect();

        picked
            .into_iter()
            .enumerate()
            .map(|(seq, security)| {
                let cap = round2(self.tick(&security) * self.rng.random_range(1.0e6..1.0e8));
                SecurityData::new(security.as_str(), seq).fields(vec![
                    ElementNode::value("Ticker", short_name(&security)),
                    ElementNode::value("Short Name", format!("{} CORP", short_name(&security))),
                    ElementNode::value("Market Cap", cap),
                ])
            })
            .collect()
    }
}

fn unknown_security(security: &str) -> String {
    format!("Unknown/Invalid security [{security}]")
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn short_name(security: &str) -> String {
    security
        .split_whitespace()
        .next()
        .unwrap_or(security)
        .to_string()
}

// Валютные пары котируются в базовой валюте, остальное в USD
fn currency(security: &str) -> String {
    if security.ends_with("Curncy") {
        if let Some(code) = security.get(..3) {
            return code.to_string();
        }
    }
    "USD".to_string()
}

fn is_weekday(d: NaiveDate) -> bool {
    !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)
}

fn add_weekdays(mut d: NaiveDate, n: usize) -> NaiveDate {
    let mut left = n;
    while left > 0 {
        d += Duration::days(1);
        if is_weekday(d) {
            left -= 1;
        }
    }
    d
}

// Дата из override REFERENCE_DATE, иначе сегодня
fn reference_date(request: &Request) -> NaiveDate {
    let today = Local::now().date_naive();
    match request.override_value(DEFAULT_DATE_FIELD) {
        Some(v) => NaiveDate::parse_from_str(&v.to_string(), DATE_FMT).unwrap_or_else(|e| {
            debug!("bad {DEFAULT_DATE_FIELD} override {v}: {e}");
            today
        }),
        None => today,
    }
}

fn date_setting(request: &Request, name: &'static str) -> Result<NaiveDate, RequestError> {
    let raw = request
        .setting(name)
        .map(|v| v.to_string())
        .ok_or(RequestError::Missing(name))?;
    NaiveDate::parse_from_str(&raw, DATE_FMT).map_err(|_| RequestError::BadValue { name, value: raw })
}

fn datetime_setting(request: &Request, name: &'static str) -> Result<NaiveDateTime, RequestError> {
    let raw = request
        .setting(name)
        .map(|v| v.to_string())
        .ok_or(RequestError::Missing(name))?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FMT)
        .map_err(|_| RequestError::BadValue { name, value: raw })
}
