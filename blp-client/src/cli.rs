use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};

use blp_core::constants::{DEFAULT_DATE_FIELD, DEFAULT_HOST, DEFAULT_PORT};
use blp_core::query::{BarQuery, Screen};
use blp_core::{Override, Setting, SessionOptions};

/// Blp Client - запросы справочных, исторических и внутридневных данных.
///
/// Поднимает сессию (refdata + exrsvc), выполняет один запрос и печатает
/// строки в длинном формате через табуляцию.
#[derive(Parser, Debug, Clone)]
#[command(name = "blp-client", version, about)]
pub(crate) struct Args {
    /// Хост сервиса
    #[arg(long, global = true, default_value = DEFAULT_HOST)]
    pub(crate) host: String,

    /// Порт сервиса
    #[arg(long, global = true, default_value_t = DEFAULT_PORT,
          value_parser = clap::value_parser!(u16).range(1..=65535))]
    pub(crate) port: u16,

    /// Таймаут ожидания одного события, мс
    #[arg(long, global = true, default_value_t = 500,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) timeout_ms: u64,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Справочные поля (ReferenceDataRequest)
    Ref(RefArgs),
    /// Bulk-поля, строка на элемент массива
    Bulkref(RefArgs),
    /// Исторические данные (HistoricalDataRequest)
    Bdh(BdhArgs),
    /// Справочные поля на каждую дату
    RefHist(HistArgs),
    /// Bulk-поля на каждую дату
    BulkrefHist(HistArgs),
    /// Внутридневные бары (IntradayBarRequest)
    Bdib(BdibArgs),
    /// Тикеры из SRCH-домена (ExcelGetGridRequest)
    Bsrch(BsrchArgs),
    /// Сохранённый скрин EQS (BeqsRequest)
    Beqs(BeqsArgs),
}

/// Источник инструментов: ровно один из двух
#[derive(ClapArgs, Debug, Clone)]
#[group(required = true, multiple = false)]
pub(crate) struct SubjectArgs {
    /// Файл инструментов (по одному на строку, `#` комментарии)
    #[arg(long)]
    pub(crate) tickers_file: Option<PathBuf>,

    /// Инструменты строкой: "IBM US Equity, AUD Curncy"
    #[arg(long)]
    pub(crate) tickers: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub(crate) struct RefArgs {
    #[command(flatten)]
    pub(crate) subjects: SubjectArgs,

    /// Поля через запятую: "PX_LAST,NAME"
    #[arg(long)]
    pub(crate) fields: String,

    /// Override поля: --override FIELD=VALUE (можно несколько)
    #[arg(long = "override", value_parser = parse_key_val)]
    pub(crate) overrides: Vec<(String, String)>,
}

#[derive(ClapArgs, Debug, Clone)]
pub(crate) struct BdhArgs {
    #[command(flatten)]
    pub(crate) reference: RefArgs,

    /// Начало периода, YYYYmmdd
    #[arg(long)]
    pub(crate) start: String,

    /// Конец периода, YYYYmmdd
    #[arg(long)]
    pub(crate) end: String,

    /// Доп. настройка запроса: --elm periodicitySelection=WEEKLY
    #[arg(long = "elm", value_parser = parse_key_val)]
    pub(crate) elms: Vec<(String, String)>,
}

#[derive(ClapArgs, Debug, Clone)]
pub(crate) struct HistArgs {
    #[command(flatten)]
    pub(crate) reference: RefArgs,

    /// Даты через запятую, YYYYmmdd
    #[arg(long)]
    pub(crate) dates: String,

    /// Поле, в которое подставляется дата
    #[arg(long, default_value = DEFAULT_DATE_FIELD)]
    pub(crate) date_field: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub(crate) struct BdibArgs {
    /// Инструмент
    #[arg(long)]
    pub(crate) ticker: String,

    /// Начало, UTC: YYYY-mm-ddTHH:MM:SS
    #[arg(long)]
    pub(crate) start: String,

    /// Конец, UTC: YYYY-mm-ddTHH:MM:SS
    #[arg(long)]
    pub(crate) end: String,

    /// TRADE, BID, ASK, BID_BEST, ASK_BEST, BEST_BID, BEST_ASK
    #[arg(long, default_value = "TRADE")]
    pub(crate) event_type: String,

    /// Длина бара в минутах
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=1440))]
    pub(crate) interval: u32,

    #[arg(long = "elm", value_parser = parse_key_val)]
    pub(crate) elms: Vec<(String, String)>,
}

#[derive(ClapArgs, Debug, Clone)]
pub(crate) struct BsrchArgs {
    /// Домен вида COMDTY:NGFLOW
    #[arg(long)]
    pub(crate) domain: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub(crate) struct BeqsArgs {
    /// Имя скрина
    #[arg(long)]
    pub(crate) screen: String,

    #[arg(long, default_value = "PRIVATE")]
    pub(crate) screen_type: String,

    #[arg(long, default_value = "General")]
    pub(crate) group: String,

    #[arg(long, default_value = "ENGLISH")]
    pub(crate) language: String,

    /// Дата point-in-time, YYYYmmdd
    #[arg(long)]
    pub(crate) asof: Option<String>,
}

/// "FIELD=VALUE" -> (FIELD, VALUE)
fn parse_key_val(raw: &str) -> std::result::Result<(String, String), String> {
    let (k, v) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let k = k.trim();
    if k.is_empty() {
        return Err(format!("empty key in {raw:?}"));
    }
    Ok((k.to_string(), v.trim().to_string()))
}

fn check_date(flag: &str, value: &str) -> Result<()> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        bail!("{flag} must look like YYYYmmdd (got: {value:?})");
    }
    Ok(())
}

impl Args {
    /// Валидация аргументов (файл существует, даты похожи на YYYYmmdd и т.д.)
    pub(crate) fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("--host is empty");
        }

        match &self.command {
            Command::Ref(a) | Command::Bulkref(a) => a.subjects.validate()?,
            Command::Bdh(a) => {
                a.reference.subjects.validate()?;
                check_date("--start", &a.start)?;
                check_date("--end", &a.end)?;
            }
            Command::RefHist(a) | Command::BulkrefHist(a) => {
                a.reference.subjects.validate()?;
                for date in blp_core::subjects::parse_csv(&a.dates) {
                    check_date("--dates", &date)?;
                }
            }
            Command::Beqs(a) => {
                if let Some(asof) = &a.asof {
                    check_date("--asof", asof)?;
                }
            }
            Command::Bdib(_) | Command::Bsrch(_) => {}
        }
        Ok(())
    }

    pub(crate) fn session_options(&self) -> SessionOptions {
        SessionOptions {
            host: self.host.clone(),
            port: self.port,
            ..SessionOptions::default()
        }
        .with_timeout(Duration::from_millis(self.timeout_ms))
    }
}

impl SubjectArgs {
    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.tickers_file {
            let md = std::fs::metadata(path)
                .with_context(|| format!("tickers file not found: {path:?}"))?;
            if !md.is_file() {
                bail!("--tickers-file must point to a file: {path:?}");
            }
        }
        Ok(())
    }
}

impl RefArgs {
    pub(crate) fn fields(&self) -> Vec<String> {
        blp_core::subjects::parse_csv(&self.fields)
    }

    pub(crate) fn overrides(&self) -> Vec<Override> {
        self.overrides
            .iter()
            .map(|(k, v)| Override::new(k.as_str(), v.as_str()))
            .collect()
    }
}

pub(crate) fn settings(elms: &[(String, String)]) -> Vec<Setting> {
    elms.iter()
        .map(|(k, v)| Setting::new(k.as_str(), v.as_str()))
        .collect()
}

impl BdibArgs {
    pub(crate) fn query(&self) -> BarQuery {
        BarQuery {
            ticker: self.ticker.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            event_type: self.event_type.clone(),
            interval: self.interval,
        }
    }
}

impl BeqsArgs {
    pub(crate) fn screen(&self) -> Screen {
        let screen = Screen::new(self.screen.as_str())
            .screen_type(self.screen_type.as_str())
            .group(self.group.as_str())
            .language(self.language.as_str());
        match &self.asof {
            Some(date) => screen.asof(date.as_str()),
            None => screen,
        }
    }
}
