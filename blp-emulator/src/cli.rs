use clap::{ArgGroup, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config;

/// Blp Emulator - локальный хост сервиса: отвечает на запросы синтетическими данными.
#[derive(Parser, Debug, Clone)]
#[command(name = "blp-emulator", version, about)]
#[command(
    group(
        ArgGroup::new("securities_source")
            .required(false)
            .multiple(false)
            .args(["securities_file", "securities"])
    )
)]
pub(crate) struct Args {
    /// TCP bind address, например 127.0.0.1:8194
    #[arg(long, default_value = config::BIND_ADDR)]
    pub(crate) bind: SocketAddr,

    /// Известные инструменты: файл (по одному на строку, поддержка # комментариев)
    #[arg(long)]
    pub(crate) securities_file: Option<PathBuf>,

    /// Известные инструменты строкой: "IBM US Equity, AUD Curncy"
    #[arg(long)]
    pub(crate) securities: Option<String>,

    /// Seed генератора для воспроизводимых ответов
    #[arg(long)]
    pub(crate) seed: Option<u64>,
}

impl Args {
    pub(crate) fn load_securities(&self) -> std::io::Result<Vec<String>> {
        match &self.securities {
            Some(raw) => Ok(blp_core::subjects::parse_csv(raw)),
            None => config::load_securities(self.securities_file.clone()),
        }
    }
}
