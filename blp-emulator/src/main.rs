//! Точка входа `blp-emulator`.
//!
//! Жизненный цикл:
//! - парсинг CLI и загрузка списка известных инструментов
//! - bind TCP и accept loop, поток на каждое соединение
//! - ответы на запросы синтетическими данными
//! - корректная остановка по `Ctrl+C`: открытые соединения закрываются

mod cli;
mod config;
mod generator;
mod registry;
mod session;
mod tcp;

use std::net::TcpListener;
use std::sync::{Arc, Mutex, atomic::AtomicBool, atomic::AtomicU64, atomic::Ordering};

use anyhow::Context;
use clap::Parser;
use log::info;

use crate::generator::{GeneratorConfig, MarketData};
use crate::registry::ConnectionRegistry;

fn main() -> anyhow::Result<()> {
    // Логи через RUST_LOG=info/debug
    env_logger::init();

    let shutdown = Arc::new(AtomicBool::new(false));

    // Ctrl+C => ставим shutdown=true
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
            info!("shutting down...");
        })?;
    }

    let args = cli::Args::parse();
    let securities = args
        .load_securities()
        .context("failed to load securities")?;
    info!(
        "Starting blp-emulator: bind={}, securities={}",
        args.bind,
        securities.len()
    );

    let market = Arc::new(Mutex::new(MarketData::new(
        securities,
        GeneratorConfig::default(),
        args.seed,
    )));

    let listener = TcpListener::bind(args.bind)
        .with_context(|| format!("bind TCP listener {}", args.bind))?;

    tcp::run_tcp_listener(
        listener,
        market,
        Arc::new(ConnectionRegistry::new()),
        Arc::new(AtomicU64::new(1)),
        shutdown,
    )
}
