//! Точка входа `blp-client`.
//!
//! Жизненный цикл:
//! - парсинг CLI и загрузка списка инструментов
//! - TCP-соединение и подъём сессии (refdata + exrsvc)
//! - один запрос и печать строк в stdout
//! - корректная остановка по `Ctrl+C`: сокет закрывается, ожидание ответа прерывается

mod cli;
mod output;
mod subjects;

use std::io::{self, Write};
use std::sync::{Arc, atomic::AtomicBool, atomic::Ordering};

use anyhow::Context;
use blp_core::rows::Tabular;
use blp_core::transport::TcpSession;
use blp_core::{Connection, QueryError, Session};
use clap::Parser;
use log::{info, warn};

use crate::cli::{Args, Command, settings};
use crate::subjects::load_subjects;

fn main() -> anyhow::Result<()> {
    // Логи через RUST_LOG=info/debug
    env_logger::init();

    let args = Args::parse();
    args.validate()?;

    let options = args.session_options();
    info!("Starting blp-client: server={}", options.address());

    let session = TcpSession::connect(options.address())
        .with_context(|| format!("failed to connect to {}", options.address()))?;

    let shutdown = Arc::new(AtomicBool::new(false));

    // Ctrl+C => shutdown=true и закрываем сокет, чтобы не ждать ответа
    {
        let shutdown = shutdown.clone();
        let closer = session.closer();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
            info!("shutting down...");
            closer.close();
        })?;
    }

    let mut con = Connection::new(session, options);
    let result = con
        .start()
        .context("session start failed")
        .and_then(|()| run(&mut con, &args.command, &mut io::stdout().lock()));
    con.stop();

    match result {
        Err(e) if shutdown.load(Ordering::Relaxed) => {
            info!("interrupted: {e:#}");
            Ok(())
        }
        other => other,
    }
}

fn run<S: Session, W: Write>(
    con: &mut Connection<S>,
    command: &Command,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Ref(a) => {
            let subjects = load_subjects(&a.subjects)?;
            emit(out, con.reference(&subjects, &a.fields(), &a.overrides()))
        }
        Command::Bulkref(a) => {
            let subjects = load_subjects(&a.subjects)?;
            emit(out, con.bulk_reference(&subjects, &a.fields(), &a.overrides()))
        }
        Command::Bdh(a) => {
            let r = &a.reference;
            let subjects = load_subjects(&r.subjects)?;
            emit(
                out,
                con.bdh(
                    &subjects,
                    &r.fields(),
                    &a.start,
                    &a.end,
                    &settings(&a.elms),
                    &r.overrides(),
                ),
            )
        }
        Command::RefHist(a) => {
            let r = &a.reference;
            let subjects = load_subjects(&r.subjects)?;
            let dates = blp_core::subjects::parse_csv(&a.dates);
            emit(
                out,
                con.ref_hist(&subjects, &r.fields(), &dates, &r.overrides(), &a.date_field),
            )
        }
        Command::BulkrefHist(a) => {
            let r = &a.reference;
            let subjects = load_subjects(&r.subjects)?;
            let dates = blp_core::subjects::parse_csv(&a.dates);
            emit(
                out,
                con.bulkref_hist(&subjects, &r.fields(), &dates, &r.overrides(), &a.date_field),
            )
        }
        Command::Bdib(a) => emit(out, con.bdib(&a.query(), &settings(&a.elms))),
        Command::Bsrch(a) => emit(out, con.bsrch(&a.domain)),
        Command::Beqs(a) => emit(out, con.beqs(&a.screen())),
    }
}

/// Печатает строки; при ошибке печатает то, что успело прийти, и возвращает причину
fn emit<R: Tabular, W: Write>(
    out: &mut W,
    result: Result<Vec<R>, QueryError<R>>,
) -> anyhow::Result<()> {
    match result {
        Ok(rows) => {
            output::write_rows(out, &rows)?;
            info!("{} rows", rows.len());
            Ok(())
        }
        Err(QueryError { kind, partial }) => {
            if !partial.is_empty() {
                warn!("printing {} rows received before failure", partial.len());
                output::write_rows(out, &partial)?;
            }
            Err(kind).context("query failed")
        }
    }
}
