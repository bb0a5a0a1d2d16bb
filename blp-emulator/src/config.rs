use std::io;
use std::io::Cursor;
use std::path::PathBuf;

const DEFAULT_SECURITIES: &str = include_str!("../assets/securities.txt");

pub(crate) const BIND_ADDR: &str = "127.0.0.1:8194";

/// Сколько `securityData` кладётся в одно сообщение справочного ответа
pub(crate) const SECURITIES_PER_MESSAGE: usize = 2;

/// Сколько инструментов возвращает скрин EQS
pub(crate) const SCREEN_SIZE: usize = 5;

pub(crate) fn load_securities(path: Option<PathBuf>) -> io::Result<Vec<String>> {
    match path {
        Some(p) => blp_core::subjects::read_subjects_from_path(p),
        None => blp_core::subjects::read_subjects(Cursor::new(DEFAULT_SECURITIES)),
    }
}

pub(crate) type ConnId = u64;
