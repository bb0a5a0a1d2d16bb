use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Сохраняет первый экземпляр каждого идентификатора, порядок ввода не меняется
#[derive(Debug, Default)]
struct Dedup {
    seen: BTreeSet<String>,
    out: Vec<String>,
}

impl Dedup {
    fn push(&mut self, s: &str) {
        if self.seen.insert(s.to_string()) {
            self.out.push(s.to_string());
        }
    }
}

/// Чтение идентификаторов инструментов, по одному на строку
pub fn read_subjects<R: io::Read>(reader: R) -> io::Result<Vec<String>> {
    let mut acc = Dedup::default();
    let buf = BufReader::new(reader);

    for line in buf.lines() {
        let line = line?;
        if let Some(s) = normalize_line(&line) {
            acc.push(s);
        }
    }

    Ok(acc.out)
}

/// Чтение идентификаторов из файла
pub fn read_subjects_from_path(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let f = File::open(path)?;
    read_subjects(f)
}

// Регистр не трогаем: "XXX Equity" и "xxx equity" это разные инструменты
fn normalize_line(line: &str) -> Option<&str> {
    // "IBM US Equity # comment"
    let s = line.split('#').next().unwrap_or("").trim();
    if s.is_empty() {
        return None;
    }
    Some(s)
}

/// Список через запятую: `"IBM US Equity, AUD Curncy"`.
/// Пустые элементы пропускаются, повторы убираются, порядок сохраняется.
pub fn parse_csv(raw: &str) -> Vec<String> {
    let mut acc = Dedup::default();
    for part in raw.split(',') {
        let s = part.trim();
        if !s.is_empty() {
            acc.push(s);
        }
    }
    acc.out
}
