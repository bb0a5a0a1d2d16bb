use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cli::SubjectArgs;

#[derive(Debug, Error)]
pub(crate) enum SubjectsError {
    /// Clap-логика должна гарантировать источник, но на всякий случай
    #[error("subjects source is missing: provide either --tickers-file or --tickers")]
    MissingSource,

    #[error("subjects list is empty (file: {path:?})")]
    EmptyFromFile { path: PathBuf },

    #[error("subjects list is empty (--tickers value: {raw:?})")]
    EmptyFromArg { raw: String },

    #[error("failed to read subjects file: {path:?}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) type Result<T> = std::result::Result<T, SubjectsError>;

/// Загружает инструменты из источника, выбранного в CLI:
/// - `--tickers-file` -> blp_core::subjects::read_subjects_from_path
/// - `--tickers`      -> blp_core::subjects::parse_csv
pub(crate) fn load_subjects(args: &SubjectArgs) -> Result<Vec<String>> {
    if let Some(path) = &args.tickers_file {
        load_from_file(path)
    } else if let Some(raw) = &args.tickers {
        load_from_arg(raw)
    } else {
        Err(SubjectsError::MissingSource)
    }
}

fn load_from_file(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref().to_path_buf();

    let subjects = blp_core::subjects::read_subjects_from_path(&path).map_err(|e| {
        SubjectsError::ReadFile {
            path: path.clone(),
            source: e,
        }
    })?;

    if subjects.is_empty() {
        return Err(SubjectsError::EmptyFromFile { path });
    }

    Ok(subjects)
}

fn load_from_arg(raw: &str) -> Result<Vec<String>> {
    let subjects = blp_core::subjects::parse_csv(raw);

    if subjects.is_empty() {
        return Err(SubjectsError::EmptyFromArg {
            raw: raw.to_string(),
        });
    }

    Ok(subjects)
}
