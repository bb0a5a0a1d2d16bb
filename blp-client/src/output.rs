use std::io::{self, Write};

use blp_core::rows::Tabular;

/// Заголовок и строки через табуляцию
pub(crate) fn write_rows<R: Tabular, W: Write>(out: &mut W, rows: &[R]) -> io::Result<()> {
    writeln!(out, "{}", R::COLUMNS.join("\t"))?;
    for row in rows {
        writeln!(out, "{row}")?;
    }
    out.flush()
}
