//! Проверка записей `securityData` и извлечение значений полей.

use std::fmt;

use log::debug;

use crate::constants::INVALID_FIELD;
use crate::document::Document;
use crate::element::Value;
use crate::error::ValidationError;
use crate::rows::BulkRow;

/// Ожидаемая форма поля
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Bulk,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => f.write_str("scalar"),
            Shape::Bulk => f.write_str("bulk"),
        }
    }
}

/// Дочерний узел записи либо выбранный вариант choice с этим именем
pub fn lookup<'a>(doc: &'a Document, key: &str) -> Option<&'a Document> {
    match doc {
        Document::Choice(name, inner) if name == key => Some(inner),
        other => other.get(key),
    }
}

fn missing(what: &str) -> ValidationError {
    ValidationError::Malformed {
        what: what.to_string(),
    }
}

/// Отказ сервиса по запросу целиком (`responseError`)
pub fn check_response_error(doc: &Document) -> Result<(), ValidationError> {
    match lookup(doc, "responseError") {
        Some(err) => Err(ValidationError::ResponseError {
            category: err
                .get("category")
                .and_then(Document::as_str)
                .unwrap_or_default()
                .to_string(),
            message: err
                .get("message")
                .and_then(Document::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        None => Ok(()),
    }
}

/// Записи `securityData` одного сообщения.
///
/// В справочном ответе это массив, в историческом: одна запись.
pub fn security_records(doc: &Document) -> Result<Vec<&Document>, ValidationError> {
    check_response_error(doc)?;
    match lookup(doc, "securityData") {
        Some(Document::Sequence(items)) => Ok(items.iter().collect()),
        Some(record @ Document::Mapping(_)) => Ok(vec![record]),
        _ => Err(missing("securityData")),
    }
}

/// Проверяет одну запись и возвращает имя инструмента
pub fn validate_record(record: &Document) -> Result<&str, ValidationError> {
    let security = record
        .get("security")
        .and_then(Document::as_str)
        .ok_or_else(|| missing("security"))?;

    if record.contains_key("securityError") {
        return Err(ValidationError::Security {
            security: security.to_string(),
        });
    }
    if let Some(exceptions) = record.get("fieldExceptions") {
        check_field_exceptions(exceptions)?;
    }
    Ok(security)
}

/// Фатален только `INVALID_FIELD`; прочие исключения пропускаются
pub fn check_field_exceptions(exceptions: &Document) -> Result<(), ValidationError> {
    let Some(items) = exceptions.as_sequence() else {
        return Ok(());
    };
    for fe in items {
        let field = fe.get("fieldId").and_then(Document::as_str).unwrap_or("?");
        let subcategory = fe
            .get("errorInfo")
            .and_then(|info| info.get("subcategory"))
            .and_then(Document::as_str);

        if subcategory == Some(INVALID_FIELD) {
            return Err(ValidationError::FieldException {
                field: field.to_string(),
            });
        }
        debug!(
            "ignoring field exception for {field}: {}",
            subcategory.unwrap_or("no subcategory")
        );
    }
    Ok(())
}

/// Историческая запись не терпит исключений полей: первое из них фатально
pub fn reject_field_exceptions(record: &Document) -> Result<(), ValidationError> {
    let first = record
        .get("fieldExceptions")
        .and_then(Document::as_sequence)
        .and_then(|items| items.first());
    let Some(fe) = first else {
        return Ok(());
    };
    Err(ValidationError::HistoryFieldException {
        field: fe
            .get("fieldId")
            .and_then(Document::as_str)
            .unwrap_or("?")
            .to_string(),
        subcategory: fe
            .get("errorInfo")
            .and_then(|info| info.get("subcategory"))
            .and_then(Document::as_str)
            .unwrap_or("UNKNOWN")
            .to_string(),
    })
}

/// `fieldData` записи
pub fn field_data(record: &Document) -> Result<&Document, ValidationError> {
    record.get("fieldData").ok_or_else(|| missing("fieldData"))
}

/// Скалярное значение поля; `None`, если поля нет в ответе
pub fn scalar_field(field_data: &Document, field: &str) -> Result<Option<Value>, ValidationError> {
    match field_data.get(field) {
        None => Ok(None),
        Some(Document::Scalar(v)) => Ok(Some(v.clone())),
        Some(_) => Err(ValidationError::BulkFieldMismatch {
            field: field.to_string(),
            expected: Shape::Scalar,
        }),
    }
}

/// Пары `(имя, значение)` записи; вложенные структуры дают null
pub fn record_pairs(record: &Document) -> Vec<(String, Value)> {
    match record {
        Document::Mapping(entries) => entries
            .iter()
            .map(|(name, doc)| {
                let value = doc.as_value().cloned().unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect(),
        Document::Choice(name, inner) => vec![(
            name.clone(),
            inner.as_value().cloned().unwrap_or(Value::Null),
        )],
        Document::Scalar(v) => vec![(String::new(), v.clone())],
        Document::Sequence(_) => Vec::new(),
    }
}

/// Строки bulk-поля: по одной на элемент массива.
///
/// Отсутствующее поле: одна строка без позиции и значений.
pub fn bulk_rows(
    ticker: &str,
    field_data: &Document,
    field: &str,
) -> Result<Vec<BulkRow>, ValidationError> {
    match field_data.get(field) {
        None => Ok(vec![BulkRow {
            ticker: ticker.to_string(),
            field: field.to_string(),
            position: None,
            values: Vec::new(),
        }]),
        Some(Document::Sequence(items)) => Ok(items
            .iter()
            .enumerate()
            .map(|(position, item)| BulkRow {
                ticker: ticker.to_string(),
                field: field.to_string(),
                position: Some(position),
                values: record_pairs(item),
            })
            .collect()),
        Some(_) => Err(ValidationError::BulkFieldMismatch {
            field: field.to_string(),
            expected: Shape::Bulk,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::decode;
    use crate::element::{DataType, ElementNode};
    use crate::responses::{
        SecurityData, bulk_field, field_exception, invalid_field, reference_response,
        response_error,
    };

    fn weights(n: usize) -> ElementNode {
        let rows = (0..n)
            .map(|i| {
                vec![
                    (
                        "Member Ticker and Exchange Code".to_string(),
                        Value::from(format!("M{i}")),
                    ),
                    ("Percentage Weight".to_string(), Value::from(1.5 * i as f64)),
                ]
            })
            .collect();
        bulk_field("INDX_MWEIGHT", rows)
    }

    fn records_of(records: Vec<SecurityData>) -> Document {
        decode(&reference_response(records).element)
    }

    #[test]
    fn security_error_names_the_security() {
        let doc = records_of(vec![
            SecurityData::new("IBM US Equity", 0)
                .fields(vec![ElementNode::value("PX_LAST", 140.0)]),
            SecurityData::new("XXX Equity", 1).security_error("Unknown/Invalid security"),
        ]);
        let records = security_records(&doc).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(validate_record(records[0]).unwrap(), "IBM US Equity");
        match validate_record(records[1]) {
            Err(ValidationError::Security { security }) => assert_eq!(security, "XXX Equity"),
            other => panic!("expected security error, got {other:?}"),
        }
    }

    #[test]
    fn only_invalid_field_is_fatal() {
        let doc = records_of(vec![
            SecurityData::new("IBM US Equity", 0)
                .exception(field_exception("DVD_EX_DT", "NOT_APPLICABLE_TO_REF_DATA", "N/A"))
                .fields(vec![]),
        ]);
        let records = security_records(&doc).unwrap();
        assert!(validate_record(records[0]).is_ok());

        let doc = records_of(vec![
            SecurityData::new("IBM US Equity", 0)
                .exception(invalid_field("BAD_FLD"))
                .fields(vec![]),
        ]);
        let records = security_records(&doc).unwrap();
        match validate_record(records[0]) {
            Err(ValidationError::FieldException { field }) => assert_eq!(field, "BAD_FLD"),
            other => panic!("expected field exception, got {other:?}"),
        }
    }

    #[test]
    fn history_record_rejects_every_exception() {
        let record = decode(
            &SecurityData::new("SPY US Equity", 0)
                .exception(field_exception(
                    "NAME",
                    "NOT_APPLICABLE_TO_HIST_DATA",
                    "Field not applicable to history",
                ))
                .history(vec![])
                .build(),
        );
        assert!(validate_record(&record).is_ok());
        match reject_field_exceptions(&record) {
            Err(e @ ValidationError::HistoryFieldException { .. }) => {
                assert_eq!(e.to_string(), "NAME: NOT_APPLICABLE_TO_HIST_DATA");
            }
            other => panic!("expected history field exception, got {other:?}"),
        }

        let clean = decode(&SecurityData::new("SPY US Equity", 0).history(vec![]).build());
        assert!(reject_field_exceptions(&clean).is_ok());
    }

    #[test]
    fn shape_mismatch_both_directions() {
        let doc = decode(
            &SecurityData::new("SPX Index", 0)
                .fields(vec![ElementNode::value("PX_LAST", 2100.0), weights(2)])
                .build(),
        );
        let fd = field_data(&doc).unwrap();

        assert!(matches!(
            scalar_field(fd, "INDX_MWEIGHT"),
            Err(ValidationError::BulkFieldMismatch {
                expected: Shape::Scalar,
                ..
            })
        ));
        assert!(matches!(
            bulk_rows("SPX Index", fd, "PX_LAST"),
            Err(ValidationError::BulkFieldMismatch {
                expected: Shape::Bulk,
                ..
            })
        ));
        assert_eq!(
            ValidationError::BulkFieldMismatch {
                field: "PX_LAST".into(),
                expected: Shape::Bulk
            }
            .to_string(),
            "field \"PX_LAST\" is not bulk data"
        );
    }

    #[test]
    fn absent_field_gives_missing_marker() {
        let doc = decode(
            &SecurityData::new("IBM US Equity", 0)
                .fields(vec![ElementNode::value("PX_LAST", 140.0)])
                .build(),
        );
        let fd = field_data(&doc).unwrap();
        assert_eq!(scalar_field(fd, "DVD_EX_DT").unwrap(), None);
        assert_eq!(scalar_field(fd, "PX_LAST").unwrap(), Some(Value::Float(140.0)));

        let rows = bulk_rows("IBM US Equity", fd, "INDX_MWEIGHT").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].position, None);
        assert!(rows[0].values.is_empty());
    }

    #[test]
    fn bulk_elements_get_positions_in_order() {
        let doc = decode(
            &SecurityData::new("BCOM Index", 0)
                .fields(vec![weights(3)])
                .build(),
        );
        let rows = bulk_rows("BCOM Index", field_data(&doc).unwrap(), "INDX_MWEIGHT").unwrap();
        let positions: Vec<_> = rows.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(
            rows[2].values[0],
            (
                "Member Ticker and Exchange Code".to_string(),
                Value::from("M2")
            )
        );
    }

    #[test]
    fn null_field_value_is_kept_as_null() {
        let doc = decode(
            &SecurityData::new("IBM US Equity", 0)
                .fields(vec![ElementNode::null("PX_LAST", DataType::Float64)])
                .build(),
        );
        assert_eq!(
            scalar_field(field_data(&doc).unwrap(), "PX_LAST").unwrap(),
            Some(Value::Null)
        );
    }

    #[test]
    fn response_error_is_reported() {
        let doc = decode(&response_error("ReferenceDataResponse", "BAD_ARGS", "no securities").element);
        match security_records(&doc) {
            Err(ValidationError::ResponseError { category, message }) => {
                assert_eq!(category, "BAD_ARGS");
                assert_eq!(message, "no securities");
            }
            other => panic!("expected response error, got {other:?}"),
        }
    }

    #[test]
    fn missing_security_data_is_malformed() {
        let doc = decode(&ElementNode::sequence("ReferenceDataResponse", vec![]));
        assert!(matches!(
            security_records(&doc),
            Err(ValidationError::Malformed { .. })
        ));
    }
}
