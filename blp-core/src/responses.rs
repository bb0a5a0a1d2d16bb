//! Построение ответов сервиса в той форме, в которой их присылает хост.
//!
//! Используется эмулятором и тестами; клиентский код ответы только разбирает.

use crate::constants::INVALID_FIELD;
use crate::element::{DataType, ElementNode, Value};
use crate::event::Message;

/// Блок `errorInfo` / `securityError` / `responseError`
pub fn error_info(name: &str, category: &str, subcategory: &str, message: &str) -> ElementNode {
    ElementNode::sequence(
        name,
        vec![
            ElementNode::value("source", "blp-emulator"),
            ElementNode::value("code", 0_i64),
            ElementNode::value("category", category),
            ElementNode::value("message", message),
            ElementNode::value("subcategory", subcategory),
        ],
    )
}

/// Исключение по одному полю
pub fn field_exception(field_id: &str, subcategory: &str, message: &str) -> ElementNode {
    ElementNode::sequence(
        "fieldExceptions",
        vec![
            ElementNode::value("fieldId", field_id),
            error_info("errorInfo", "BAD_FLD", subcategory, message),
        ],
    )
}

/// Исключение "поле не существует"
pub fn invalid_field(field_id: &str) -> ElementNode {
    field_exception(field_id, INVALID_FIELD, "Field not valid")
}

/// Bulk-поле: массив записей `(имя, значение)`
pub fn bulk_field(field: &str, rows: Vec<Vec<(String, Value)>>) -> ElementNode {
    let items = rows
        .into_iter()
        .map(|row| {
            let children = row
                .into_iter()
                .map(|(name, value)| ElementNode::value(name, value))
                .collect();
            ElementNode::sequence(field, children)
        })
        .collect();
    ElementNode::array(field, DataType::Sequence, items)
}

/// Одна запись `securityData`
#[derive(Debug, Clone)]
pub struct SecurityData {
    security: String,
    sequence_number: i64,
    error: Option<ElementNode>,
    exceptions: Vec<ElementNode>,
    field_data: Option<ElementNode>,
}

impl SecurityData {
    pub fn new(security: impl Into<String>, sequence_number: usize) -> Self {
        Self {
            security: security.into(),
            sequence_number: sequence_number as i64,
            error: None,
            exceptions: Vec::new(),
            field_data: None,
        }
    }

    /// Инструмент не распознан
    pub fn security_error(mut self, message: &str) -> Self {
        self.error = Some(error_info(
            "securityError",
            "BAD_SEC",
            "INVALID_SECURITY",
            message,
        ));
        self
    }

    pub fn exception(mut self, exception: ElementNode) -> Self {
        self.exceptions.push(exception);
        self
    }

    /// `fieldData` справочного запроса: одна запись
    pub fn fields(mut self, fields: Vec<ElementNode>) -> Self {
        self.field_data = Some(ElementNode::sequence("fieldData", fields));
        self
    }

    /// `fieldData` исторического запроса: по записи на дату
    pub fn history(mut self, rows: Vec<Vec<ElementNode>>) -> Self {
        let items = rows
            .into_iter()
            .map(|row| ElementNode::sequence("fieldData", row))
            .collect();
        self.field_data = Some(ElementNode::array("fieldData", DataType::Sequence, items));
        self
    }

    pub fn build(self) -> ElementNode {
        let mut children = vec![
            ElementNode::value("security", self.security),
            ElementNode::array("eidData", DataType::Int32, Vec::new()),
        ];
        children.extend(self.error);
        children.push(ElementNode::array(
            "fieldExceptions",
            DataType::Sequence,
            self.exceptions,
        ));
        children.push(ElementNode::value("sequenceNumber", self.sequence_number));
        children.push(
            self.field_data
                .unwrap_or_else(|| ElementNode::sequence("fieldData", Vec::new())),
        );
        ElementNode::sequence("securityData", children)
    }
}

/// `ReferenceDataResponse` с массивом `securityData`
pub fn reference_response(records: Vec<SecurityData>) -> Message {
    let records = records.into_iter().map(SecurityData::build).collect();
    let root = ElementNode::sequence(
        "ReferenceDataResponse",
        vec![ElementNode::array("securityData", DataType::Sequence, records)],
    );
    Message::new("ReferenceDataResponse", root)
}

/// `HistoricalDataResponse`: один инструмент на сообщение
pub fn historical_response(record: SecurityData) -> Message {
    let root = ElementNode::sequence("HistoricalDataResponse", vec![record.build()]);
    Message::new("HistoricalDataResponse", root)
}

/// Отказ сервиса по запросу целиком
pub fn response_error(message_type: &str, category: &str, message: &str) -> Message {
    let root = ElementNode::sequence(
        message_type,
        vec![error_info("responseError", category, "", message)],
    );
    Message::new(message_type, root)
}

/// Один бар `barTickData`
#[derive(Debug, Clone, PartialEq)]
pub struct BarTick {
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub num_events: i64,
}

impl BarTick {
    fn into_node(self) -> ElementNode {
        ElementNode::sequence(
            "barTickData",
            vec![
                ElementNode::typed("time", DataType::Datetime, self.time),
                ElementNode::value("open", self.open),
                ElementNode::value("high", self.high),
                ElementNode::value("low", self.low),
                ElementNode::value("close", self.close),
                ElementNode::value("volume", self.volume),
                ElementNode::value("numEvents", self.num_events),
                ElementNode::value("value", self.close * self.volume as f64),
            ],
        )
    }
}

/// `IntradayBarResponse`
pub fn intraday_response(bars: Vec<BarTick>) -> Message {
    let ticks = bars.into_iter().map(BarTick::into_node).collect();
    let root = ElementNode::sequence(
        "IntradayBarResponse",
        vec![ElementNode::sequence(
            "barData",
            vec![
                ElementNode::array("eidData", DataType::Int32, Vec::new()),
                ElementNode::array("barTickData", DataType::Sequence, ticks),
            ],
        )],
    );
    Message::new("IntradayBarResponse", root)
}

/// `GridResponse` на `ExcelGetGridRequest`: по одной строке на тикер
pub fn grid_response(tickers: &[String]) -> Message {
    let records = tickers
        .iter()
        .map(|ticker| {
            let field = ElementNode::choice(
                "DataFields",
                ElementNode::value("StringValue", ticker.as_str()),
            );
            ElementNode::sequence(
                "DataRecords",
                vec![ElementNode::array(
                    "DataFields",
                    DataType::Choice,
                    vec![field],
                )],
            )
        })
        .collect();
    let root = ElementNode::sequence(
        "GridResponse",
        vec![
            ElementNode::value("NumOfFields", 1_i64),
            ElementNode::value("NumOfRecords", tickers.len() as i64),
            ElementNode::array(
                "ColumnTitles",
                DataType::String,
                vec![ElementNode::value("ColumnTitles", "Ticker")],
            ),
            ElementNode::array("DataRecords", DataType::Sequence, records),
        ],
    );
    Message::new("GridResponse", root)
}

/// `BeqsResponse`: `data.securityData[]`
pub fn beqs_response(records: Vec<SecurityData>) -> Message {
    let records = records.into_iter().map(SecurityData::build).collect();
    let root = ElementNode::sequence(
        "BeqsResponse",
        vec![ElementNode::sequence(
            "data",
            vec![ElementNode::array("securityData", DataType::Sequence, records)],
        )],
    );
    Message::new("BeqsResponse", root)
}
