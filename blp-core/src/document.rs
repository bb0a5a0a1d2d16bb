use log::trace;

use crate::element::{DataType, Element, Value};

/// Декодированное дерево ответа.
///
/// Закрытый набор вариантов: потребители разбирают его `match`-ем целиком.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// Лист; `Value::Null` означает явный null, а не отсутствие
    Scalar(Value),
    /// Массив, порядок сохраняется
    Sequence(Vec<Document>),
    /// Запись, порядок объявления сохраняется
    Mapping(Vec<(String, Document)>),
    /// Выбранный вариант tagged union
    Choice(String, Box<Document>),
}

impl Document {
    pub fn null() -> Self {
        Document::Scalar(Value::Null)
    }

    /// Значение записи по ключу
    pub fn get(&self, key: &str) -> Option<&Document> {
        match self {
            Document::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Document::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_sequence(&self) -> Option<&[Document]> {
        match self {
            Document::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[(String, Document)]> {
        match self {
            Document::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// `(имя варианта, значение)` для choice
    pub fn as_choice(&self) -> Option<(&str, &Document)> {
        match self {
            Document::Choice(name, doc) => Some((name, doc)),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Document::Scalar(Value::Null))
    }
}

/// Рекурсивно превращает узел ответа в [`Document`].
///
/// Тотальна: сбой извлечения значения даёт null, а не ошибку.
pub fn decode<E: Element>(elem: &E) -> Document {
    if elem.datatype() == DataType::Choice && !elem.is_array() {
        return match elem.get_choice() {
            Ok(selected) => {
                Document::Choice(selected.name().to_string(), Box::new(decode(selected)))
            }
            Err(e) => {
                trace!("decoding {} as null: {e}", elem.name());
                Document::null()
            }
        };
    }

    if elem.is_array() {
        return Document::Sequence(elem.values().into_iter().map(|v| decode(v)).collect());
    }

    if elem.datatype() == DataType::Sequence {
        return Document::Mapping(
            elem.elements()
                .into_iter()
                .map(|c| (c.name().to_string(), decode(c)))
                .collect(),
        );
    }

    if elem.is_null() {
        return Document::null();
    }

    match elem.get_value() {
        Ok(v) => Document::Scalar(v),
        Err(e) => {
            trace!("decoding {} as null: {e}", elem.name());
            Document::null()
        }
    }
}
