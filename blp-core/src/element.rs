use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ElementError;

/// Тип данных элемента
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Char,
    Byte,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    ByteArray,
    Date,
    Time,
    Decimal,
    Datetime,
    Enumeration,
    /// Запись из именованных дочерних элементов
    Sequence,
    /// Tagged union: выбран ровно один вариант
    Choice,
    CorrelationId,
}

/// Скалярное значение листа
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Целое значение; дробные и не помещающиеся в `i64` числа дают `None`
    pub fn as_i64(&self) -> Option<i64> {
        // -2^63 и 2^63 представимы в f64 точно
        const RANGE: std::ops::Range<f64> = (i64::MIN as f64)..(i64::MAX as f64);
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(x) if x.fract() == 0.0 && RANGE.contains(x) => Some(*x as i64),
            _ => None,
        }
    }

    /// Тип данных, который получает лист с таким значением по умолчанию
    pub fn datatype(&self) -> DataType {
        match self {
            Value::Null | Value::String(_) => DataType::String,
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int64,
            Value::Float(_) => DataType::Float64,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

/// Примитивы интроспекции узла ответа.
///
/// Это всё, что декодер знает о полезной нагрузке: форму узла он выясняет
/// только через эти методы, без схемы.
pub trait Element {
    fn name(&self) -> &str;
    fn datatype(&self) -> DataType;
    fn is_array(&self) -> bool;
    fn is_null(&self) -> bool;
    /// Значение листа
    fn get_value(&self) -> Result<Value, ElementError>;
    /// Именованные дочерние элементы записи
    fn elements(&self) -> Vec<&Self>;
    /// Элементы массива
    fn values(&self) -> Vec<&Self>;
    /// Выбранный вариант choice
    fn get_choice(&self) -> Result<&Self, ElementError>;
}

/// Содержимое узла
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Content {
    Null,
    Value(Value),
    Elements(Vec<ElementNode>),
    Values(Vec<ElementNode>),
    Choice(Box<ElementNode>),
    /// Значение есть, но извлечь его нельзя
    Malformed,
}

/// Владеющая реализация [`Element`]: то, что ходит по wire и из чего строятся ответы.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    name: String,
    datatype: DataType,
    content: Content,
}

impl ElementNode {
    pub fn new(name: impl Into<String>, datatype: DataType, content: Content) -> Self {
        Self {
            name: name.into(),
            datatype,
            content,
        }
    }

    /// Лист, тип данных выводится из значения
    pub fn value(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let datatype = value.datatype();
        Self::new(name, datatype, Content::Value(value))
    }

    /// Лист с явным типом данных (например `Date`)
    pub fn typed(name: impl Into<String>, datatype: DataType, value: impl Into<Value>) -> Self {
        Self::new(name, datatype, Content::Value(value.into()))
    }

    pub fn null(name: impl Into<String>, datatype: DataType) -> Self {
        Self::new(name, datatype, Content::Null)
    }

    pub fn malformed(name: impl Into<String>, datatype: DataType) -> Self {
        Self::new(name, datatype, Content::Malformed)
    }

    pub fn sequence(name: impl Into<String>, children: Vec<ElementNode>) -> Self {
        Self::new(name, DataType::Sequence, Content::Elements(children))
    }

    /// Массив; `datatype`: тип его элементов
    pub fn array(name: impl Into<String>, datatype: DataType, items: Vec<ElementNode>) -> Self {
        Self::new(name, datatype, Content::Values(items))
    }

    pub fn choice(name: impl Into<String>, selected: ElementNode) -> Self {
        Self::new(name, DataType::Choice, Content::Choice(Box::new(selected)))
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Дочерний элемент записи по имени
    pub fn child(&self, name: &str) -> Option<&ElementNode> {
        match &self.content {
            Content::Elements(children) => children.iter().find(|c| c.name == name),
            _ => None,
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "    ".repeat(depth);
        match &self.content {
            Content::Null => writeln!(f, "{pad}{} = null", self.name),
            Content::Malformed => writeln!(f, "{pad}{} = <malformed>", self.name),
            Content::Value(Value::String(s)) => writeln!(f, "{pad}{} = {s:?}", self.name),
            Content::Value(v) => writeln!(f, "{pad}{} = {v}", self.name),
            Content::Elements(children) => {
                writeln!(f, "{pad}{} = {{", self.name)?;
                for c in children {
                    c.write_indented(f, depth + 1)?;
                }
                writeln!(f, "{pad}}}")
            }
            Content::Values(items) => {
                writeln!(f, "{pad}{}[] = {{", self.name)?;
                for item in items {
                    item.write_indented(f, depth + 1)?;
                }
                writeln!(f, "{pad}}}")
            }
            Content::Choice(selected) => {
                writeln!(f, "{pad}{} = {{", self.name)?;
                selected.write_indented(f, depth + 1)?;
                writeln!(f, "{pad}}}")
            }
        }
    }
}

impl fmt::Display for ElementNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl Element for ElementNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn datatype(&self) -> DataType {
        self.datatype
    }

    fn is_array(&self) -> bool {
        matches!(self.content, Content::Values(_))
    }

    fn is_null(&self) -> bool {
        matches!(self.content, Content::Null)
    }

    fn get_value(&self) -> Result<Value, ElementError> {
        match &self.content {
            Content::Value(v) => Ok(v.clone()),
            Content::Null => Ok(Value::Null),
            Content::Malformed => Err(ElementError::Malformed(self.name.clone())),
            _ => Err(ElementError::NotAScalar(self.name.clone())),
        }
    }

    fn elements(&self) -> Vec<&Self> {
        match &self.content {
            Content::Elements(children) => children.iter().collect(),
            Content::Choice(selected) => vec![selected.as_ref()],
            _ => Vec::new(),
        }
    }

    fn values(&self) -> Vec<&Self> {
        match &self.content {
            Content::Values(items) => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    fn get_choice(&self) -> Result<&Self, ElementError> {
        match &self.content {
            Content::Choice(selected) => Ok(selected.as_ref()),
            _ => Err(ElementError::NotAChoice(self.name.clone())),
        }
    }
}
