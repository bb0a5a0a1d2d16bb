use std::fmt;

use serde::{Deserialize, Serialize};

use crate::element::Value;

/// Пара override: `(fieldId, value)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    pub field_id: String,
    pub value: Value,
}

impl Override {
    pub fn new(field_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field_id: field_id.into(),
            value: value.into(),
        }
    }
}

/// Скалярный параметр запроса: `(name, value)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
    pub value: Value,
}

impl Setting {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Исходящий запрос.
///
/// После сборки меняется только список override (перебор дат при
/// повторной отправке одного и того же запроса).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    service: String,
    kind: String,
    subjects: Vec<String>,
    fields: Vec<String>,
    settings: Vec<Setting>,
    overrides: Vec<Override>,
}

impl Request {
    pub fn builder(service: impl Into<String>, kind: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            request: Request {
                service: service.into(),
                kind: kind.into(),
                subjects: Vec::new(),
                fields: Vec::new(),
                settings: Vec::new(),
                overrides: Vec::new(),
            },
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }

    pub fn overrides(&self) -> &[Override] {
        &self.overrides
    }

    /// Значение скалярного параметра по имени
    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings.iter().find(|s| s.name == name).map(|s| &s.value)
    }

    /// Значение override по полю
    pub fn override_value(&self, field_id: &str) -> Option<&Value> {
        self.overrides
            .iter()
            .find(|o| o.field_id == field_id)
            .map(|o| &o.value)
    }

    /// Ставит override: заменяет значение существующего поля или добавляет новое
    pub fn set_override(&mut self, field_id: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.overrides.iter_mut().find(|o| o.field_id == field_id) {
            Some(o) => o.value = value,
            None => self.overrides.push(Override::new(field_id, value)),
        }
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, v: &Value) -> fmt::Result {
    match v {
        Value::String(s) => write!(f, "{s:?}"),
        other => write!(f, "{other}"),
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} = {{", self.kind)?;
        if !self.subjects.is_empty() {
            writeln!(f, "    securities[] = {:?}", self.subjects)?;
        }
        if !self.fields.is_empty() {
            writeln!(f, "    fields[] = {:?}", self.fields)?;
        }
        for s in &self.settings {
            write!(f, "    {} = ", s.name)?;
            write_value(f, &s.value)?;
            writeln!(f)?;
        }
        if !self.overrides.is_empty() {
            writeln!(f, "    overrides[] = {{")?;
            for o in &self.overrides {
                write!(f, "        overrides = {{ fieldId = {:?} value = ", o.field_id)?;
                write_value(f, &o.value)?;
                writeln!(f, " }}")?;
            }
            writeln!(f, "    }}")?;
        }
        writeln!(f, "}}")
    }
}

/// Чисто структурная сборка запроса: без проверки смысла полей и инструментов
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.request.subjects.push(subject.into());
        self
    }

    pub fn subjects<S: AsRef<str>>(mut self, subjects: &[S]) -> Self {
        self.request
            .subjects
            .extend(subjects.iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.request.fields.push(field.into());
        self
    }

    pub fn fields<F: AsRef<str>>(mut self, fields: &[F]) -> Self {
        self.request
            .fields
            .extend(fields.iter().map(|f| f.as_ref().to_string()));
        self
    }

    pub fn setting(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.request.settings.push(Setting::new(name, value));
        self
    }

    pub fn settings(mut self, settings: &[Setting]) -> Self {
        self.request.settings.extend_from_slice(settings);
        self
    }

    pub fn with_override(mut self, field_id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.request.overrides.push(Override::new(field_id, value));
        self
    }

    pub fn overrides(mut self, overrides: &[Override]) -> Self {
        self.request.overrides.extend_from_slice(overrides);
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{REFDATA_SERVICE, REFERENCE_DATA_REQUEST};

    fn sample() -> Request {
        Request::builder(REFDATA_SERVICE, REFERENCE_DATA_REQUEST)
            .subjects(&["TSLA US Equity", "AAPL US Equity"])
            .fields(&["PX_LAST", "NAME"])
            .setting("returnEids", true)
            .with_override("EQY_FUND_CRNCY", "USD")
            .build()
    }

    #[test]
    fn builder_keeps_input_order() {
        let req = sample();
        assert_eq!(req.subjects(), ["TSLA US Equity", "AAPL US Equity"]);
        assert_eq!(req.fields(), ["PX_LAST", "NAME"]);
        assert_eq!(req.setting("returnEids"), Some(&Value::Bool(true)));
        assert_eq!(req.overrides(), [Override::new("EQY_FUND_CRNCY", "USD")]);
    }

    #[test]
    fn set_override_replaces_existing_value() {
        let mut req = sample();
        req.set_override("REFERENCE_DATE", "20160625");
        req.set_override("REFERENCE_DATE", "20160626");

        assert_eq!(req.overrides().len(), 2);
        assert_eq!(
            req.override_value("REFERENCE_DATE"),
            Some(&Value::from("20160626"))
        );
    }

    #[test]
    fn display_lists_everything() {
        let text = sample().to_string();
        assert!(text.starts_with("ReferenceDataRequest = {"));
        assert!(text.contains("securities[] = [\"TSLA US Equity\", \"AAPL US Equity\"]"));
        assert!(text.contains("returnEids = true"));
        assert!(text.contains("fieldId = \"EQY_FUND_CRNCY\" value = \"USD\""));
    }
}
