use std::collections::BTreeMap;

use crate::error::PumpError;
use crate::event::CorrelationId;

/// Учёт отправленных токенов и накопление результатов по ним.
///
/// Ответы на разные токены могут приходить вперемешку, поэтому результаты
/// раскладываются по токену, а не по позиции.
#[derive(Debug)]
pub struct CorrelationTracker<T> {
    sent: Vec<CorrelationId>,
    results: BTreeMap<CorrelationId, Vec<T>>,
}

impl<T> Default for CorrelationTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CorrelationTracker<T> {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            results: BTreeMap::new(),
        }
    }

    /// Регистрирует токен отправленного запроса
    pub fn register(&mut self, id: CorrelationId) -> CorrelationId {
        self.results.entry(id.clone()).or_default();
        self.sent.push(id.clone());
        id
    }

    /// Сколько логических ответов (событий `Response`) ожидается
    pub fn outstanding(&self) -> usize {
        self.sent.len()
    }

    pub fn is_registered(&self, id: &CorrelationId) -> bool {
        self.results.contains_key(id)
    }

    /// Первый известный токен из тех, что несёт сообщение
    pub fn resolve(&self, ids: &[CorrelationId]) -> Result<CorrelationId, PumpError> {
        ids.iter()
            .find(|id| self.is_registered(id))
            .cloned()
            .ok_or_else(|| PumpError::UnknownCorrelation {
                ids: ids.iter().map(|id| id.as_str().to_string()).collect(),
            })
    }

    pub fn record(&mut self, id: &CorrelationId, item: T) -> Result<(), PumpError> {
        self.extend(id, std::iter::once(item))
    }

    pub fn extend(
        &mut self,
        id: &CorrelationId,
        items: impl IntoIterator<Item = T>,
    ) -> Result<(), PumpError> {
        match self.results.get_mut(id) {
            Some(acc) => {
                acc.extend(items);
                Ok(())
            }
            None => Err(PumpError::UnknownCorrelation {
                ids: vec![id.as_str().to_string()],
            }),
        }
    }

    pub fn results(&self, id: &CorrelationId) -> &[T] {
        self.results.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Все результаты в порядке токенов
    pub fn into_results(self) -> impl Iterator<Item = (CorrelationId, Vec<T>)> {
        self.results.into_iter()
    }
}
