//! In-memory summary store

use super::SummaryStore;
use crate::error::Result;
use crate::types::DailySummary;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Map-backed summary store for development and tests
#[derive(Debug, Default)]
pub struct MemorySummaryStore {
    rows: Mutex<BTreeMap<NaiveDate, DailySummary>>,
}

impl MemorySummaryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

fn empty_row(date: NaiveDate) -> DailySummary {
    DailySummary {
        date,
        mean_temperature: None,
        mean_humidity: None,
        min_temperature: None,
    }
}

#[async_trait]
impl SummaryStore for MemorySummaryStore {
    fn store_id(&self) -> &str {
        "memory"
    }

    async fn upsert_means(&self, date: NaiveDate, temperature: f64, humidity: f64) -> Result<()> {
        let mut rows = self.rows.lock();
        let row = rows.entry(date).or_insert_with(|| empty_row(date));
        row.mean_temperature = Some(temperature);
        row.mean_humidity = Some(humidity);
        Ok(())
    }

    async fn lower_min_temperature(&self, date: NaiveDate, value: f64) -> Result<bool> {
        let mut rows = self.rows.lock();
        let Some(row) = rows.get_mut(&date) else {
            return Ok(false);
        };
        match row.min_temperature {
            Some(current) if current <= value => Ok(false),
            _ => {
                row.min_temperature = Some(value);
                Ok(true)
            },
        }
    }

    async fn get(&self, date: NaiveDate) -> Result<Option<DailySummary>> {
        Ok(self.rows.lock().get(&date).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_keeps_minimum() {
        let store = MemorySummaryStore::new();
        store.upsert_means(day(), 20.0, 50.0).await.unwrap();
        assert!(store.lower_min_temperature(day(), 20.0).await.unwrap());

        store.upsert_means(day(), 25.0, 55.0).await.unwrap();
        let row = store.get(day()).await.unwrap().unwrap();
        assert_eq!(row.mean_temperature, Some(25.0));
        assert_eq!(row.mean_humidity, Some(55.0));
        assert_eq!(row.min_temperature, Some(20.0));
    }

    #[tokio::test]
    async fn test_minimum_only_decreases() {
        let store = MemorySummaryStore::new();
        store.upsert_means(day(), 20.0, 50.0).await.unwrap();
        assert!(store.lower_min_temperature(day(), 18.0).await.unwrap());
        assert!(!store.lower_min_temperature(day(), 19.0).await.unwrap());
        assert!(!store.lower_min_temperature(day(), 18.0).await.unwrap());
        assert!(store.lower_min_temperature(day(), -2.5).await.unwrap());

        let row = store.get(day()).await.unwrap().unwrap();
        assert_eq!(row.min_temperature, Some(-2.5));
    }

    #[tokio::test]
    async fn test_missing_row() {
        let store = MemorySummaryStore::new();
        assert!(store.get(day()).await.unwrap().is_none());
        assert!(!store.lower_min_temperature(day(), 1.0).await.unwrap());
        assert!(store.is_empty());
    }
}
