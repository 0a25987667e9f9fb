// =============================================================================
// Price providers — where daily history comes from
// =============================================================================

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::universe::UniverseCandidate;
use crate::error::ProviderError;
use crate::types::{PriceBar, PriceSeries, StockId};

#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Per-stock facts for the evaluation date, used by the fallback universe
    /// filter when no eligibility snapshot exists.
    async fn candidates(&self, date: NaiveDate) -> Result<Vec<UniverseCandidate>, ProviderError>;

    /// Up to `bars` daily bars ending on or before `as_of`.
    async fn fetch_series(
        &self,
        stock_id: &StockId,
        as_of: NaiveDate,
        bars: usize,
    ) -> Result<PriceSeries, ProviderError>;
}

/// Provider over series already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceProvider {
    series: BTreeMap<StockId, PriceSeries>,
}

impl InMemoryPriceProvider {
    pub fn new(series: impl IntoIterator<Item = PriceSeries>) -> Self {
        Self {
            series: series
                .into_iter()
                .map(|s| (s.stock_id().clone(), s))
                .collect(),
        }
    }

    pub fn series(&self) -> impl Iterator<Item = &PriceSeries> {
        self.series.values()
    }
}

#[async_trait]
impl PriceProvider for InMemoryPriceProvider {
    async fn candidates(&self, date: NaiveDate) -> Result<Vec<UniverseCandidate>, ProviderError> {
        Ok(self
            .series
            .values()
            .filter_map(|s| UniverseCandidate::from_series(s, date))
            .collect())
    }

    async fn fetch_series(
        &self,
        stock_id: &StockId,
        as_of: NaiveDate,
        bars: usize,
    ) -> Result<PriceSeries, ProviderError> {
        self.series
            .get(stock_id)
            .map(|s| s.truncated(as_of, bars))
            .ok_or_else(|| ProviderError::NotFound(stock_id.to_string()))
    }
}

/// On-disk shape of `<dir>/<stock_id>.json`.
#[derive(Debug, Deserialize)]
struct SeriesFile {
    #[serde(default)]
    name: String,
    bars: Vec<PriceBar>,
}

/// Reads one JSON file per stock from a directory.
#[derive(Debug, Clone)]
pub struct JsonDirProvider {
    dir: PathBuf,
}

impl JsonDirProvider {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, stock_id: &StockId) -> PathBuf {
        self.dir.join(format!("{}.json", stock_id.as_str()))
    }

    async fn read_series(&self, stock_id: &StockId) -> Result<PriceSeries, ProviderError> {
        let path = self.path_for(stock_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProviderError::NotFound(stock_id.to_string()))
            }
            Err(e) => return Err(ProviderError::Transient(format!("{}: {e}", path.display()))),
        };
        let file: SeriesFile = serde_json::from_str(&content)
            .map_err(|e| ProviderError::Malformed(format!("{}: {e}", path.display())))?;
        let name = if file.name.is_empty() {
            stock_id.to_string()
        } else {
            file.name
        };
        PriceSeries::new(stock_id.clone(), name, file.bars)
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    /// Stock ids with a data file, ascending.
    pub async fn stock_ids(&self) -> Result<Vec<StockId>, ProviderError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| ProviderError::Transient(format!("{}: {e}", self.dir.display())))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(StockId::new(stem));
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Every readable series in the directory. Unreadable files are logged and
    /// skipped.
    pub async fn load_all(&self) -> Result<Vec<PriceSeries>, ProviderError> {
        let ids = self.stock_ids().await?;
        let mut all = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.read_series(id).await {
                Ok(s) => all.push(s),
                Err(e) => warn!(stock = %id, error = %e, "skipping unreadable price file"),
            }
        }
        info!(dir = %self.dir.display(), files = ids.len(), loaded = all.len(), "price history loaded");
        Ok(all)
    }
}

#[async_trait]
impl PriceProvider for JsonDirProvider {
    async fn candidates(&self, date: NaiveDate) -> Result<Vec<UniverseCandidate>, ProviderError> {
        let all = self.load_all().await?;
        let candidates: Vec<UniverseCandidate> = all
            .iter()
            .filter_map(|s| UniverseCandidate::from_series(s, date))
            .collect();
        debug!(%date, candidates = candidates.len(), "candidates built from price files");
        Ok(candidates)
    }

    async fn fetch_series(
        &self,
        stock_id: &StockId,
        as_of: NaiveDate,
        bars: usize,
    ) -> Result<PriceSeries, ProviderError> {
        Ok(self.read_series(stock_id).await?.truncated(as_of, bars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::series_from_closes;

    fn write_series(dir: &Path, series: &PriceSeries) {
        let body = serde_json::json!({ "name": series.name(), "bars": series.bars() });
        std::fs::write(
            dir.join(format!("{}.json", series.stock_id())),
            serde_json::to_string(&body).unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn in_memory_truncates_to_as_of() {
        let s = series_from_closes("A", &(0..50).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let as_of = s.bars()[39].date;
        let p = InMemoryPriceProvider::new([s]);
        let got = p.fetch_series(&StockId::new("A"), as_of, 30).await.unwrap();
        assert_eq!(got.len(), 30);
        assert_eq!(got.bars().last().unwrap().date, as_of);
        assert!(matches!(
            p.fetch_series(&StockId::new("Z"), as_of, 30).await,
            Err(ProviderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn json_dir_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let s = series_from_closes("005930", &[100.0, 101.0, 102.0]);
        write_series(dir.path(), &s);
        std::fs::write(dir.path().join("BAD.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let p = JsonDirProvider::new(dir.path());
        assert_eq!(p.stock_ids().await.unwrap(), vec![StockId::new("005930"), StockId::new("BAD")]);

        let last = s.bars()[2].date;
        let got = p.fetch_series(&StockId::new("005930"), last, 60).await.unwrap();
        assert_eq!(got.name(), "Stock 005930");
        assert_eq!(got.len(), 3);
        assert_eq!(got.bars()[2].close, 102.0);
        assert!(matches!(
            p.fetch_series(&StockId::new("BAD"), last, 60).await,
            Err(ProviderError::Malformed(_))
        ));
        assert_eq!(p.load_all().await.unwrap().len(), 1);
        assert_eq!(p.candidates(last).await.unwrap().len(), 1);
    }
}
