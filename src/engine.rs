use std::sync::Arc;

use crate::cache::{CacheKey, ResultCache};
use crate::data::distribution::{distribution, Distribution};
use crate::data::export::{export_dataset, export_distribution, ExportFormat};
use crate::data::filter::FilterSet;
use crate::data::model::Dataset;
use crate::error::{DistributionError, Error, ExportError, FilterError};

const FILTER: &str = "filter";
const DISTRIBUTION: &str = "distribution";
const EXPORT_DATASET: &str = "export_dataset";
const EXPORT_DISTRIBUTION: &str = "export_distribution";

/// Filtering, aggregation and export with memoized results.
///
/// Inputs are never mutated; every result is a new value shared via `Arc`.
#[derive(Debug, Default)]
pub struct Engine {
    cache: ResultCache,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Rows of `dataset` matching every predicate of `filters`. An empty
    /// result is a success.
    pub fn filter(&self, dataset: &Dataset, filters: &FilterSet) -> Result<Arc<Dataset>, FilterError> {
        let key = CacheKey::new(dataset.fingerprint(), FILTER, filters.cache_key());
        self.cache.try_memoize(key, || {
            let filtered = filters.apply(dataset)?;
            log::info!(
                "filter kept {} of {} rows ({} predicates)",
                filtered.len(),
                dataset.len(),
                filters.len()
            );
            Ok(filtered)
        })
    }

    pub fn distribution(
        &self,
        dataset: &Dataset,
        target: &str,
    ) -> Result<Arc<Distribution>, DistributionError> {
        let key = CacheKey::new(dataset.fingerprint(), DISTRIBUTION, target);
        self.cache.try_memoize(key, || distribution(dataset, target))
    }

    pub fn export_dataset(
        &self,
        dataset: &Dataset,
        format: ExportFormat,
    ) -> Result<Arc<Vec<u8>>, ExportError> {
        let key = CacheKey::new(dataset.fingerprint(), EXPORT_DATASET, format.to_string());
        self.cache.try_memoize(key, || export_dataset(dataset, format))
    }

    /// Export the distribution of `target` over `dataset`.
    pub fn export_distribution(
        &self,
        dataset: &Dataset,
        target: &str,
        format: ExportFormat,
    ) -> Result<Arc<Vec<u8>>, Error> {
        let dist = self.distribution(dataset, target)?;
        let key = CacheKey::new(
            dataset.fingerprint(),
            EXPORT_DISTRIBUTION,
            format!("{target}:{format}"),
        );
        Ok(self
            .cache
            .try_memoize(key, || export_distribution(&dist, format))?)
    }
}
