use std::path::Path;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::data::distribution::Distribution;
use crate::data::export::ExportFormat;
use crate::data::filter::FilterSet;
use crate::data::layout::Selections;
use crate::data::loader::{self, SourceFormat};
use crate::data::model::Dataset;
use crate::engine::Engine;
use crate::error::{DistributionError, Error, LoadError};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Outcome of one filter-apply action.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub filters: FilterSet,
    pub filtered: Arc<Dataset>,
    pub raw_distribution: Result<Arc<Distribution>, DistributionError>,
    /// `EmptyDataset` here means the filters matched nothing.
    pub filtered_distribution: Result<Arc<Distribution>, DistributionError>,
}

/// One analyst session: the loaded dataset plus the engine that caches
/// everything derived from it. Independent of any rendering.
#[derive(Debug)]
pub struct Session {
    config: AppConfig,
    engine: Engine,
    /// Loaded dataset (None until a file is loaded).
    dataset: Option<Arc<Dataset>>,
}

impl Session {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            engine: Engine::new(),
            dataset: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    /// Parse an upload. On failure the previous dataset stays loaded.
    pub fn load_bytes(
        &mut self,
        bytes: &[u8],
        hint: Option<SourceFormat>,
    ) -> Result<Arc<Dataset>, LoadError> {
        let dataset = loader::load_bytes(bytes, hint, &self.config.load_options())?;
        Ok(self.set_dataset(dataset))
    }

    pub fn load_file(&mut self, path: &Path) -> Result<Arc<Dataset>, LoadError> {
        let dataset = loader::load_file(path, &self.config.load_options())?;
        Ok(self.set_dataset(dataset))
    }

    /// Ingest a newly loaded dataset. Cached results of the previous one
    /// (and of everything filtered from it) are dropped.
    pub fn set_dataset(&mut self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        if let Some(old) = self.dataset.replace(Arc::clone(&dataset)) {
            if old.fingerprint() != dataset.fingerprint() {
                log::debug!("dropping {} cache entries", self.engine.cache().len());
                self.engine.cache().clear();
            }
        }
        dataset
    }

    fn current(&self) -> Result<&Arc<Dataset>, Error> {
        self.dataset.as_ref().ok_or(Error::NoDataset)
    }

    /// Filter the loaded dataset and compute both target distributions.
    pub fn apply(&self, selections: &Selections) -> Result<Comparison, Error> {
        let raw = self.current()?;
        let filters = self.config.filters.build(raw, selections)?;
        let filtered = self.engine.filter(raw, &filters)?;

        let target = self.config.target_column.as_str();
        let raw_distribution = self.engine.distribution(raw, target);
        let filtered_distribution = self.engine.distribution(&filtered, target);
        if let Err(e) = &filtered_distribution {
            log::warn!("filtered distribution unavailable: {e}");
        }

        Ok(Comparison {
            filters,
            filtered,
            raw_distribution,
            filtered_distribution,
        })
    }

    pub fn export_raw(&self, format: ExportFormat) -> Result<Arc<Vec<u8>>, Error> {
        Ok(self.engine.export_dataset(self.current()?, format)?)
    }

    pub fn export_filtered(
        &self,
        comparison: &Comparison,
        format: ExportFormat,
    ) -> Result<Arc<Vec<u8>>, Error> {
        Ok(self.engine.export_dataset(&comparison.filtered, format)?)
    }

    pub fn export_raw_distribution(&self, format: ExportFormat) -> Result<Arc<Vec<u8>>, Error> {
        self.engine
            .export_distribution(self.current()?, &self.config.target_column, format)
    }

    pub fn export_filtered_distribution(
        &self,
        comparison: &Comparison,
        format: ExportFormat,
    ) -> Result<Arc<Vec<u8>>, Error> {
        self.engine
            .export_distribution(&comparison.filtered, &self.config.target_column, format)
    }
}
