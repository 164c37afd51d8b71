//! Filter a tabular dataset and compare the distribution of a target column
//! before and after filtering.

pub mod cache;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod report;
pub mod state;

pub use cache::{CacheKey, CacheStats, ResultCache};
pub use config::AppConfig;
pub use data::distribution::{distribution, Distribution, Share};
pub use data::export::{export_dataset, export_distribution, ExportFormat};
pub use data::filter::{Choice, FilterPredicate, FilterSet, RangeFilter, SetFilter};
pub use data::layout::{FilterLayout, Selections};
pub use data::loader::{load_bytes, load_file, LoadOptions, SourceFormat};
pub use data::model::{Column, ColumnKind, Dataset, Fingerprint, Record, Row, Schema, Value};
pub use engine::Engine;
pub use error::{DatasetError, DistributionError, Error, ExportError, FilterError, LoadError};
pub use state::{Comparison, Session};
