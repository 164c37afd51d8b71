/// Data layer: core types, loading, filtering, aggregation and export.
///
/// Architecture:
/// ```text
///  .csv / .xlsx / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse bytes → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  schema + rows, content fingerprint
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  layout + selections → FilterSet → filtered Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ distribution  │  target column → percentage shares
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  Dataset / Distribution → csv or xlsx bytes
///   └──────────┘
/// ```

pub mod columnar;
pub mod distribution;
pub mod export;
pub mod filter;
pub mod layout;
pub mod loader;
pub mod model;
