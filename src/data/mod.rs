/// Data layer: catalog types, loading, and grouping.
///
/// Architecture:
/// ```text
///  .txt / .dat / .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Catalog (rows + skipped-row errors)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  CatalogRow, Catalog
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  group    │  sightline → HI column + per-ion component sets
///   └──────────┘
/// ```

pub mod group;
pub mod loader;
pub mod model;
