//! Joins COVID-19 case counts with per-country temperature, population and
//! GDP, then buckets or regresses the result for charting.
//!
//! ## Modules
//!
//! - `join` - country-keyed accumulation of cases and attributes
//! - `buckets` - fixed-width bucket aggregation with ratio densities
//! - `regression` - least-squares line through the normal equations
//! - `cases`, `lookup`, `iso` - data sources
//! - `chart` - PNG rendering
//! - `pipeline` - the end-to-end analyses

pub mod buckets;
pub mod cases;
pub mod chart;
pub mod config;
pub mod error;
pub mod iso;
pub mod join;
pub mod lookup;
pub mod models;
pub mod pipeline;
pub mod regression;

pub use buckets::{Aggregation, Bucket, BucketAggregator, BucketDomain, BucketSample};
pub use cases::{CaseSource, CsvCaseSource};
pub use chart::{ChartExporter, PngChartExporter};
pub use config::Config;
pub use error::{Error, Result};
pub use join::{CountryJoinTable, Denylist, JoinReport};
pub use lookup::{AttributeLookup, CsvAttributeLookup, WorldBankLookup};
pub use models::{AttributeKind, CaseRow, CountryRecord};
pub use regression::{RegressionEngine, RegressionResult};
