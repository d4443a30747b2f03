//! Span metrics
//!
//! Compiles metric definitions written in UPQL into ClickHouse materialized
//! view definitions that aggregate spans into per-minute measures.
//!
//! # Architecture
//!
//! 1. **Expressions** (`expr.rs`) - Metric values to SQL
//! 2. **Conditions** (`cond.rs`) - `where` clauses to SQL, folded left
//! 3. **Resolver** (`resolver.rs`) - Attribute names to store columns
//! 4. **Views** (`view.rs`) - Metric definitions to view definitions
//! 5. **DDL** (`ddl.rs`) - View definitions to `CREATE MATERIALIZED VIEW`
//! 6. **Materialization** (`materialize.rs`) - Applies a batch of metrics
//!
//! # Usage
//!
//! ```rust,ignore
//! let metric = MetricDefinition {
//!     name: "uptrace.tracing.spans_duration".to_string(),
//!     instrument: "histogram".to_string(),
//!     value: "span.duration / 1000".to_string(),
//!     attrs: vec!["span.system".to_string()],
//!     ..Default::default()
//! };
//! let view = build_view(&metric, &SpansIndexResolver)?;
//! println!("{}", create_view_sql(&view, &DdlOptions::default()));
//! ```
pub mod cond;
pub mod ddl;
pub mod error;
pub mod expr;
pub mod materialize;
pub mod metric;
pub mod query;
pub mod resolver;
pub mod sql;
pub mod view;

/// Width of the time bucket, in minutes
pub const SPAN_METRIC_MINUTES: u32 = 1;

pub use cond::{compile_metric_where, compile_where};
pub use ddl::{create_view_sql, drop_view_sql, DdlOptions};
pub use error::{CompileError, ResolveError, Result};
pub use expr::{compile_metric_value, compile_value};
pub use materialize::{create_span_metrics, Materializer, MetricRecord, SqlScript};
pub use metric::{Instrument, MetricDefinition};
pub use query::{compile_query, query_to_sql, CompiledQuery};
pub use resolver::{ColumnResolver, IdentityResolver, SpansIndexResolver};
pub use view::{build_view, view_name, Column, ViewDefinition};
