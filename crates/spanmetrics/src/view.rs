use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::cond::compile_metric_where;
use crate::error::{CompileError, Result};
use crate::expr::compile_metric_value;
use crate::metric::{Instrument, MetricDefinition};
use crate::resolver::ColumnResolver;
use crate::sql::{append_string, quote_string};

/// Time bucket of every span metric view
const TIME_BUCKET: &str = "toStartOfMinute(s.time)";

/// A selected SQL expression with an optional alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub expr: String,
    pub alias: Option<String>,
}

impl Column {
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: None,
        }
    }

    pub fn aliased(expr: impl Into<String>, alias: &str) -> Self {
        Self {
            expr: expr.into(),
            alias: Some(alias.to_string()),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.expr, alias),
            None => write!(f, "{}", self.expr),
        }
    }
}

/// Everything needed to render the materialized view of one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewDefinition {
    pub view_name: String,
    pub metric: String,
    pub instrument: Instrument,
    pub select_columns: Vec<Column>,
    pub group_by: Vec<String>,
    pub filter: Option<String>,
}

impl ViewDefinition {
    pub fn column(&self, alias: &str) -> Option<&Column> {
        self.select_columns
            .iter()
            .find(|c| c.alias.as_deref() == Some(alias))
    }

    /// Comma-separated select list
    pub fn select_sql(&self) -> String {
        let columns: Vec<String> = self.select_columns.iter().map(|c| c.to_string()).collect();
        columns.join(", ")
    }

    pub fn group_by_sql(&self) -> String {
        self.group_by.join(", ")
    }
}

/// `metrics_` + name with dots replaced by underscores + `_mv`
pub fn view_name(metric_name: &str) -> String {
    format!("metrics_{}_mv", metric_name.replace('.', "_"))
}

/// Compile a metric definition into a view definition
pub fn build_view(
    metric: &MetricDefinition,
    resolver: &dyn ColumnResolver,
) -> Result<ViewDefinition> {
    if metric.name.is_empty() {
        return Err(CompileError::InvalidMetricConfig(
            "metric name can't be empty".to_string(),
        ));
    }
    if metric.instrument.is_empty() {
        return Err(CompileError::InvalidMetricConfig(format!(
            "metric {:?} instrument can't be empty",
            metric.name
        )));
    }
    let instrument: Instrument = metric.instrument.parse()?;

    let value = compile_metric_value(&metric.value, resolver)?;

    let mut select_columns = vec![
        Column::new("s.project_id"),
        Column::aliased(quote_string(&metric.name), "metric"),
        Column::aliased(TIME_BUCKET, "time"),
        Column::aliased(quote_string(instrument.as_str()), "instrument"),
    ];
    let mut group_by = vec![format!("s.project_id, {}", TIME_BUCKET)];

    if !metric.attrs.is_empty() {
        let attrs = compile_attrs(&metric.attrs, resolver);
        select_columns.push(Column::aliased(
            format!("xxHash64(arrayStringConcat([{}], '-'))", attrs),
            "attrs_hash",
        ));
        select_columns.push(Column::aliased(attr_keys(&metric.attrs), "attr_keys"));
        select_columns.push(Column::aliased(format!("[{}]", attrs), "attr_values"));
        group_by.push(attrs);
    }

    if !metric.annotations.is_empty() {
        select_columns.push(Column::aliased(
            format!(
                "toJSONString(map({}))",
                compile_annotations(&metric.annotations, resolver)
            ),
            "annotations",
        ));
    }

    let mut filter = None;
    if let Some(where_) = metric.filter.as_deref().filter(|s| !s.trim().is_empty()) {
        let sql = compile_metric_where(where_, resolver)?;
        if !sql.is_empty() {
            filter = Some(sql);
        }
    }

    match instrument {
        Instrument::Gauge | Instrument::Additive => {
            select_columns.push(Column::aliased(value, "value"));
        }
        Instrument::Counter => {
            select_columns.push(Column::aliased(value, "sum"));
        }
        Instrument::Histogram => {
            select_columns.push(Column::aliased("count()", "count"));
            select_columns.push(Column::aliased(format!("sum({})", value), "sum"));
            select_columns.push(Column::aliased(
                format!("quantilesBFloat16State(0.5)(toFloat32({}))", value),
                "histogram",
            ));
        }
    }

    let view = ViewDefinition {
        view_name: view_name(&metric.name),
        metric: metric.name.clone(),
        instrument,
        select_columns,
        group_by,
        filter,
    };
    debug!(
        metric = %view.metric,
        view = %view.view_name,
        instrument = %view.instrument,
        "compiled span metric view"
    );
    Ok(view)
}

fn compile_attrs(attrs: &[String], resolver: &dyn ColumnResolver) -> String {
    let exprs: Vec<String> = attrs.iter().map(|a| resolver.resolve_attribute(a)).collect();
    exprs.join(", ")
}

fn attr_keys(attrs: &[String]) -> String {
    let mut b = String::from("[");
    for (i, attr) in attrs.iter().enumerate() {
        if i > 0 {
            b.push_str(", ");
        }
        append_string(&mut b, attr);
    }
    b.push(']');
    b
}

fn compile_annotations(attrs: &[String], resolver: &dyn ColumnResolver) -> String {
    let mut b = String::new();
    for (i, attr) in attrs.iter().enumerate() {
        if i > 0 {
            b.push_str(", ");
        }
        append_string(&mut b, attr);
        b.push_str(", toString(any(");
        b.push_str(&resolver.resolve_attribute(attr));
        b.push_str("))");
    }
    b
}
