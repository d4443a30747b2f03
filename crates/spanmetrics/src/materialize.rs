//! Applying compiled metrics to a store
//!
//! [`create_span_metrics`] drives a [`Materializer`]. The only implementation
//! shipped here is [`SqlScript`], which records the DDL instead of executing it.

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::info;

use crate::ddl::{create_view_sql, drop_view_sql, DdlOptions};
use crate::metric::MetricDefinition;
use crate::resolver::ColumnResolver;
use crate::view::{build_view, ViewDefinition};

/// Metric metadata stored per project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricRecord {
    pub project_id: u32,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub instrument: String,
}

pub trait Materializer {
    /// Insert or update the metric metadata of one project
    fn upsert_metric(&mut self, record: &MetricRecord) -> anyhow::Result<()>;

    /// Drop the view if it exists and create it again
    fn replace_view(&mut self, view: &ViewDefinition) -> anyhow::Result<()>;
}

/// Compile every metric and hand the results to `materializer`, stopping at the first error
pub fn create_span_metrics(
    metrics: &[MetricDefinition],
    project_ids: &[u32],
    resolver: &dyn ColumnResolver,
    materializer: &mut dyn Materializer,
) -> anyhow::Result<()> {
    for metric in metrics {
        if metric.name.is_empty() {
            bail!("metric name can't be empty");
        }
        create_span_metric(metric, project_ids, resolver, materializer)
            .with_context(|| format!("create span metric {:?} failed", metric.name))?;
    }
    Ok(())
}

fn create_span_metric(
    metric: &MetricDefinition,
    project_ids: &[u32],
    resolver: &dyn ColumnResolver,
    materializer: &mut dyn Materializer,
) -> anyhow::Result<()> {
    let view = build_view(metric, resolver)?;

    for &project_id in project_ids {
        materializer
            .upsert_metric(&MetricRecord {
                project_id,
                name: metric.name.clone(),
                description: metric.description.clone(),
                unit: metric.unit.clone(),
                instrument: view.instrument.to_string(),
            })
            .context("upsert metric failed")?;
    }

    materializer
        .replace_view(&view)
        .with_context(|| format!("replace view {} failed", view.view_name))?;

    info!(
        metric = %metric.name,
        view = %view.view_name,
        projects = project_ids.len(),
        "created span metric"
    );
    Ok(())
}

/// Collects DDL statements and metric records in the order they were applied
#[derive(Debug, Default)]
pub struct SqlScript {
    options: DdlOptions,
    statements: Vec<String>,
    records: Vec<MetricRecord>,
}

impl SqlScript {
    pub fn new(options: DdlOptions) -> Self {
        Self {
            options,
            statements: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Statements terminated with `;` and separated by blank lines
    pub fn into_sql(self) -> String {
        let mut b = String::new();
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                b.push_str("\n\n");
            }
            b.push_str(stmt);
            b.push(';');
        }
        b
    }
}

impl Materializer for SqlScript {
    fn upsert_metric(&mut self, record: &MetricRecord) -> anyhow::Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn replace_view(&mut self, view: &ViewDefinition) -> anyhow::Result<()> {
        self.statements.push(drop_view_sql(view, &self.options));
        self.statements.push(create_view_sql(view, &self.options));
        Ok(())
    }
}
