use anyhow::{Context, Result};
use spanmetrics::{build_view, ColumnResolver, MetricDefinition, ViewDefinition};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Compile metrics on blocking tasks.
///
/// Views are returned in the order of `metrics`. The first failure in that
/// order is returned with the metric name attached.
pub async fn compile_all(
    metrics: Vec<MetricDefinition>,
    resolver: Arc<dyn ColumnResolver>,
) -> Result<Vec<ViewDefinition>> {
    let mut tasks: Vec<JoinHandle<Result<ViewDefinition>>> = Vec::with_capacity(metrics.len());

    for metric in metrics {
        let resolver = resolver.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            build_view(&metric, resolver.as_ref())
                .with_context(|| format!("compile span metric {:?} failed", metric.name))
        }));
    }
    debug!(tasks = tasks.len(), "Spawned compile tasks");

    let mut views = Vec::with_capacity(tasks.len());
    for task in tasks {
        let view = task.await.context("Compile task panicked")??;
        views.push(view);
    }
    Ok(views)
}
