use anyhow::{Context, Result};
use config_rs::builder::DefaultState;
use config_rs::{Config as ConfigBuilder, ConfigBuilder as Builder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use spanmetrics::{DdlOptions, MetricDefinition};
use std::collections::HashSet;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// ClickHouse schema the views are created in
    #[serde(default)]
    pub ch_schema: ChSchemaConfig,

    /// Projects that get metric metadata
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,

    /// Metrics computed from spans
    #[serde(default)]
    pub metrics_from_spans: Vec<MetricDefinition>,
}

/// ClickHouse schema configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChSchemaConfig {
    /// Cluster name for `ON CLUSTER`; empty or unset on a single node
    #[serde(default)]
    pub cluster: Option<String>,

    /// Table the views read spans from (default: "spans_index")
    #[serde(default = "default_spans_table")]
    pub spans_table: String,

    /// Table the views write measures to (default: "measure_minutes")
    #[serde(default = "default_measure_table")]
    pub measure_table: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub id: u32,
    #[serde(default)]
    pub name: String,
}

// Default value functions
fn default_spans_table() -> String {
    "spans_index".to_string()
}

fn default_measure_table() -> String {
    "measure_minutes".to_string()
}

impl Default for ChSchemaConfig {
    fn default() -> Self {
        Self {
            cluster: None,
            spans_table: default_spans_table(),
            measure_table: default_measure_table(),
        }
    }
}

impl Config {
    /// Load Config with layered configuration priority:
    /// 1. Default values
    /// 2. TOML file (if provided)
    /// 3. Environment variables with the SPANMETRICS_ prefix,
    ///    nested keys separated by `__` (e.g. SPANMETRICS_CH_SCHEMA__CLUSTER)
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults()?;

        if let Some(path) = config_file {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path));
        }

        Self::build(builder)
    }

    /// Load Config from a TOML file. Environment variables can still override values from the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    /// Create a new Config from environment variables with defaults
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load Config from TOML text, layered the same way as a file
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from_str(toml, FileFormat::Toml));
        Self::build(builder)
    }

    fn defaults() -> Result<Builder<DefaultState>> {
        let builder = ConfigBuilder::builder()
            .set_default("ch_schema.spans_table", default_spans_table())?
            .set_default("ch_schema.measure_table", default_measure_table())?;
        Ok(builder)
    }

    fn build(builder: Builder<DefaultState>) -> Result<Self> {
        let config = builder
            .add_source(
                Environment::with_prefix("SPANMETRICS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn project_ids(&self) -> Vec<u32> {
        self.projects.iter().map(|p| p.id).collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.ch_schema.validate()?;

        let mut ids = HashSet::new();
        for project in &self.projects {
            anyhow::ensure!(
                ids.insert(project.id),
                "duplicate project id {}",
                project.id
            );
        }

        let mut names = HashSet::new();
        for (i, metric) in self.metrics_from_spans.iter().enumerate() {
            anyhow::ensure!(
                !metric.name.is_empty(),
                "metrics_from_spans[{}]: metric name cannot be empty",
                i
            );
            anyhow::ensure!(
                names.insert(metric.name.as_str()),
                "duplicate metric name {:?}",
                metric.name
            );
        }

        Ok(())
    }
}

impl ChSchemaConfig {
    pub fn ddl_options(&self) -> DdlOptions {
        DdlOptions {
            cluster: self.cluster.clone().filter(|c| !c.is_empty()),
            spans_table: self.spans_table.clone(),
            measure_table: self.measure_table.clone(),
        }
    }

    /// Validate the schema configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.spans_table.is_empty(), "spans table cannot be empty");
        anyhow::ensure!(
            !self.measure_table.is_empty(),
            "measure table cannot be empty"
        );
        Ok(())
    }
}
