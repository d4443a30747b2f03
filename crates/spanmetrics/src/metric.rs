use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// A metric computed from spans, as written in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricDefinition {
    /// Metric name, e.g. "uptrace.tracing.spans_duration"
    pub name: String,
    pub description: String,
    pub unit: String,
    /// One of "gauge", "additive", "counter" or "histogram"
    pub instrument: String,
    /// UPQL value expression, e.g. "span.duration / 1000"
    pub value: String,
    /// Attributes to group by
    pub attrs: Vec<String>,
    /// Attributes attached to each time series as a representative value
    pub annotations: Vec<String>,
    /// UPQL filter, with or without the leading `where`
    #[serde(rename = "where")]
    pub filter: Option<String>,
}

/// Aggregation kind of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Gauge,
    Additive,
    Counter,
    Histogram,
}

impl Instrument {
    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::Gauge => "gauge",
            Instrument::Additive => "additive",
            Instrument::Counter => "counter",
            Instrument::Histogram => "histogram",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Instrument {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(Instrument::Gauge),
            "additive" => Ok(Instrument::Additive),
            "counter" => Ok(Instrument::Counter),
            "histogram" => Ok(Instrument::Histogram),
            _ => Err(CompileError::UnsupportedInstrument(s.to_string())),
        }
    }
}
