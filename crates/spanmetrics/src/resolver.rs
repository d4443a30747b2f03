//! Column resolution
//!
//! The compilers never hardcode the store's column layout. They ask a
//! [`ColumnResolver`] for the SQL that reads an attribute, evaluates a
//! function over it, or checks that it exists.

use upql::Name;

use crate::error::ResolveError;
use crate::sql::quote_string;

/// Maps UPQL names to SQL column expressions
pub trait ColumnResolver: Send + Sync {
    /// SQL for a value: a raw attribute, a synthetic aggregate or a function
    /// applied to an attribute. `bucket_minutes` is the aggregation window.
    fn resolve_column(&self, name: &Name, bucket_minutes: u32) -> Result<String, ResolveError>;

    /// SQL that reads the raw value of a span attribute
    fn resolve_attribute(&self, attr: &str) -> String;

    /// SQL that checks the attribute is set, or `None` when every span has it
    fn attribute_exists(&self, attr: &str) -> Option<String>;

    /// Whether the name is only meaningful after aggregation
    fn is_aggregate_column(&self, name: &Name) -> bool;
}

/// Renders names exactly as written: `attr` or `func(attr)`
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl ColumnResolver for IdentityResolver {
    fn resolve_column(&self, name: &Name, _bucket_minutes: u32) -> Result<String, ResolveError> {
        if name.attr.is_empty() {
            return Err(ResolveError::EmptyAttribute);
        }
        Ok(name.to_string())
    }

    fn resolve_attribute(&self, attr: &str) -> String {
        attr.to_string()
    }

    fn attribute_exists(&self, attr: &str) -> Option<String> {
        Some(format!("{} IS NOT NULL", attr))
    }

    fn is_aggregate_column(&self, name: &Name) -> bool {
        name.func.is_some()
    }
}

/// Resolver for the ClickHouse `spans_index AS s` table.
///
/// Well-known span fields live in dedicated columns; every other attribute is
/// stored in the parallel `attr_keys` / `attr_values` arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpansIndexResolver;

impl SpansIndexResolver {
    fn dedicated_column(attr: &str) -> Option<&'static str> {
        let column = match attr {
            "span.system" => "s.system",
            "span.group_id" => "s.group_id",
            "span.trace_id" => "s.trace_id",
            "span.id" => "s.id",
            "span.parent_id" => "s.parent_id",
            "span.name" => "s.name",
            "span.event_name" => "s.event_name",
            "span.kind" => "s.kind",
            "span.status_code" => "s.status_code",
            "span.status_message" => "s.status_message",
            "span.duration" => "s.duration",
            "span.time" => "s.time",
            "service.name" => "s.service_name",
            "host.name" => "s.host_name",
            _ => return None,
        };
        Some(column)
    }

    /// Synthetic columns that are aggregates over the group
    fn aggregate_column(attr: &str, bucket_minutes: u32) -> Option<String> {
        let column = match attr {
            "span.count" => "count()".to_string(),
            "span.count_per_min" => format!("count() / {}", bucket_minutes),
            "span.error_count" => "countIf(s.status_code = 'error')".to_string(),
            "span.error_rate" => "countIf(s.status_code = 'error') / count()".to_string(),
            _ => return None,
        };
        Some(column)
    }

    /// Attribute converted to a number for numeric aggregates
    fn numeric_attribute(&self, attr: &str) -> String {
        match attr {
            "span.duration" => "s.duration".to_string(),
            _ => format!("toFloat64OrDefault({})", self.resolve_attribute(attr)),
        }
    }
}

fn quantile_level(func: &str) -> Option<&'static str> {
    let level = match func {
        "p50" => "0.5",
        "p75" => "0.75",
        "p90" => "0.9",
        "p95" => "0.95",
        "p99" => "0.99",
        _ => return None,
    };
    Some(level)
}

impl ColumnResolver for SpansIndexResolver {
    fn resolve_column(&self, name: &Name, bucket_minutes: u32) -> Result<String, ResolveError> {
        let attr = name.attr.as_str();
        if attr.is_empty() {
            return Err(ResolveError::EmptyAttribute);
        }

        let aggregate = Self::aggregate_column(attr, bucket_minutes);

        let Some(func) = name.func.as_deref() else {
            return Ok(aggregate.unwrap_or_else(|| self.resolve_attribute(attr)));
        };

        if func == "per_min" {
            let total = match aggregate {
                Some(aggregate) => aggregate,
                None => format!("sum({})", self.numeric_attribute(attr)),
            };
            return Ok(format!("{} / {}", total, bucket_minutes));
        }

        if aggregate.is_some() {
            return Err(ResolveError::NestedAggregate {
                func: func.to_string(),
                attr: attr.to_string(),
            });
        }

        if let Some(level) = quantile_level(func) {
            return Ok(format!(
                "quantileTDigest({})({})",
                level,
                self.numeric_attribute(attr)
            ));
        }

        match func {
            "sum" | "avg" | "min" | "max" => {
                Ok(format!("{}({})", func, self.numeric_attribute(attr)))
            }
            "uniq" => Ok(format!("uniqCombined64({})", self.resolve_attribute(attr))),
            "any" => Ok(format!("any({})", self.resolve_attribute(attr))),
            _ => Err(ResolveError::UnknownFunction(func.to_string())),
        }
    }

    fn resolve_attribute(&self, attr: &str) -> String {
        match Self::dedicated_column(attr) {
            Some(column) => column.to_string(),
            None => format!("s.attr_values[indexOf(s.attr_keys, {})]", quote_string(attr)),
        }
    }

    fn attribute_exists(&self, attr: &str) -> Option<String> {
        if Self::dedicated_column(attr).is_some() {
            return None;
        }
        Some(format!("has(s.attr_keys, {})", quote_string(attr)))
    }

    fn is_aggregate_column(&self, name: &Name) -> bool {
        name.func.is_some() || Self::aggregate_column(&name.attr, 1).is_some()
    }
}
