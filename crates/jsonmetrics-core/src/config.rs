//! Metric configuration file parser.
//!
//! One table per metric under `[metric.<name>]`:
//!
//! ```toml
//! [metric.service_up]
//! source = "healthcheck"
//! sourcepath = ".kind"
//! valuepath = ".status"
//! timestamppath = ".time"
//! timestampformat = "rfc3339"
//! rendername = "svc_up"
//! debounce = "2s"
//! help = "Service health"
//! metrictype = "gauge"
//!
//! [metric.service_up.map]
//! "0" = "down"
//! "1" = "up"
//! ```
//!
//! The whole document is validated before anything is returned, so a
//! broken file reports all of its problems together.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use toml::{Table, Value};

use crate::definition::{MetricDefinition, MetricKind};
use crate::error::{ConfigError, ConfigErrors};
use crate::path::FieldPath;
use crate::timestamp::TimestampFormat;

const METRIC_SECTION: &str = "metric";

/// The validated set of metric definitions, keyed and ordered by name.
#[derive(Debug, Clone, Default)]
pub struct MetricsConfig {
    metrics: BTreeMap<String, MetricDefinition>,
}

impl MetricsConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigErrors> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// Build from already constructed definitions. Later duplicates of a
    /// name replace earlier ones.
    pub fn from_definitions(definitions: impl IntoIterator<Item = MetricDefinition>) -> Self {
        let metrics = definitions
            .into_iter()
            .map(|def| (def.name().to_string(), def))
            .collect();
        Self { metrics }
    }

    /// Definitions in name order.
    pub fn definitions(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics.values()
    }

    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl FromStr for MetricsConfig {
    type Err = ConfigErrors;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let document: Table = toml::from_str(content).map_err(ConfigError::Syntax)?;

        let mut errors = Vec::new();
        let mut metrics = BTreeMap::new();

        for (section, value) in &document {
            if section != METRIC_SECTION {
                errors.push(ConfigError::UnknownSection(section.clone()));
                continue;
            }
            let Some(table) = value.as_table() else {
                errors.push(ConfigError::NotATable(section.clone()));
                continue;
            };
            for (name, body) in table {
                let Some(body) = body.as_table() else {
                    errors.push(ConfigError::NotATable(format!("{METRIC_SECTION}.{name}")));
                    continue;
                };
                match build_metric(name, body) {
                    Ok(def) => {
                        metrics.insert(name.clone(), def);
                    }
                    Err(mut problems) => errors.append(&mut problems),
                }
            }
        }

        errors.extend(duplicate_render_names(&metrics));

        if errors.is_empty() {
            Ok(Self { metrics })
        } else {
            Err(ConfigErrors(errors))
        }
    }
}

/// Raw keys of one metric table before compilation.
#[derive(Default)]
struct RawMetric {
    source: Option<String>,
    source_path: Option<String>,
    value_path: Option<String>,
    timestamp_path: Option<String>,
    timestamp_format: Option<String>,
    render_name: Option<String>,
    debounce: Option<String>,
    help: Option<String>,
    metric_type: Option<String>,
    map: BTreeMap<String, String>,
}

fn build_metric(name: &str, table: &Table) -> Result<MetricDefinition, Vec<ConfigError>> {
    let mut errors = Vec::new();
    if name.is_empty() {
        errors.push(ConfigError::EmptyName);
    }

    let mut raw = RawMetric::default();
    for (key, value) in table {
        let slot = match key.as_str() {
            "source" => &mut raw.source,
            "sourcepath" => &mut raw.source_path,
            "valuepath" => &mut raw.value_path,
            "timestamppath" => &mut raw.timestamp_path,
            "timestampformat" => &mut raw.timestamp_format,
            "rendername" => &mut raw.render_name,
            "debounce" => &mut raw.debounce,
            "help" => &mut raw.help,
            "metrictype" => &mut raw.metric_type,
            "map" => {
                raw.map = map_value(name, value, &mut errors);
                continue;
            }
            _ => {
                errors.push(ConfigError::UnknownKey {
                    metric: name.to_string(),
                    key: key.clone(),
                });
                continue;
            }
        };
        match value.as_str() {
            Some(s) => *slot = Some(s.to_string()),
            None => errors.push(ConfigError::WrongType {
                metric: name.to_string(),
                key: key.clone(),
                expected: "a string",
            }),
        }
    }

    let source = required(name, "source", raw.source, &mut errors);
    let source_path = required(name, "sourcepath", raw.source_path, &mut errors)
        .and_then(|expr| compile(name, "sourcepath", &expr, &mut errors));
    let value_path = required(name, "valuepath", raw.value_path, &mut errors)
        .and_then(|expr| compile(name, "valuepath", &expr, &mut errors));

    let timestamp = match (raw.timestamp_path, raw.timestamp_format) {
        (Some(expr), Some(format)) => {
            let path = compile(name, "timestamppath", &expr, &mut errors);
            let format = TimestampFormat::parse(&format)
                .map_err(|source| {
                    errors.push(ConfigError::BadTimestampFormat {
                        metric: name.to_string(),
                        source,
                    })
                })
                .ok();
            path.zip(format)
        }
        (Some(_), None) => {
            errors.push(ConfigError::Incomplete {
                metric: name.to_string(),
                present: "timestamppath",
                missing: "timestampformat",
            });
            None
        }
        (None, Some(_)) => {
            errors.push(ConfigError::Incomplete {
                metric: name.to_string(),
                present: "timestampformat",
                missing: "timestamppath",
            });
            None
        }
        (None, None) => None,
    };

    let debounce = raw
        .debounce
        .and_then(|value| match parse_debounce(&value) {
            Ok(d) => Some(d),
            Err(reason) => {
                errors.push(ConfigError::BadDebounce {
                    metric: name.to_string(),
                    value,
                    reason,
                });
                None
            }
        });

    let kind = raw.metric_type.and_then(|value| {
        let kind = MetricKind::parse(&value);
        if kind.is_none() {
            errors.push(ConfigError::BadMetricType {
                metric: name.to_string(),
                value,
            });
        }
        kind
    });

    if !errors.is_empty() {
        return Err(errors);
    }
    let (Some(source), Some(source_path), Some(value_path)) = (source, source_path, value_path) else {
        // Every missing piece pushed an error above.
        return Err(errors);
    };

    let mut def = MetricDefinition::new(name, source, source_path, value_path).with_value_map(raw.map);
    if let Some(render_name) = raw.render_name {
        def = def.with_render_name(render_name);
    }
    if let Some((path, format)) = timestamp {
        def = def.with_timestamp(path, format);
    }
    if let Some(debounce) = debounce {
        def = def.with_debounce(debounce);
    }
    if let Some(help) = raw.help {
        def = def.with_help(help);
    }
    if let Some(kind) = kind {
        def = def.with_kind(kind);
    }
    Ok(def)
}

fn required(
    metric: &str,
    key: &'static str,
    value: Option<String>,
    errors: &mut Vec<ConfigError>,
) -> Option<String> {
    if value.is_none() {
        errors.push(ConfigError::MissingKey {
            metric: metric.to_string(),
            key,
        });
    }
    value
}

fn compile(
    metric: &str,
    key: &'static str,
    expr: &str,
    errors: &mut Vec<ConfigError>,
) -> Option<FieldPath> {
    FieldPath::parse(expr)
        .map_err(|source| {
            errors.push(ConfigError::BadPath {
                metric: metric.to_string(),
                key,
                source,
            })
        })
        .ok()
}

/// Map values may be any scalar; `"1" = 1` and `"1" = "1"` are equivalent.
fn map_value(metric: &str, value: &Value, errors: &mut Vec<ConfigError>) -> BTreeMap<String, String> {
    let wrong_type = || ConfigError::WrongType {
        metric: metric.to_string(),
        key: "map".to_string(),
        expected: "a table of scalar values",
    };
    let Some(table) = value.as_table() else {
        errors.push(wrong_type());
        return BTreeMap::new();
    };
    let mut map = BTreeMap::new();
    for (from, to) in table {
        let to = match to {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            _ => {
                errors.push(wrong_type());
                continue;
            }
        };
        map.insert(from.clone(), to);
    }
    map
}

fn parse_debounce(value: &str) -> Result<Duration, String> {
    let debounce = humantime::parse_duration(value.trim()).map_err(|e| e.to_string())?;
    if debounce.is_zero() {
        return Err("must be greater than zero".to_string());
    }
    Ok(debounce)
}

fn duplicate_render_names(metrics: &BTreeMap<String, MetricDefinition>) -> Vec<ConfigError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    let mut errors = Vec::new();
    for def in metrics.values() {
        if let Some(first) = seen.insert(def.render_name(), def.name()) {
            errors.push(ConfigError::DuplicateRenderName {
                render_name: def.render_name().to_string(),
                first: first.to_string(),
                second: def.name().to_string(),
            });
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FULL: &str = r#"
[metric.service_up]
source = "health"
sourcepath = ".kind"
valuepath = ".status"
timestamppath = ".time"
timestampformat = "rfc3339"
rendername = "svc_up"
debounce = "2s"
help = "Service health"
metrictype = "gauge"

[metric.service_up.map]
"0" = "down"
"1" = "up"

[metric.disk_free]
source = "disk"
sourcepath = "{.kind}"
valuepath = "{.free}"
"#;

    fn errors_of(content: &str) -> Vec<ConfigError> {
        content.parse::<MetricsConfig>().unwrap_err().0
    }

    #[test]
    fn parse_full_config() {
        let config: MetricsConfig = FULL.parse().unwrap();
        assert_eq!(config.len(), 2);

        let def = config.get("service_up").unwrap();
        assert_eq!(def.render_name(), "svc_up");
        assert_eq!(def.source(), "health");
        assert_eq!(def.debounce(), Some(Duration::from_secs(2)));
        assert_eq!(def.help(), Some("Service health"));
        assert_eq!(def.kind(), Some(MetricKind::Gauge));
        assert_eq!(def.timestamp_format(), Some(&TimestampFormat::Rfc3339));
        assert_eq!(def.display_value("0"), "down");

        let disk = config.get("disk_free").unwrap();
        assert_eq!(disk.render_name(), "disk_free");
        assert_eq!(disk.debounce(), None);
        assert!(disk.value_map().is_empty());
    }

    #[test]
    fn definitions_are_name_ordered() {
        let config: MetricsConfig = FULL.parse().unwrap();
        let names: Vec<&str> = config.definitions().map(|d| d.name()).collect();
        assert_eq!(names, vec!["disk_free", "service_up"]);
    }

    #[test]
    fn parsed_paths_extract() {
        let config: MetricsConfig = FULL.parse().unwrap();
        let record = json!({"kind": "health", "status": 1, "time": "2024-05-01T12:00:00Z"});
        let extraction = config.get("service_up").unwrap().extract(&record).unwrap().unwrap();
        assert_eq!(extraction.value, "1");
        assert!(extraction.timestamp.is_some());
    }

    #[test]
    fn empty_document_has_no_metrics() {
        let config: MetricsConfig = "".parse().unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn syntax_error_stops_early() {
        let errors = errors_of("[metric.a\nsource = ");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ConfigError::Syntax(_)));
    }

    #[test]
    fn aggregates_all_errors() {
        let errors = errors_of(
            r#"
[server]
port = 1

[metric.a]
source = "x"
sourcepath = ".k"
valuepath = ".v["
debounce = "soon"
colour = "red"

[metric.b]
source = "x"
sourcepath = ".k"
"#,
        );
        assert!(errors.iter().any(|e| matches!(e, ConfigError::UnknownSection(s) if s == "server")));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::BadPath { key: "valuepath", .. })));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::BadDebounce { .. })));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "colour")));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::MissingKey { metric, key: "valuepath" } if metric == "b")));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn timestamp_path_and_format_go_together() {
        let errors = errors_of(
            r#"
[metric.a]
source = "x"
sourcepath = ".k"
valuepath = ".v"
timestamppath = ".t"
"#,
        );
        assert!(matches!(
            errors.as_slice(),
            [ConfigError::Incomplete { missing: "timestampformat", .. }]
        ));

        let errors = errors_of(
            r#"
[metric.a]
source = "x"
sourcepath = ".k"
valuepath = ".v"
timestampformat = "unix"
"#,
        );
        assert!(matches!(
            errors.as_slice(),
            [ConfigError::Incomplete { missing: "timestamppath", .. }]
        ));
    }

    #[test]
    fn rejects_bad_timestamp_format() {
        let errors = errors_of(
            r#"
[metric.a]
source = "x"
sourcepath = ".k"
valuepath = ".v"
timestamppath = ".t"
timestampformat = "2006-01-02"
"#,
        );
        assert!(matches!(errors.as_slice(), [ConfigError::BadTimestampFormat { .. }]));
    }

    #[test]
    fn rejects_zero_debounce() {
        let errors = errors_of(
            r#"
[metric.a]
source = "x"
sourcepath = ".k"
valuepath = ".v"
debounce = "0s"
"#,
        );
        assert!(matches!(errors.as_slice(), [ConfigError::BadDebounce { .. }]));
    }

    #[test]
    fn compound_debounce() {
        let config: MetricsConfig = r#"
[metric.a]
source = "x"
sourcepath = ".k"
valuepath = ".v"
debounce = "1m 30s"
"#
        .parse()
        .unwrap();
        assert_eq!(config.get("a").unwrap().debounce(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn rejects_non_string_values() {
        let errors = errors_of(
            r#"
[metric.a]
source = 1
sourcepath = ".k"
valuepath = ".v"
"#,
        );
        assert!(errors.iter().any(|e| matches!(e, ConfigError::WrongType { key, .. } if key == "source")));
    }

    #[test]
    fn map_accepts_scalars() {
        let config: MetricsConfig = r#"
[metric.a]
source = "x"
sourcepath = ".k"
valuepath = ".v"
map = { "up" = 1, "down" = 0, "maybe" = "unknown" }
"#
        .parse()
        .unwrap();
        let def = config.get("a").unwrap();
        assert_eq!(def.display_value("up"), "1");
        assert_eq!(def.display_value("down"), "0");
        assert_eq!(def.display_value("maybe"), "unknown");
    }

    #[test]
    fn rejects_unknown_metric_type() {
        let errors = errors_of(
            r#"
[metric.a]
source = "x"
sourcepath = ".k"
valuepath = ".v"
metrictype = "histogram"
"#,
        );
        assert!(matches!(errors.as_slice(), [ConfigError::BadMetricType { .. }]));
    }

    #[test]
    fn rejects_shared_render_name() {
        let errors = errors_of(
            r#"
[metric.a]
source = "x"
sourcepath = ".k"
valuepath = ".v"
rendername = "b"

[metric.b]
source = "y"
sourcepath = ".k"
valuepath = ".v"
"#,
        );
        assert!(matches!(
            errors.as_slice(),
            [ConfigError::DuplicateRenderName { render_name, .. }] if render_name == "b"
        ));
    }

    #[test]
    fn metric_must_be_a_table() {
        let errors = errors_of("metric = 3\n");
        assert!(matches!(errors.as_slice(), [ConfigError::NotATable(s)] if s == "metric"));
        let errors = errors_of("[metric]\na = 3\n");
        assert!(matches!(errors.as_slice(), [ConfigError::NotATable(s)] if s == "metric.a"));
    }

    #[test]
    fn missing_file_is_reported() {
        let errors = MetricsConfig::from_file(Path::new("/nonexistent/jsonmetrics.toml")).unwrap_err();
        assert!(matches!(errors.0.as_slice(), [ConfigError::Io { .. }]));
    }
}
