//! Text exposition format.
//!
//! One line per metric with a recorded sample:
//!
//! ```text
//! <render name> <value> <timestamp in epoch milliseconds>
//! ```
//!
//! Metrics are ordered by definition name so repeated scrapes of the same
//! state are byte-identical.

use jsonmetrics_core::MetricDefinition;
use jsonmetrics_state::MetricState;

/// Rendering switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Precede each metric with `# HELP` / `# TYPE` lines when the
    /// definition carries help text or a metric type.
    pub annotations: bool,
}

/// Render the current value of every defined metric.
///
/// Metrics that were never updated are left out. The value map of each
/// definition is applied to the output only.
pub fn render_exposition<'a>(
    definitions: impl IntoIterator<Item = &'a MetricDefinition>,
    state: &MetricState,
    options: RenderOptions,
) -> String {
    let mut definitions: Vec<&MetricDefinition> = definitions.into_iter().collect();
    definitions.sort_by(|a, b| a.name().cmp(b.name()));

    let mut out = String::new();
    for def in definitions {
        let name = def.render_name();
        let Some(sample) = state.get(name) else {
            continue;
        };

        if options.annotations {
            if let Some(help) = def.help() {
                out.push_str(&format!("# HELP {name} {}\n", escape_help(help)));
            }
            if let Some(kind) = def.kind() {
                out.push_str(&format!("# TYPE {name} {kind}\n"));
            }
        }

        out.push_str(&format!(
            "{name} {} {}\n",
            def.display_value(&sample.value),
            sample.timestamp.timestamp_millis()
        ));
    }
    out
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}
