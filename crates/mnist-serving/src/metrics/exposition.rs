//! Prometheus text exposition for [`MetricsSnapshot`].

use std::fmt::Write as _;

use super::MetricsSnapshot;

/// `Content-Type` of the rendered payload.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render a snapshot into Prometheus text exposition format.
pub fn render(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::with_capacity(2 * 1024);

    render_requests(&mut out, snapshot);
    render_latency(&mut out, snapshot);
    render_errors(&mut out, snapshot);
    render_class_distribution(&mut out, snapshot);

    out
}

fn render_requests(out: &mut String, snapshot: &MetricsSnapshot) {
    write_metric_header(
        out,
        "predictions_requests_total",
        "Total prediction items submitted (successful and failed)",
        "counter",
    );
    append_sample_line(
        out,
        "predictions_requests_total",
        &[],
        snapshot.total_requests as f64,
    );
}

fn render_latency(out: &mut String, snapshot: &MetricsSnapshot) {
    write_metric_header(
        out,
        "predictions_latency_seconds",
        "Prediction request latency in seconds",
        "summary",
    );
    for (quantile, value) in &snapshot.latency_quantiles {
        let Some(value) = value else {
            continue;
        };
        append_sample_line(
            out,
            "predictions_latency_seconds",
            &[("quantile".to_string(), format_quantile(*quantile))],
            *value,
        );
    }
    append_sample_line(
        out,
        "predictions_latency_seconds_sum",
        &[],
        snapshot.latency_sum_seconds,
    );
    append_sample_line(
        out,
        "predictions_latency_seconds_count",
        &[],
        snapshot.latency_count as f64,
    );
}

fn render_errors(out: &mut String, snapshot: &MetricsSnapshot) {
    write_metric_header(
        out,
        "predictions_errors_total",
        "Server-side prediction failures by reason",
        "counter",
    );
    for (reason, count) in &snapshot.errors {
        append_sample_line(
            out,
            "predictions_errors_total",
            &[("reason".to_string(), (*reason).to_string())],
            *count as f64,
        );
    }
}

fn render_class_distribution(out: &mut String, snapshot: &MetricsSnapshot) {
    write_metric_header(
        out,
        "predictions_class_distribution_total",
        "Returned predictions by digit",
        "counter",
    );
    for (digit, count) in &snapshot.class_distribution {
        append_sample_line(
            out,
            "predictions_class_distribution_total",
            &[("digit".to_string(), digit.to_string())],
            *count as f64,
        );
    }
}

fn write_metric_header(out: &mut String, name: &str, help: &str, metric_type: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {metric_type}");
}

fn append_sample_line(out: &mut String, name: &str, labels: &[(String, String)], value: f64) {
    if !value.is_finite() {
        return;
    }

    if labels.is_empty() {
        let _ = writeln!(out, "{name} {}", format_float(value));
        return;
    }

    let rendered_labels = labels
        .iter()
        .map(|(k, v)| {
            let escaped = escape_label_value(v);
            format!("{k}=\"{escaped}\"")
        })
        .collect::<Vec<_>>()
        .join(",");
    let _ = writeln!(out, "{name}{{{rendered_labels}}} {}", format_float(value));
}

fn format_quantile(q: f64) -> String {
    // 0.5 / 0.95 / 0.99 without trailing zeros
    let s = format!("{q:.4}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.6}")
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('"', "\\\"")
}
