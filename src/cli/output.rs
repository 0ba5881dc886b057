use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{OutputFormat, QueryResults, SweepReceipt};

pub trait Formatter {
    fn format_query_results(&self, results: &QueryResults) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_seed_report(&self, report: &SeedReport) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_url: String,
    pub embedding_ok: bool,
    pub embedding_model: Option<String>,
    pub store_driver: String,
    pub store_url: String,
    pub store_ok: bool,
    pub collection: String,
    pub points: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub receipt: SweepReceipt,
    pub units: u64,
    pub points: u64,
    pub duration_ms: u64,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_query_results(&self, results: &QueryResults) -> String {
        if results.is_empty() {
            return format!("No results found for: {}\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "Results for: \"{}\"", results.query).unwrap();
        writeln!(
            output,
            "Found {} matches in {}ms\n",
            results.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, m) in results.matches.iter().enumerate() {
            writeln!(output, "{}. [Score: {:.3}] {}", i + 1, m.score, m.id).unwrap();
            writeln!(output, "   {} ({})", m.metadata.name, m.metadata.field).unwrap();
            writeln!(output, "   URL: {}", m.metadata.url).unwrap();

            let preview: String = m.metadata.text.chars().take(200).collect();
            writeln!(output, "   {}", preview).unwrap();
            writeln!(output).unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Embedding server: {}", status.embedding_url).unwrap();
        writeln!(
            output,
            "  Status: {}",
            if status.embedding_ok { "ok" } else { "unreachable" }
        )
        .unwrap();
        if let Some(ref model) = status.embedding_model {
            writeln!(output, "  Model: {}", model).unwrap();
        }
        writeln!(output, "Vector store: {} ({})", status.store_url, status.store_driver).unwrap();
        writeln!(
            output,
            "  Status: {}",
            if status.store_ok { "ok" } else { "unreachable" }
        )
        .unwrap();
        writeln!(output, "  Collection: {}", status.collection).unwrap();
        writeln!(output, "  Points: {}", status.points).unwrap();
        output
    }

    fn format_seed_report(&self, report: &SeedReport) -> String {
        let mut output = String::new();
        writeln!(
            output,
            "Sweep complete: {} gather units in {}ms",
            report.units, report.duration_ms
        )
        .unwrap();
        writeln!(
            output,
            "Last step: offset {}, limit {}",
            report.receipt.offset, report.receipt.limit
        )
        .unwrap();
        writeln!(output, "Vectors in store: {}", report.points).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter;

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .map(|s| format!("{}\n", s))
        .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}\n", e))
}

impl Formatter for JsonFormatter {
    fn format_query_results(&self, results: &QueryResults) -> String {
        to_json(results)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        to_json(status)
    }

    fn format_seed_report(&self, report: &SeedReport) -> String {
        to_json(report)
    }

    fn format_message(&self, message: &str) -> String {
        to_json(&serde_json::json!({ "message": message }))
    }

    fn format_error(&self, error: &str) -> String {
        to_json(&serde_json::json!({ "error": error }))
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}
