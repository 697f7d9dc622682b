use std::fmt::Write as FmtWrite;

use console::style;
use serde::Serialize;

use crate::models::{OutputFormat, SearchResult, keys};
use crate::services::{Answer, IngestReport};

pub trait Formatter {
    fn format_search_results(&self, query: &str, results: &[SearchResult]) -> String;
    fn format_answer(&self, question: &str, answer: &Answer) -> String;
    fn format_ingest_report(&self, report: &IngestReport, duration_ms: u64) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_url: String,
    pub embedding_connected: bool,
    pub index_url: String,
    pub index_connected: bool,
    pub collection: String,
    pub points: Option<u64>,
    pub tiers: Vec<TierStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierStatus {
    pub name: String,
    pub model: String,
    pub url: String,
    pub rerank: bool,
    pub answer: bool,
}

const PREVIEW_CHARS: usize = 200;

fn preview(content: &str) -> String {
    let mut preview: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

fn subject_of(result: &SearchResult) -> &str {
    result
        .document
        .metadata
        .get(keys::SUBJECT)
        .map_or("-", String::as_str)
}

fn connection(connected: bool) -> String {
    if connected {
        style("[CONNECTED]").green().to_string()
    } else {
        style("[DISCONNECTED]").red().to_string()
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_search_results(&self, query: &str, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return format!("No results found for: {query}\n");
        }

        let mut output = String::new();
        let _ = writeln!(output, "Search results for: \"{query}\"\n");

        for (i, result) in results.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} [Score: {:.3}]",
                i + 1,
                style(result.document.title()).bold(),
                result.score
            );
            let _ = writeln!(
                output,
                "   {} | {}",
                subject_of(result),
                style(&result.document.id).dim()
            );
            let _ = writeln!(output, "   ---");
            for line in preview(&result.document.content).lines() {
                let _ = writeln!(output, "   {line}");
            }
            let _ = writeln!(output);
        }

        output
    }

    fn format_answer(&self, _question: &str, answer: &Answer) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "{}\n", answer.text.trim());

        if !answer.sources.is_empty() {
            let _ = writeln!(output, "{}", style("Sources").bold());
            for (i, source) in answer.sources.iter().enumerate() {
                let _ = writeln!(
                    output,
                    "  [{}] {} ({}, score {:.2})",
                    i + 1,
                    source.document.title(),
                    source.document.id,
                    source.score
                );
            }
        }

        output
    }

    fn format_ingest_report(&self, report: &IngestReport, duration_ms: u64) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Ingestion Complete");
        let _ = writeln!(output, "------------------");
        let _ = writeln!(output, "Documents read:     {}", report.documents_total);
        let _ = writeln!(output, "Documents ingested: {}", report.documents_ingested);
        if report.documents_failed > 0 {
            let _ = writeln!(
                output,
                "Documents failed:   {}",
                style(report.documents_failed).yellow()
            );
        } else {
            let _ = writeln!(output, "Documents failed:   0");
        }
        let _ = writeln!(output, "Chunks indexed:     {}", report.chunks_indexed);
        let _ = writeln!(output, "Duration:           {duration_ms}ms");
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Status");
        let _ = writeln!(output, "------");

        let _ = writeln!(
            output,
            "Embedding:     {} {}",
            status.embedding_url,
            connection(status.embedding_connected)
        );
        let _ = writeln!(
            output,
            "Vector Index:  {} {}",
            status.index_url,
            connection(status.index_connected)
        );
        let _ = writeln!(output, "  Collection:  {}", status.collection);
        if let Some(points) = status.points {
            let _ = writeln!(output, "  Points:      {points}");
        }
        let _ = writeln!(output);

        let _ = writeln!(output, "Model Tiers");
        for tier in &status.tiers {
            let mut roles = Vec::new();
            if tier.rerank {
                roles.push("rerank");
            }
            if tier.answer {
                roles.push("answer");
            }
            let roles = if roles.is_empty() {
                String::new()
            } else {
                format!(" ({})", roles.join(", "))
            };
            let _ = writeln!(
                output,
                "  {:<10} {} @ {}{}",
                tier.name, tier.model, tier.url, roles
            );
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{message}\n")
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {error}\n", style("Error:").red().bold())
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &impl Serialize) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_search_results(&self, query: &str, results: &[SearchResult]) -> String {
        self.render(&serde_json::json!({
            "query": query,
            "total": results.len(),
            "results": results,
        }))
    }

    fn format_answer(&self, question: &str, answer: &Answer) -> String {
        self.render(&serde_json::json!({
            "question": question,
            "answer": answer.text,
            "sources": answer.sources,
        }))
    }

    fn format_ingest_report(&self, report: &IngestReport, duration_ms: u64) -> String {
        self.render(&serde_json::json!({
            "report": report,
            "duration_ms": duration_ms,
        }))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({ "message": message }).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({ "error": error }).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexedVector;
    use std::collections::BTreeMap;

    fn result(id: &str, title: &str, content: &str, score: f32) -> SearchResult {
        SearchResult {
            document: IndexedVector {
                id: id.to_string(),
                content: content.to_string(),
                embedding: vec![],
                metadata: BTreeMap::from([
                    (keys::TITLE.to_string(), title.to_string()),
                    (keys::SUBJECT.to_string(), "SCIENCE".to_string()),
                ]),
            },
            score,
        }
    }

    #[test]
    fn test_preview_truncates_long_content() {
        let long = "a".repeat(PREVIEW_CHARS + 10);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_text_search_results() {
        let output = TextFormatter.format_search_results(
            "cats",
            &[result("cats_0", "Cats", "Cats are mammals.", 0.91)],
        );
        assert!(output.contains("Search results for: \"cats\""));
        assert!(output.contains("[Score: 0.910]"));
        assert!(output.contains("Cats are mammals."));
        assert!(output.contains("SCIENCE"));

        assert_eq!(
            TextFormatter.format_search_results("dogs", &[]),
            "No results found for: dogs\n"
        );
    }

    #[test]
    fn test_json_answer_has_sources() {
        let answer = Answer {
            text: "Cats are mammals.".to_string(),
            sources: vec![result("cats_0", "Cats", "Cats are mammals.", 9.0)],
        };
        let output = JsonFormatter::new(false).format_answer("What are cats?", &answer);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["question"], "What are cats?");
        assert_eq!(value["answer"], "Cats are mammals.");
        assert_eq!(value["sources"][0]["document"]["id"], "cats_0");
        assert!(value["sources"][0]["document"].get("embedding").is_none());
    }

    #[test]
    fn test_json_ingest_report() {
        let report = IngestReport {
            documents_total: 3,
            documents_ingested: 2,
            documents_failed: 1,
            chunks_indexed: 7,
        };
        let output = JsonFormatter::new(true).format_ingest_report(&report, 42);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["report"]["chunks_indexed"], 7);
        assert_eq!(value["duration_ms"], 42);
    }
}
