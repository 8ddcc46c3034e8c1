use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{Answer, CorpusInfo, OutputFormat, SessionStatus, UploadReport};
use crate::server::protocol::HealthResponse;

pub trait Formatter {
    fn format_answer(&self, answer: &Answer) -> String;
    fn format_upload(&self, report: &UploadReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub daemon_running: bool,
    pub socket_path: String,
    pub health: Option<HealthResponse>,
}

fn preview(text: &str, max_chars: usize) -> String {
    let head: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        format!("{}...", head)
    } else {
        head
    }
}

fn corpus_line(corpus: &CorpusInfo) -> String {
    format!(
        "v{} {} ({} documents, {} chunks, dim {})",
        corpus.version, corpus.file_name, corpus.documents, corpus.chunks, corpus.dimension
    )
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_answer(&self, answer: &Answer) -> String {
        let mut output = String::new();
        writeln!(output, "{}", answer.answer.trim_end()).unwrap();

        if !answer.sources.is_empty() {
            writeln!(output).unwrap();
            writeln!(output, "Sources").unwrap();
            writeln!(output, "-------").unwrap();
            for (i, source) in answer.sources.iter().enumerate() {
                writeln!(
                    output,
                    "{}. [Score: {:.3}] {}",
                    i + 1,
                    source.score,
                    source.location()
                )
                .unwrap();
                for line in preview(&source.text, 200).lines() {
                    writeln!(output, "   {}", line).unwrap();
                }
            }
        }

        if answer.context.dropped > 0 || answer.context.truncated {
            writeln!(
                output,
                "\n(context budget: {} chunks used, {} dropped{})",
                answer.context.included,
                answer.context.dropped,
                if answer.context.truncated {
                    ", last one truncated"
                } else {
                    ""
                }
            )
            .unwrap();
        }
        output
    }

    fn format_upload(&self, report: &UploadReport) -> String {
        let mut output = String::new();
        writeln!(output, "Upload Complete").unwrap();
        writeln!(output, "---------------").unwrap();
        writeln!(output, "File:      {}", report.file_name).unwrap();
        writeln!(output, "Documents: {}", report.documents).unwrap();
        writeln!(output, "Chunks:    {}", report.chunks).unwrap();
        writeln!(output, "Vectors:   {}", report.vectors).unwrap();
        writeln!(output, "Version:   {}", report.version).unwrap();
        writeln!(output, "Duration:  {}ms", report.duration_ms).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let daemon_status = if status.daemon_running {
            "[RUNNING]"
        } else {
            "[STOPPED]"
        };
        writeln!(output, "Daemon:        {}", daemon_status).unwrap();
        writeln!(output, "  Socket:      {}", status.socket_path).unwrap();

        if let Some(ref health) = status.health {
            let service = &health.service;
            writeln!(output, "  Version:     {}", service.version).unwrap();
            writeln!(output, "  Idle:        {}s", health.idle_secs).unwrap();
            writeln!(output, "  Served:      {}", health.requests_served).unwrap();
            if let Some(ref m) = health.metrics {
                writeln!(output, "  Requests:    {}", m.total_requests).unwrap();
                writeln!(output, "  Avg Latency: {}ms", m.avg_latency_ms).unwrap();
                if m.error_rate > 0.0 {
                    writeln!(output, "  Error Rate:  {:.1}%", m.error_rate).unwrap();
                }
            }
            writeln!(output).unwrap();

            writeln!(output, "Models").unwrap();
            writeln!(output, "  Embedding:   {}", service.embedding_model).unwrap();
            writeln!(output, "  Completion:  {}", service.completion_model).unwrap();
            writeln!(output).unwrap();

            writeln!(output, "Corpus:        [{}]", service.session.name().to_uppercase()).unwrap();
            if let Some(corpus) = service.session.serving() {
                writeln!(output, "  Serving:     {}", corpus_line(corpus)).unwrap();
                writeln!(output, "  Built:       {}", corpus.built_at).unwrap();
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
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
    fn format_answer(&self, answer: &Answer) -> String {
        self.render(answer)
    }

    fn format_upload(&self, report: &UploadReport) -> String {
        self.render(report)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "daemon": {
                "running": status.daemon_running,
                "socket": status.socket_path,
            },
            "health": status.health,
        });
        self.render(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_answer(&self, answer: &Answer) -> String {
        let mut output = String::new();
        writeln!(output, "## Answer\n").unwrap();
        writeln!(output, "**Question:** {}\n", answer.question).unwrap();
        writeln!(output, "{}\n", answer.answer.trim_end()).unwrap();

        if !answer.sources.is_empty() {
            writeln!(output, "### Sources\n").unwrap();
            for (i, source) in answer.sources.iter().enumerate() {
                writeln!(
                    output,
                    "{}. `{}` (score {:.3})\n",
                    i + 1,
                    source.location(),
                    source.score
                )
                .unwrap();
                writeln!(output, "```").unwrap();
                writeln!(output, "{}", source.text).unwrap();
                writeln!(output, "```\n").unwrap();
            }
        }

        writeln!(
            output,
            "*Corpus v{}, {}ms*",
            answer.corpus_version, answer.duration_ms
        )
        .unwrap();
        output
    }

    fn format_upload(&self, report: &UploadReport) -> String {
        let mut output = String::new();
        writeln!(output, "## Upload Complete\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| File | `{}` |", report.file_name).unwrap();
        writeln!(output, "| Documents | {} |", report.documents).unwrap();
        writeln!(output, "| Chunks | {} |", report.chunks).unwrap();
        writeln!(output, "| Vectors | {} |", report.vectors).unwrap();
        writeln!(output, "| Version | {} |", report.version).unwrap();
        writeln!(output, "| Duration | {}ms |", report.duration_ms).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        let daemon_status = if status.daemon_running { "✅" } else { "❌" };
        writeln!(output, "### Daemon {}\n", daemon_status).unwrap();
        writeln!(output, "- **Socket:** `{}`", status.socket_path).unwrap();

        if let Some(ref health) = status.health {
            let service = &health.service;
            writeln!(output, "- **Embedding:** {}", service.embedding_model).unwrap();
            writeln!(output, "- **Completion:** {}", service.completion_model).unwrap();
            if let Some(ref m) = health.metrics {
                writeln!(output, "- **Requests:** {}", m.total_requests).unwrap();
                writeln!(output, "- **Avg Latency:** {}ms", m.avg_latency_ms).unwrap();
                if m.error_rate > 0.0 {
                    writeln!(output, "- **Error Rate:** {:.1}%", m.error_rate).unwrap();
                }
            }
            writeln!(output).unwrap();

            let corpus_status = match service.session {
                SessionStatus::Ready { .. } => "✅",
                SessionStatus::Building { .. } => "⏳",
                SessionStatus::Empty => "❌",
            };
            writeln!(output, "### Corpus {}\n", corpus_status).unwrap();
            match service.session.serving() {
                Some(corpus) => writeln!(output, "- **Serving:** {}", corpus_line(corpus)).unwrap(),
                None => writeln!(output, "*No corpus loaded.*").unwrap(),
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
