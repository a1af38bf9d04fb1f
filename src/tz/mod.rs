// src/tz/mod.rs
pub mod format;
pub mod highlight;
pub mod paragraphs;

pub use format::format_for_telegram;
pub use paragraphs::{extract_paragraphs, insert_paragraphs, ParagraphExtraction};

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::analyzer_client::{AnalyzeReport, AnalyzerClient, AnalyzerError, TokenUsage};
use crate::converter_client::{ConverterClient, ConverterError};
use crate::telegram_client::TelegramClient;
use highlight::{error_ids_in_order, fix_html_tags, highlight_phrase_ignore_case};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum TzError {
    #[error("uploaded file is empty")]
    EmptyFile,
    #[error("uploaded file exceeds the 10 MiB upload limit")]
    FileTooLarge,
    #[error(transparent)]
    Converter(#[from] ConverterError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

/// Annotated document returned to the web client.
#[derive(Debug, Serialize)]
pub struct TzAnalysis {
    pub text: String,
    pub errors: Vec<TzAnnotation>,
    pub tokens: TokenUsage,
}

#[derive(Debug, Clone, Serialize)]
pub struct TzAnnotation {
    pub id: usize,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Runs an uploaded requirements document through the pipeline: convert to
/// HTML, analyze, report to the messenger, and annotate the text for the web
/// client.
pub struct TzService {
    converter: ConverterClient,
    analyzer: AnalyzerClient,
    telegram: Option<TelegramClient>,
}

impl TzService {
    pub fn new(
        converter: ConverterClient,
        analyzer: AnalyzerClient,
        telegram: Option<TelegramClient>,
    ) -> Self {
        Self {
            converter,
            analyzer,
            telegram,
        }
    }

    pub async fn analyze_document(
        &self,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<TzAnalysis, TzError> {
        if data.is_empty() {
            return Err(TzError::EmptyFile);
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(TzError::FileTooLarge);
        }

        let document = self.converter.convert(file_name, data).await?;

        // Only paragraph-level content goes to the analyzer; the rest of the
        // converted HTML is carried around it.
        let extraction = extract_paragraphs(&document.text);
        let analyze_input = if extraction.paragraphs.is_empty() {
            document.text.as_str()
        } else {
            extraction.paragraphs.as_str()
        };

        let report = self.analyzer.analyze(analyze_input).await?;
        info!(
            filename = %document.filename,
            errors = report.errors.len(),
            tokens = report.tokens.total,
            "document analyzed"
        );

        let messages = format_for_telegram(&report);
        match &self.telegram {
            Some(telegram) => {
                let delivered = telegram.send_messages(&messages).await;
                info!(
                    total = messages.len(),
                    delivered, "analysis report delivered"
                );
            }
            None => debug!("telegram client not configured, skipping report delivery"),
        }

        let (text, errors) = annotate(&document.text, &report);

        Ok(TzAnalysis {
            text,
            errors,
            tokens: report.tokens,
        })
    }
}

/// Wraps each finding's quote in the document with an id-carrying span and
/// builds the matching annotation list, ordered by where the spans appear in
/// the text. Findings whose quote never occurs in the document are dropped.
fn annotate(text: &str, report: &AnalyzeReport) -> (String, Vec<TzAnnotation>) {
    let mut annotated = text.to_string();
    let mut annotations = Vec::new();

    for error in &report.errors {
        for finding in &error.findings {
            // Very short quotes match all over the document and cannot be
            // pinned to a location.
            if finding.quote.len() < 4 {
                continue;
            }

            let id = annotations.len();
            annotated = highlight_phrase_ignore_case(&annotated, &finding.quote, id);
            annotations.push(TzAnnotation {
                id,
                title: format!("{} {}", error.code, error.title),
                description: finding.advice.clone(),
                kind: "error".to_string(),
            });
        }
    }

    let annotated = fix_html_tags(&annotated);
    let order = error_ids_in_order(&annotated);
    let annotations = keep_in_appearance_order(annotations, &order);

    (annotated, annotations)
}

fn keep_in_appearance_order(
    annotations: Vec<TzAnnotation>,
    order: &[usize],
) -> Vec<TzAnnotation> {
    let mut by_id: HashMap<usize, TzAnnotation> =
        annotations.into_iter().map(|a| (a.id, a)).collect();

    order.iter().filter_map(|id| by_id.remove(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer_client::{Finding, ReportError, TokenUsage};

    fn report_with(errors: Vec<ReportError>) -> AnalyzeReport {
        AnalyzeReport {
            tokens: TokenUsage {
                prompt: 0,
                completion: 0,
                total: 0,
            },
            errors,
        }
    }

    fn single_finding_error(code: &str, title: &str, quote: &str, advice: &str) -> ReportError {
        ReportError {
            code: code.to_string(),
            title: title.to_string(),
            kind: "logic".to_string(),
            findings: vec![Finding {
                paragraph: String::new(),
                quote: quote.to_string(),
                advice: advice.to_string(),
            }],
        }
    }

    #[test]
    fn annotations_follow_document_order() {
        let text = "<p>The budget is flexible. Deadlines are soft.</p>";
        let report = report_with(vec![
            single_finding_error("E1", "Soft deadline", "Deadlines are soft", "set dates"),
            single_finding_error("E2", "Vague budget", "budget is flexible", "fix the sum"),
        ]);

        let (annotated, annotations) = annotate(text, &report);

        assert!(annotated.contains("<span error-id=\"0\">Deadlines are soft</span>"));
        assert!(annotated.contains("<span error-id=\"1\">budget is flexible</span>"));
        // The budget quote occurs first in the text, so its annotation leads.
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].id, 1);
        assert_eq!(annotations[0].title, "E2 Vague budget");
        assert_eq!(annotations[1].id, 0);
        assert_eq!(annotations[1].description, "set dates");
    }

    #[test]
    fn unmatched_and_short_quotes_produce_no_annotations() {
        let text = "<p>nothing relevant here</p>";
        let report = report_with(vec![
            single_finding_error("E1", "Ghost", "phrase that is absent", "advice"),
            single_finding_error("E2", "Tiny", "abc", "advice"),
        ]);

        let (annotated, annotations) = annotate(text, &report);

        assert_eq!(annotated, text);
        assert!(annotations.is_empty());
    }

    #[test]
    fn repeated_quote_yields_a_single_annotation() {
        let text = "<p>cost today, cost tomorrow</p>";
        let report = report_with(vec![single_finding_error(
            "E1",
            "Cost repeated",
            "cost",
            "deduplicate",
        )]);

        let (annotated, annotations) = annotate(text, &report);

        assert_eq!(annotated.matches("error-id=\"0\"").count(), 2);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].id, 0);
    }

    #[test]
    fn numbered_paragraphs_are_normalized_in_the_response() {
        let text = "<p1>review the wording</p1>";
        let report = report_with(vec![single_finding_error(
            "E1",
            "Wording",
            "review the wording",
            "rewrite",
        )]);

        let (annotated, annotations) = annotate(text, &report);

        assert!(annotated.starts_with("<p>"));
        assert!(annotated.ends_with("</p>"));
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].kind, "error");
    }
}
