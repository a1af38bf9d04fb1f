// src/tz/format.rs
use crate::analyzer_client::{AnalyzeReport, Finding, ReportError};

// Leaves headroom under the messenger's 4096-character hard limit.
const MAX_MESSAGE_LENGTH: usize = 4000;
const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━\n";

/// Renders an analysis report as a sequence of messenger messages.
///
/// The first message opens with the token statistics block. Error blocks are
/// accumulated in order; when the next block would push a message past
/// [`MAX_MESSAGE_LENGTH`] the accumulator is flushed. A single block that is
/// itself over the cap is split per-finding with continuation headers.
pub fn format_for_telegram(report: &AnalyzeReport) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();

    current.push_str(&format!(
        "📊 *Processing statistics:*\n\
         • Prompt tokens: `{}`\n\
         • Completion tokens: `{}`\n\
         • Total tokens: `{}`\n\n",
        report.tokens.prompt, report.tokens.completion, report.tokens.total
    ));

    if report.errors.is_empty() {
        current.push_str("✅ *No errors found*");
        messages.push(current);
        return messages;
    }

    current.push_str(&format!(
        "🚨 *Errors detected: {}*\n\n",
        report.errors.len()
    ));

    for (error_index, error) in report.errors.iter().enumerate() {
        let block = format_error(error_index + 1, error);

        if current.len() + block.len() > MAX_MESSAGE_LENGTH {
            if !current.is_empty() {
                messages.push(std::mem::take(&mut current));
            }

            if block.len() > MAX_MESSAGE_LENGTH {
                messages.extend(format_large_error(error_index + 1, error));
                continue;
            }
        }

        current.push_str(&block);
    }

    if !current.is_empty() {
        messages.push(current);
    }

    messages
}

fn error_header(index: usize, error: &ReportError) -> String {
    format!(
        "🔴 *Error #{}*\n**Code:** `{}`\n**Title:** {}\n**Type:** `{}`\n\n",
        index, error.code, error.title, error.kind
    )
}

fn format_error(index: usize, error: &ReportError) -> String {
    let mut block = error_header(index, error);

    if !error.findings.is_empty() {
        block.push_str("📋 *Details:*\n");
        for (finding_index, finding) in error.findings.iter().enumerate() {
            block.push_str(&format_finding(finding_index + 1, finding));
        }
    }

    block.push_str(SEPARATOR);
    block.push('\n');
    block
}

fn format_finding(index: usize, finding: &Finding) -> String {
    let mut text = format!("  *{index}.* ");

    if !finding.paragraph.is_empty() {
        text.push_str(&format!("**Paragraph:** {}\n", finding.paragraph));
    }
    if !finding.quote.is_empty() {
        text.push_str(&format!("     💬 *Quote:* ||{}||\n", finding.quote));
    }
    if !finding.advice.is_empty() {
        text.push_str(&format!("     💡 *Advice:* _{}_\n", finding.advice));
    }

    text.push('\n');
    text
}

// An oversized error is emitted finding by finding. The overflow check
// reserves room for the trailing separator so every message stays under the
// cap.
fn format_large_error(index: usize, error: &ReportError) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = error_header(index, error);

    if !error.findings.is_empty() {
        current.push_str("📋 *Details:*\n");

        for (finding_index, finding) in error.findings.iter().enumerate() {
            let finding_text = format_finding(finding_index + 1, finding);

            if current.len() + finding_text.len() + SEPARATOR.len() > MAX_MESSAGE_LENGTH {
                current.push_str(SEPARATOR);
                messages.push(std::mem::take(&mut current));
                current.push_str(&format!("🔴 *Error #{index} (continued)*\n\n"));
            }

            current.push_str(&finding_text);
        }
    }

    current.push_str(SEPARATOR);
    messages.push(current);

    messages
}
