// src/tz/paragraphs.rs
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

// Rendered form: {{PARAGRAPHS_PLACEHOLDER_0}}, {{PARAGRAPHS_PLACEHOLDER_1}}, ...
const PLACEHOLDER_TEMPLATE: &str = "{{PARAGRAPHS_PLACEHOLDER_{{ARTICLE_INDEX}}}}";

lazy_static! {
    static ref ARTICLE_RE: Regex = Regex::new(r"(?s)<article[^>]*>(.*?)</article>").unwrap();
    static ref ARTICLE_TAG_RE: Regex = Regex::new(r"<article([^>]*)>").unwrap();
    static ref BLOCK_RE: Regex = Regex::new(r"(?s)<(\w+)([^>]*)>(.*?)</(\w+)>").unwrap();
    static ref TAGGED_BLOCK_RE: Regex = Regex::new(
        r#"(?s)<(\w+)[^>]*data-article="(\d+)"[^>]*data-block="(\d+)"[^>]*>(.*?)</(\w+)>"#
    )
    .unwrap();
    static ref DATA_ARTICLE_ATTR_RE: Regex = Regex::new(r#"\s+data-article="[^"]*""#).unwrap();
    static ref DATA_BLOCK_ATTR_RE: Regex = Regex::new(r#"\s+data-block="[^"]*""#).unwrap();
    static ref LEFTOVER_PLACEHOLDER_RE: Regex =
        Regex::new(r"\{\{PARAGRAPHS_PLACEHOLDER_\d+\}\}").unwrap();
}

/// Result of pulling paragraph-level content out of a converted document.
///
/// `template` is the original HTML with each `<article>` body replaced by a
/// numbered placeholder; `paragraphs` holds the article children, each tagged
/// with `data-article` / `data-block` so [`insert_paragraphs`] can put them
/// back.
#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphExtraction {
    pub template: String,
    pub paragraphs: String,
}

fn placeholder_for(article_index: usize) -> String {
    PLACEHOLDER_TEMPLATE.replace("{{ARTICLE_INDEX}}", &article_index.to_string())
}

/// Extracts the direct children of every `<article>` element, tagging each
/// with its article and block index. Articles are rewritten in reverse
/// document order so earlier replacements do not shift later offsets.
pub fn extract_paragraphs(html: &str) -> ParagraphExtraction {
    let articles: Vec<_> = ARTICLE_RE.captures_iter(html).collect();

    if articles.is_empty() {
        return ParagraphExtraction {
            template: html.to_string(),
            paragraphs: String::new(),
        };
    }

    let mut paragraphs = String::new();
    let mut template = html.to_string();

    for article_index in (0..articles.len()).rev() {
        let caps = &articles[article_index];
        let full_article = caps.get(0).map_or("", |m| m.as_str());
        let content = caps.get(1).map_or("", |m| m.as_str());

        paragraphs.push_str(&child_blocks(content, article_index));

        let attrs = ARTICLE_TAG_RE
            .captures(full_article)
            .and_then(|tag| tag.get(1))
            .map_or("", |m| m.as_str());

        let replacement = format!(
            "<article{}>{}</article>",
            attrs,
            placeholder_for(article_index)
        );
        template = template.replacen(full_article, &replacement, 1);
    }

    ParagraphExtraction {
        template,
        paragraphs,
    }
}

fn child_blocks(article_content: &str, article_index: usize) -> String {
    let mut result = String::new();
    let mut block_index = 0usize;

    for caps in BLOCK_RE.captures_iter(article_content) {
        let tag = caps.get(1).map_or("", |m| m.as_str());
        let attrs = caps.get(2).map_or("", |m| m.as_str());
        let content = caps.get(3).map_or("", |m| m.as_str());
        let closing = caps.get(4).map_or("", |m| m.as_str());

        // A mismatched closing tag means the regex paired the wrong elements;
        // skip without consuming a block index.
        if tag != closing {
            continue;
        }

        result.push_str(&format!(
            "<{tag}{attrs} data-article=\"{article_index}\" data-block=\"{block_index}\">{content}</{tag}>"
        ));
        block_index += 1;
    }

    result
}

/// Reverses [`extract_paragraphs`]: strips the bookkeeping attributes from
/// every tagged block, regroups blocks by article, and substitutes them into
/// the numbered placeholders. Placeholders with no surviving blocks expand to
/// nothing.
pub fn insert_paragraphs(template: &str, paragraphs: &str) -> String {
    let mut article_blocks: HashMap<usize, Vec<String>> = HashMap::new();

    for caps in TAGGED_BLOCK_RE.captures_iter(paragraphs) {
        let full = caps.get(0).map_or("", |m| m.as_str());
        let tag = caps.get(1).map_or("", |m| m.as_str());
        let article_index: usize = caps
            .get(2)
            .map_or("", |m| m.as_str())
            .parse()
            .unwrap_or(0);
        let block_index: usize = caps
            .get(3)
            .map_or("", |m| m.as_str())
            .parse()
            .unwrap_or(0);
        let content = caps.get(4).map_or("", |m| m.as_str());
        let closing = caps.get(5).map_or("", |m| m.as_str());

        if tag != closing {
            continue;
        }

        // The opening tag runs from after the tag name to the first '>'.
        let attrs_end = full.find('>').unwrap_or(full.len());
        let raw_attrs = &full[1 + tag.len()..attrs_end];
        let without_article = DATA_ARTICLE_ATTR_RE.replace_all(raw_attrs, "");
        let without_block = DATA_BLOCK_ATTR_RE.replace_all(&without_article, "");
        let original_attrs = without_block.trim();

        let clean_block = if original_attrs.is_empty() {
            format!("<{tag}>{content}</{tag}>")
        } else {
            format!("<{tag} {original_attrs}>{content}</{tag}>")
        };

        let blocks = article_blocks.entry(article_index).or_default();
        if blocks.len() <= block_index {
            blocks.resize(block_index + 1, String::new());
        }
        blocks[block_index] = clean_block;
    }

    let mut result = template.to_string();
    for (article_index, blocks) in &article_blocks {
        result = result.replace(&placeholder_for(*article_index), &blocks.concat());
    }

    // Articles that contributed no blocks still carried a placeholder.
    LEFTOVER_PLACEHOLDER_RE.replace_all(&result, "").into_owned()
}
