use std::ops::Range;

use ii_analysis::OrganizationFrequencyTable;
use ii_core::{ArticleRecord, OrganizationSpan};

pub const PREVIEW_CHARS: usize = 300;

/// Wraps each span in `open`/`close`. Spans must be ordered and non-overlapping;
/// any that are not, or that fall outside `text`, are left unmarked.
pub fn highlight(text: &str, spans: &[Range<usize>], open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * (open.len() + close.len()));
    let mut cursor = 0;
    for span in spans {
        if span.start < cursor || span.start >= span.end || text.get(span.clone()).is_none() {
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        out.push_str(open);
        out.push_str(&text[span.clone()]);
        out.push_str(close);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// First `max_chars` characters of `text` followed by `...`.
pub fn preview(text: &str, max_chars: usize) -> String {
    let cut = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(byte, _)| byte);
    format!("{}...", &text[..cut])
}

pub fn render_organizations(table: &OrganizationFrequencyTable, top: usize) -> String {
    let mut out = String::from("## Most mentioned organizations\n");
    if table.is_empty() {
        out.push_str("(none detected)\n");
        return out;
    }
    for (rank, (organization, count)) in table.top_n(top).into_iter().enumerate() {
        out.push_str(&format!("{:>3}. {} ({})\n", rank + 1, organization, count));
    }
    out
}

/// Title in bold with recognized organizations marked, then URL and body preview.
/// Only organizations the recognizer located in the title are marked.
pub fn render_article(article: &ArticleRecord) -> String {
    let mut spans: Vec<Range<usize>> = article
        .title_spans
        .iter()
        .filter_map(OrganizationSpan::range)
        .collect();
    spans.sort_by_key(|span| span.start);
    format!(
        "**{}**\n{}\n{}\n",
        highlight(&article.title, &spans, "<b>", "</b>"),
        article.url,
        preview(&article.body, PREVIEW_CHARS)
    )
}
