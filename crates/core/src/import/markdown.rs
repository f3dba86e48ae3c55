//! Markdown quote collections.
//!
//! ```text
//! ## Optional heading
//! > The unexamined life
//! > is not worth living.
//! — Socrates, Apology
//! - Date: 399 BC
//! - **Tags:** philosophy; ethics
//!
//! ---
//! ```
//!
//! Entries are separated by `---`/`***` rules or by `#` headings.

use super::{apply_field, check_size, Field, ImportError, ImportLimits, ImportReport, RejectedRow};
use crate::domain::submission::SubmissionForm;

const ATTRIBUTION_PREFIXES: [&str; 4] = ["\u{2014}", "\u{2013}", "--", "~"];

/// Comma-separated parts of a name that are not a work title.
const NAME_SUFFIXES: [&str; 10] = ["jr", "jr.", "sr", "sr.", "ii", "iii", "iv", "phd", "ph.d.", "esq."];

pub fn parse_submissions(input: &str, limits: &ImportLimits) -> Result<ImportReport, ImportError> {
    check_size(input, limits)?;

    let mut report = ImportReport::default();
    let mut entries = 0usize;

    for block in split_entries(input) {
        entries += 1;
        if entries > limits.max_rows {
            return Err(ImportError::TooManyRows { limit: limits.max_rows });
        }
        match parse_entry(&block, &mut report.warnings) {
            Ok(form) => report.push_row(block.first_line, form),
            Err(reason) => report.rejected.push(RejectedRow { line: block.first_line, reason }),
        }
    }

    Ok(report)
}

struct Block<'a> {
    first_line: usize,
    lines: Vec<(usize, &'a str)>,
}

fn split_entries(input: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current: Vec<(usize, &str)> = Vec::new();

    for (index, line) in input.lines().enumerate() {
        let trimmed = line.trim();
        if is_rule(trimmed) || trimmed.starts_with('#') {
            flush(&mut current, &mut blocks);
            continue;
        }
        current.push((index + 1, line));
    }
    flush(&mut current, &mut blocks);
    blocks
}

fn flush<'a>(current: &mut Vec<(usize, &'a str)>, blocks: &mut Vec<Block<'a>>) {
    match current.iter().find(|(_, line)| !line.trim().is_empty()) {
        Some(&(first_line, _)) => {
            blocks.push(Block { first_line, lines: std::mem::take(current) });
        }
        None => current.clear(),
    }
}

fn is_rule(line: &str) -> bool {
    line.len() >= 3
        && (line.chars().all(|c| c == '-') || line.chars().all(|c| c == '*'))
}

fn parse_entry(block: &Block<'_>, warnings: &mut Vec<String>) -> Result<SubmissionForm, String> {
    let mut form = SubmissionForm::default();
    let mut quote_lines: Vec<&str> = Vec::new();

    for (line_number, raw) in &block.lines {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('>') {
            quote_lines.push(rest.strip_prefix(' ').unwrap_or(rest).trim_end());
            continue;
        }

        if let Some(attribution) = strip_attribution(line) {
            let (author, work) = split_attribution(attribution);
            form.author = author.to_string();
            if let Some(work) = work.filter(|w| !w.is_empty()) {
                if form.source_title.is_none() {
                    form.source_title = Some(work.to_string());
                }
            }
            continue;
        }

        let item = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .unwrap_or(line)
            .replace("**", "");
        if let Some((key, value)) = item.split_once(':') {
            if let Some(field) = Field::resolve(key) {
                apply_field(&mut form, field, value).map_err(|e| e.to_string())?;
                continue;
            }
        }

        warnings.push(format!("line {line_number}: ignoring unrecognized line"));
    }

    if !quote_lines.is_empty() {
        form.quote_text = quote_lines.join("\n").trim().to_string();
    }

    Ok(form)
}

fn strip_attribution(line: &str) -> Option<&str> {
    ATTRIBUTION_PREFIXES
        .iter()
        .find_map(|prefix| line.strip_prefix(*prefix))
        .map(str::trim)
        .filter(|rest| !rest.is_empty())
}

/// Splits `Author, Work` at the first comma that does not introduce a name suffix.
fn split_attribution(attribution: &str) -> (&str, Option<&str>) {
    let mut from = 0;
    while let Some(offset) = attribution[from..].find(", ") {
        let at = from + offset;
        let rest = &attribution[at + 2..];
        let segment = rest.split(',').next().unwrap_or(rest).trim().to_ascii_lowercase();
        if !NAME_SUFFIXES.contains(&segment.as_str()) {
            return (attribution[..at].trim(), Some(rest.trim()));
        }
        from = at + 2;
    }
    (attribution.trim(), None)
}
