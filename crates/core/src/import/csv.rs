use ::csv::{ReaderBuilder, Trim, WriterBuilder};

use super::{apply_field, check_size, join_array, Field, ImportError, ImportLimits, ImportReport};
use crate::domain::quote::QuoteDetail;
use crate::domain::submission::SubmissionForm;

/// Column order used by [`export_quotes`]; the importer accepts it verbatim.
pub const EXPORT_HEADER: [&str; 13] = [
    "quote_text",
    "author",
    "quote_date",
    "context",
    "citation",
    "source_title",
    "source_author",
    "source_publisher",
    "source_date",
    "source_url",
    "translations",
    "tags",
    "evidence_image_urls",
];

pub fn parse_submissions(input: &str, limits: &ImportLimits) -> Result<ImportReport, ImportError> {
    check_size(input, limits)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(input.as_bytes());

    let headers = reader
        .headers()
        .map_err(|error| ImportError::Malformed(error.to_string()))?
        .clone();

    let mut report = ImportReport::default();
    let mut columns: Vec<Option<Field>> = Vec::with_capacity(headers.len());
    for header in headers.iter() {
        let field = Field::resolve(header);
        if field.is_none() && !header.trim().is_empty() {
            report.warnings.push(format!("ignoring unknown column `{}`", header.trim()));
        }
        if let Some(field) = field {
            if columns.contains(&Some(field)) {
                report.warnings.push(format!(
                    "column `{}` repeats `{}`; later values are appended or win",
                    header.trim(),
                    field.canonical()
                ));
            }
        }
        columns.push(field);
    }

    let missing: Vec<String> = [Field::QuoteText, Field::Author]
        .into_iter()
        .filter(|required| !columns.contains(&Some(*required)))
        .map(|field| field.canonical().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    let mut rows_seen = 0usize;
    for (index, record) in reader.records().enumerate() {
        // header occupies line 1
        let fallback_line = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(error) => {
                let line = error.position().map(|p| p.line() as usize).unwrap_or(fallback_line);
                report.rejected.push(super::RejectedRow { line, reason: error.to_string() });
                continue;
            }
        };
        let line = record.position().map(|p| p.line() as usize).unwrap_or(fallback_line);

        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }

        rows_seen += 1;
        if rows_seen > limits.max_rows {
            return Err(ImportError::TooManyRows { limit: limits.max_rows });
        }

        if record.len() != columns.len() {
            report.rejected.push(super::RejectedRow {
                line,
                reason: format!("expected {} fields, found {}", columns.len(), record.len()),
            });
            continue;
        }

        let mut form = SubmissionForm::default();
        let mut row_error = None;
        for (value, column) in record.iter().zip(columns.iter()) {
            let Some(field) = column else { continue };
            if let Err(error) = apply_field(&mut form, *field, value) {
                row_error = Some(error);
                break;
            }
        }

        match row_error {
            Some(error) => {
                report.rejected.push(super::RejectedRow { line, reason: super::reason_of(error) })
            }
            None => report.push_row(line, form),
        }
    }

    Ok(report)
}

pub fn export_quotes(details: &[QuoteDetail]) -> Result<String, ImportError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER).map_err(|e| ImportError::Malformed(e.to_string()))?;

    for detail in details {
        let quote = &detail.quote;
        let source = detail.original_source.as_ref();
        let translations = join_array(
            detail.translations.iter().map(|t| format!("{}:{}", t.language, t.translated_text)),
        );
        let record = [
            quote.quote_text.clone(),
            quote.author.clone(),
            quote.quote_date.clone().unwrap_or_default(),
            quote.context.clone().unwrap_or_default(),
            quote.citation.clone().unwrap_or_default(),
            source.map(|s| s.title.clone()).unwrap_or_default(),
            source.and_then(|s| s.author.clone()).unwrap_or_default(),
            source.and_then(|s| s.publisher.clone()).unwrap_or_default(),
            source.and_then(|s| s.publication_date.clone()).unwrap_or_default(),
            source.and_then(|s| s.url.clone()).unwrap_or_default(),
            translations,
            join_array(&quote.tags),
            join_array(&quote.evidence_image_urls),
        ];
        writer.write_record(&record).map_err(|e| ImportError::Malformed(e.to_string()))?;
    }

    let bytes = writer.into_inner().map_err(|e| ImportError::Malformed(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ImportError::Malformed(e.to_string()))
}
