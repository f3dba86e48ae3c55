//! Citation strings for a quote and its original source.

use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteDetail;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStyle {
    Apa,
    Mla,
    Chicago,
    #[default]
    Plain,
}

impl CitationStyle {
    pub const ALL: [CitationStyle; 4] = [Self::Apa, Self::Mla, Self::Chicago, Self::Plain];

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "apa" => Ok(Self::Apa),
            "mla" => Ok(Self::Mla),
            "chicago" => Ok(Self::Chicago),
            "" | "plain" => Ok(Self::Plain),
            other => Err(DomainError::validation(format!(
                "unknown citation style `{other}` (expected apa, mla, chicago or plain)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apa => "apa",
            Self::Mla => "mla",
            Self::Chicago => "chicago",
            Self::Plain => "plain",
        }
    }
}

pub fn format_citation(detail: &QuoteDetail, style: CitationStyle) -> String {
    let quote = &detail.quote;
    let source = detail.original_source.as_ref();
    let text = quote.quote_text.trim();
    let author = quote.author.trim();
    let date = source
        .and_then(|s| s.publication_date.as_deref())
        .or(quote.quote_date.as_deref())
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let title = source.map(|s| s.title.trim()).filter(|t| !t.is_empty());
    let publisher = source.and_then(|s| s.publisher.as_deref()).map(str::trim);
    let url = source.and_then(|s| s.url.as_deref());

    match style {
        CitationStyle::Apa => {
            let mut out = format!("{}. ({}).", strip_period(author), date.unwrap_or("n.d."));
            match title {
                Some(title) => out.push_str(&format!(" {}.", strip_period(title))),
                None => out.push_str(&format!(" \"{}\"", terminate(text))),
            }
            if let Some(publisher) = publisher {
                out.push_str(&format!(" {}.", strip_period(publisher)));
            }
            if let Some(url) = url {
                out.push_str(&format!(" {url}"));
            }
            out
        }
        CitationStyle::Mla => {
            let mut out = format!("{}. \"{}\"", strip_period(author), terminate(text));
            let tail: Vec<&str> = [title, publisher, date].into_iter().flatten().collect();
            if !tail.is_empty() {
                out.push_str(&format!(" {}.", tail.join(", ")));
            }
            out
        }
        CitationStyle::Chicago => {
            let mut out = format!("{}.", strip_period(author));
            match title {
                Some(title) => {
                    out.push_str(&format!(" {}.", strip_period(title)));
                    let imprint: Vec<&str> = [publisher, date].into_iter().flatten().collect();
                    if !imprint.is_empty() {
                        out.push_str(&format!(" {}.", imprint.join(", ")));
                    }
                }
                None => {
                    out.push_str(&format!(" \"{}\"", terminate(text)));
                    if let Some(date) = date {
                        out.push_str(&format!(" {date}."));
                    }
                }
            }
            out
        }
        CitationStyle::Plain => {
            let mut out = format!("\"{text}\" \u{2014} {author}");
            if let Some(title) = title {
                out.push_str(&format!(", {title}"));
            }
            if let Some(date) = date {
                out.push_str(&format!(" ({date})"));
            }
            out
        }
    }
}

fn strip_period(value: &str) -> &str {
    value.trim_end_matches('.')
}

fn terminate(text: &str) -> String {
    if text.ends_with(['.', '!', '?']) {
        text.to_string()
    } else {
        format!("{text}.")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{format_citation, CitationStyle};
    use crate::domain::quote::{OriginalSource, Quote, QuoteDetail, QuoteId};

    fn detail(with_source: bool) -> QuoteDetail {
        let now = Utc::now();
        QuoteDetail {
            quote: Quote {
                id: QuoteId("q-1".into()),
                quote_text: "The unexamined life is not worth living".into(),
                author: "Socrates".into(),
                quote_date: Some("399 BC".into()),
                context: None,
                citation: None,
                tags: vec![],
                evidence_image_urls: vec![],
                created_by: None,
                created_at: now,
                updated_at: now,
            },
            original_source: with_source.then(|| OriginalSource {
                id: "s-1".into(),
                quote_id: QuoteId("q-1".into()),
                title: "Apology".into(),
                author: Some("Plato".into()),
                publisher: Some("Hackett".into()),
                publication_date: Some("2002".into()),
                location: None,
                url: None,
                source_type: Some("book".into()),
                created_at: now,
            }),
            translations: vec![],
            cited_by: vec![],
        }
    }

    #[test]
    fn styles_include_source_details_when_present() {
        let detail = detail(true);
        assert_eq!(
            format_citation(&detail, CitationStyle::Apa),
            "Socrates. (2002). Apology. Hackett."
        );
        assert_eq!(
            format_citation(&detail, CitationStyle::Mla),
            "Socrates. \"The unexamined life is not worth living.\" Apology, Hackett, 2002."
        );
        assert_eq!(
            format_citation(&detail, CitationStyle::Chicago),
            "Socrates. Apology. Hackett, 2002."
        );
        assert_eq!(
            format_citation(&detail, CitationStyle::Plain),
            "\"The unexamined life is not worth living\" \u{2014} Socrates, Apology (2002)"
        );
    }

    #[test]
    fn falls_back_to_quote_date_and_text_without_source() {
        let detail = detail(false);
        assert_eq!(
            format_citation(&detail, CitationStyle::Apa),
            "Socrates. (399 BC). \"The unexamined life is not worth living.\""
        );
        assert_eq!(
            format_citation(&detail, CitationStyle::Chicago),
            "Socrates. \"The unexamined life is not worth living.\" 399 BC."
        );
    }

    #[test]
    fn parse_rejects_unknown_styles() {
        assert_eq!(CitationStyle::parse("MLA").expect("mla"), CitationStyle::Mla);
        assert_eq!(CitationStyle::parse("").expect("default"), CitationStyle::Plain);
        assert!(CitationStyle::parse("harvard").is_err());
    }
}
