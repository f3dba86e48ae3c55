use std::path::Path;

use citequotes_core::domain::submission::SubmissionOrigin;
use citequotes_core::import::{self, ImportReport};
use citequotes_db::repositories::{SqlQuoteRepository, SqlSubmissionRepository};
use citequotes_db::SubmissionIntake;

use crate::commands::{open_database, prepare, CommandResult, Failure};
use crate::ImportFormatArg;

pub fn run(file: &Path, format: Option<ImportFormatArg>, dry_run: bool) -> CommandResult {
    let (config, runtime) = match prepare("import") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let input = match std::fs::read_to_string(file) {
        Ok(input) => input,
        Err(error) => {
            return CommandResult::failure(
                "import",
                "input",
                format!("failed to read `{}`: {error}", file.display()),
                7,
            );
        }
    };

    let format = format.unwrap_or_else(|| infer_format(file));
    let limits = config.import_limits();
    let parsed = match format {
        ImportFormatArg::Csv => import::csv::parse_submissions(&input, &limits),
        ImportFormatArg::Markdown => import::markdown::parse_submissions(&input, &limits),
    };
    let report = match parsed {
        Ok(report) => report,
        Err(error) => return CommandResult::failure("import", "input", error.to_string(), 7),
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let quotes = SqlQuoteRepository::new(pool.clone());
        let submissions = SqlSubmissionRepository::new(pool.clone());
        let mut intake = SubmissionIntake::load(&quotes, &submissions)
            .await
            .map_err(|error| ("import_execution", error.to_string(), 5u8))?;

        let mut flagged = 0usize;
        for row in &report.accepted {
            let duplicates = if dry_run {
                intake.preview(format!("line-{}", row.line), &row.form.quote_text)
            } else {
                intake
                    .submit(row.form.clone(), SubmissionOrigin::Import, None)
                    .await
                    .map_err(|error| {
                        ("import_execution", format!("line {}: {error}", row.line), 5u8)
                    })?
                    .potential_duplicate_ids
            };
            if !duplicates.is_empty() {
                flagged += 1;
            }
        }
        pool.close().await;
        Ok::<_, Failure>(flagged)
    });

    match result {
        Ok(flagged) => CommandResult::success("import", summary(&report, flagged, dry_run)),
        Err(failure) => CommandResult::from_failure("import", failure),
    }
}

fn infer_format(file: &Path) -> ImportFormatArg {
    match file.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("md" | "markdown") => ImportFormatArg::Markdown,
        _ => ImportFormatArg::Csv,
    }
}

fn summary(report: &ImportReport, flagged: usize, dry_run: bool) -> String {
    let mut message = format!(
        "{} {} submissions; {} rejected; {} warnings; {} potential duplicates",
        if dry_run { "would queue" } else { "queued" },
        report.accepted.len(),
        report.rejected.len(),
        report.warnings.len(),
        flagged
    );
    for rejected in &report.rejected {
        message.push_str(&format!("\nline {}: {}", rejected.line, rejected.reason));
    }
    message
}
