use std::path::Path;

use citequotes_core::import::csv::export_quotes;
use citequotes_db::repositories::{QuoteRepository, SqlQuoteRepository};

use crate::commands::{open_database, prepare, CommandResult, Failure};

/// Without `--output` the raw CSV is printed so it can be piped.
pub fn run(output: Option<&Path>) -> CommandResult {
    let (config, runtime) = match prepare("export") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let details = SqlQuoteRepository::new(pool.clone())
            .all_details()
            .await
            .map_err(|error| ("export_execution", error.to_string(), 5u8))?;
        pool.close().await;

        let csv = export_quotes(&details)
            .map_err(|error| ("export_execution", error.to_string(), 5u8))?;
        Ok::<_, Failure>((details.len(), csv))
    });

    let (count, csv) = match result {
        Ok(exported) => exported,
        Err(failure) => return CommandResult::from_failure("export", failure),
    };

    match output {
        Some(path) => match std::fs::write(path, csv) {
            Ok(()) => CommandResult::success(
                "export",
                format!("exported {count} quotes to {}", path.display()),
            ),
            Err(error) => CommandResult::failure(
                "export",
                "output",
                format!("failed to write `{}`: {error}", path.display()),
                7,
            ),
        },
        None => CommandResult { exit_code: 0, output: csv.trim_end().to_string() },
    }
}
