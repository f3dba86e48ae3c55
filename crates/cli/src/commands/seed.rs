use citequotes_db::SeedDataset;

use crate::commands::{open_database, prepare, CommandResult, Failure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let seeded = SeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = SeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        pool.close().await;

        if !verification.all_present {
            let failed: Vec<&str> = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
                .collect();
            return Err(("seed_verification", verification_message(&failed), 6u8));
        }
        Ok::<_, Failure>(seeded)
    });

    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "seed dataset loaded: quotes {}; super admin {}",
                seeded.quotes_seeded.join(", "),
                seeded.super_admin
            ),
        ),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_message_names_failed_checks() {
        assert_eq!(
            verification_message(&["quote-seed-001:source", "super-admin"]),
            "seed verification failed for checks: quote-seed-001:source, super-admin"
        );
    }

    #[test]
    fn verification_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "some seed data failed to load");
    }
}
