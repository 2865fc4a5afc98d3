use crate::commands::{operation_failure, CommandResult, Workspace};
use linekeeper_db::{DemoSeedDataset, OperationError, SeedResult, VerificationResult};

pub fn run() -> CommandResult {
    let workspace = match Workspace::open("seed") {
        Ok(workspace) => workspace,
        Err(failure) => return failure,
    };

    let pool = workspace.desk.pool().clone();
    let result = workspace.block_on(async {
        let seeded = DemoSeedDataset::load(&pool).await?;
        let verification = DemoSeedDataset::verify(&pool).await?;
        Ok::<_, OperationError>((seeded, verification))
    });
    workspace.close();

    match result {
        Ok((seeded, verification)) if verification.all_present => {
            CommandResult::success_with_data("seed", summary(&seeded), seeded)
        }
        Ok((_, verification)) => CommandResult::failure(
            "seed",
            "seed_verification",
            verification_message(&verification),
            6,
        ),
        Err(error) => operation_failure("seed", error),
    }
}

fn summary(seeded: &SeedResult) -> String {
    let lead = if seeded.seeded {
        "demo dataset loaded"
    } else {
        "demo dataset already present"
    };
    format!(
        "{lead}: {} facilities, {} floors, {} teams, {} vendors, {} users, {} lines ({} allocated)",
        seeded.facilities,
        seeded.floors,
        seeded.teams,
        seeded.vendors,
        seeded.users,
        seeded.lines,
        seeded.allocated_lines,
    )
}

fn verification_message(verification: &VerificationResult) -> String {
    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use linekeeper_db::VerificationResult;

    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let verification = VerificationResult {
            all_present: false,
            checks: vec![("fac-building-a", true), ("line-nw-04", false), ("team-sales", false)],
        };

        assert_eq!(
            verification_message(&verification),
            "Seed verification failed for checks: line-nw-04, team-sales"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let verification = VerificationResult { all_present: false, checks: vec![] };

        assert_eq!(verification_message(&verification), "Some seed data failed to load");
    }
}
