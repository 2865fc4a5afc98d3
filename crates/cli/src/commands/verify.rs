use crate::commands::{
    operation_failure, require_session, CommandResult, Workspace, EXIT_COUNTER_DRIFT,
};

/// Recomputes team, floor and vendor counters from the line rows and reports
/// every disagreement. Nothing is repaired.
pub fn run(actor: Option<&str>) -> CommandResult {
    let session = match require_session("verify", actor) {
        Ok(session) => session,
        Err(failure) => return failure,
    };
    let workspace = match Workspace::open("verify") {
        Ok(workspace) => workspace,
        Err(failure) => return failure,
    };

    let result = workspace.block_on(workspace.desk.verify_counters(&session));
    workspace.close();

    match result {
        Ok(report) if report.is_consistent() => {
            let message = format!(
                "{} lines scanned; counters consistent for {} teams, {} floors and {} vendors",
                report.lines_scanned,
                report.teams_checked,
                report.floors_checked,
                report.vendors_checked,
            );
            CommandResult::success_with_data("verify", message, report)
        }
        Ok(report) => {
            let drifts = report.drifts.len();
            let message = format!("{drifts} stored counters disagree with the phone line rows");
            CommandResult::failure_with_data(
                "verify",
                "counter_drift",
                message,
                EXIT_COUNTER_DRIFT,
                report,
            )
        }
        Err(error) => operation_failure("verify", error),
    }
}
