use linekeeper_core::domain::org::{FacilityId, TeamId};
use linekeeper_core::domain::vendor::VendorId;
use linekeeper_core::projection::{Dashboard, DashboardFilter, VendorCapacity};
use linekeeper_db::OperationError;
use serde::Serialize;

use crate::commands::{operation_failure, require_session, CommandResult, Workspace};

#[derive(Debug, Default, clap::Args)]
pub struct DashboardArgs {
    #[arg(long, value_name = "FACILITY_ID", help = "Only teams in this facility")]
    pub facility: Option<String>,
    #[arg(long, value_name = "VENDOR_ID", help = "Only teams holding a line from this vendor")]
    pub vendor: Option<String>,
    #[arg(long, value_name = "TEAM_ID", help = "Only this team")]
    pub team: Option<String>,
}

impl DashboardArgs {
    fn filter(&self) -> DashboardFilter {
        DashboardFilter {
            facility_id: self.facility.clone().map(FacilityId),
            vendor_id: self.vendor.clone().map(VendorId),
            team_id: self.team.clone().map(TeamId),
        }
    }
}

#[derive(Debug, Serialize)]
struct DashboardOutput {
    dashboard: Dashboard,
    vendors: Vec<VendorCapacity>,
}

pub fn run(actor: Option<&str>, args: &DashboardArgs) -> CommandResult {
    let session = match require_session("dashboard", actor) {
        Ok(session) => session,
        Err(failure) => return failure,
    };
    let workspace = match Workspace::open("dashboard") {
        Ok(workspace) => workspace,
        Err(failure) => return failure,
    };

    let filter = args.filter();
    let result = workspace.block_on(async {
        let dashboard = workspace.desk.dashboard(&session, &filter).await?;
        let vendors =
            workspace.desk.vendor_capacity(&session, filter.vendor_id.as_ref()).await?;
        Ok::<_, OperationError>(DashboardOutput { dashboard, vendors })
    });
    workspace.close();

    match result {
        Ok(output) => {
            let summary = &output.dashboard.summary;
            let message = format!(
                "{} teams, {} seats, {} allocated lines ({} critical, {} warning)",
                summary.teams,
                summary.seats,
                summary.allocated_lines,
                summary.critical_teams,
                summary.warning_teams,
            );
            CommandResult::success_with_data("dashboard", message, output)
        }
        Err(error) => operation_failure("dashboard", error),
    }
}
