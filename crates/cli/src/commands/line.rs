use linekeeper_core::domain::identity::Session;
use linekeeper_core::domain::org::{FacilityId, FloorId, TeamId};
use linekeeper_core::domain::phone_line::{
    AllocationTarget, NewPhoneLine, PhoneLine, PhoneLineId, PhoneLineStatus,
};
use linekeeper_core::domain::vendor::VendorId;
use linekeeper_core::projection::LineFilter;
use linekeeper_db::OperationError;

use crate::commands::{operation_failure, require_session, CommandResult, Workspace};

/// Where an allocated or transferred line ends up.
#[derive(Debug, clap::Args)]
pub struct SeatArgs {
    #[arg(long, value_name = "TEAM_ID")]
    pub team: String,
    #[arg(long, value_name = "FACILITY_ID")]
    pub facility: String,
    #[arg(long, value_name = "FLOOR_ID")]
    pub floor: String,
    #[arg(long, value_name = "NAME")]
    pub employee: Option<String>,
    #[arg(long, value_name = "EXTENSION")]
    pub extension: Option<String>,
    #[arg(long, value_name = "CODE")]
    pub workstation: Option<String>,
}

impl SeatArgs {
    fn target(&self) -> AllocationTarget {
        AllocationTarget {
            team_id: TeamId(self.team.clone()),
            facility_id: FacilityId(self.facility.clone()),
            floor_id: FloorId(self.floor.clone()),
            employee_name: self.employee.clone(),
            extension_no: self.extension.clone(),
            workstation_code: self.workstation.clone(),
        }
    }
}

#[derive(Debug, Default, clap::Args)]
pub struct LineListArgs {
    #[arg(long, value_name = "VENDOR_ID")]
    pub vendor: Option<String>,
    #[arg(long, value_name = "FACILITY_ID")]
    pub facility: Option<String>,
    #[arg(long, value_name = "TEAM_ID")]
    pub team: Option<String>,
    #[arg(long, value_enum)]
    pub status: Option<LineStatusArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LineStatusArg {
    Available,
    Allocated,
    Maintenance,
    Retired,
}

impl From<LineStatusArg> for PhoneLineStatus {
    fn from(value: LineStatusArg) -> Self {
        match value {
            LineStatusArg::Available => Self::Available,
            LineStatusArg::Allocated => Self::Allocated,
            LineStatusArg::Maintenance => Self::Maintenance,
            LineStatusArg::Retired => Self::Retired,
        }
    }
}

pub fn provision(
    actor: Option<&str>,
    vendor_id: &str,
    did: &str,
    serial_no: &str,
) -> CommandResult {
    const COMMAND: &str = "line provision";
    let (session, workspace) = match open(COMMAND, actor) {
        Ok(opened) => opened,
        Err(failure) => return failure,
    };

    let new = NewPhoneLine {
        vendor_id: VendorId(vendor_id.to_string()),
        phone_line_did: did.to_string(),
        serial_no: serial_no.to_string(),
    };
    let result = workspace.block_on(workspace.desk.provision_line(&session, new));
    finish(COMMAND, workspace, result)
}

pub fn allocate(actor: Option<&str>, line_id: &str, seat: &SeatArgs) -> CommandResult {
    const COMMAND: &str = "line allocate";
    let (session, workspace) = match open(COMMAND, actor) {
        Ok(opened) => opened,
        Err(failure) => return failure,
    };

    let line_id = PhoneLineId(line_id.to_string());
    let result =
        workspace.block_on(workspace.desk.allocate_line(&session, &line_id, &seat.target()));
    finish(COMMAND, workspace, result)
}

pub fn transfer(actor: Option<&str>, line_id: &str, seat: &SeatArgs) -> CommandResult {
    const COMMAND: &str = "line transfer";
    let (session, workspace) = match open(COMMAND, actor) {
        Ok(opened) => opened,
        Err(failure) => return failure,
    };

    let line_id = PhoneLineId(line_id.to_string());
    let result =
        workspace.block_on(workspace.desk.transfer_line(&session, &line_id, &seat.target()));
    finish(COMMAND, workspace, result)
}

pub fn deallocate(actor: Option<&str>, line_id: &str) -> CommandResult {
    const COMMAND: &str = "line deallocate";
    let (session, workspace) = match open(COMMAND, actor) {
        Ok(opened) => opened,
        Err(failure) => return failure,
    };

    let line_id = PhoneLineId(line_id.to_string());
    let result = workspace.block_on(workspace.desk.deallocate_line(&session, &line_id));
    finish(COMMAND, workspace, result)
}

pub fn maintenance(actor: Option<&str>, line_id: &str) -> CommandResult {
    const COMMAND: &str = "line maintenance";
    let (session, workspace) = match open(COMMAND, actor) {
        Ok(opened) => opened,
        Err(failure) => return failure,
    };

    let line_id = PhoneLineId(line_id.to_string());
    let result = workspace.block_on(workspace.desk.set_maintenance(&session, &line_id));
    finish(COMMAND, workspace, result)
}

pub fn restore(actor: Option<&str>, line_id: &str) -> CommandResult {
    const COMMAND: &str = "line restore";
    let (session, workspace) = match open(COMMAND, actor) {
        Ok(opened) => opened,
        Err(failure) => return failure,
    };

    let line_id = PhoneLineId(line_id.to_string());
    let result = workspace.block_on(workspace.desk.restore_line(&session, &line_id));
    finish(COMMAND, workspace, result)
}

pub fn retire(actor: Option<&str>, line_id: &str) -> CommandResult {
    const COMMAND: &str = "line retire";
    let (session, workspace) = match open(COMMAND, actor) {
        Ok(opened) => opened,
        Err(failure) => return failure,
    };

    let line_id = PhoneLineId(line_id.to_string());
    let result = workspace.block_on(workspace.desk.retire_line(&session, &line_id));
    finish(COMMAND, workspace, result)
}

pub fn show(actor: Option<&str>, line_id: &str) -> CommandResult {
    const COMMAND: &str = "line show";
    let (session, workspace) = match open(COMMAND, actor) {
        Ok(opened) => opened,
        Err(failure) => return failure,
    };

    let line_id = PhoneLineId(line_id.to_string());
    let result = workspace.block_on(workspace.desk.phone_line(&session, &line_id));
    finish(COMMAND, workspace, result)
}

pub fn list(actor: Option<&str>, args: &LineListArgs) -> CommandResult {
    const COMMAND: &str = "line list";
    let (session, workspace) = match open(COMMAND, actor) {
        Ok(opened) => opened,
        Err(failure) => return failure,
    };

    let filter = LineFilter {
        vendor_id: args.vendor.clone().map(VendorId),
        facility_id: args.facility.clone().map(FacilityId),
        team_id: args.team.clone().map(TeamId),
        status: args.status.map(PhoneLineStatus::from),
    };
    let result = workspace.block_on(workspace.desk.phone_lines(&session, &filter));
    workspace.close();

    match result {
        Ok(lines) => {
            CommandResult::success_with_data(COMMAND, format!("{} phone lines", lines.len()), lines)
        }
        Err(error) => operation_failure(COMMAND, error),
    }
}

fn open(command: &str, actor: Option<&str>) -> Result<(Session, Workspace), CommandResult> {
    let session = require_session(command, actor)?;
    let workspace = Workspace::open(command)?;
    Ok((session, workspace))
}

fn finish(
    command: &str,
    workspace: Workspace,
    result: Result<PhoneLine, OperationError>,
) -> CommandResult {
    workspace.close();
    match result {
        Ok(line) => {
            let message = format!("{} is {}", line.id.0, line.status.as_str());
            CommandResult::success_with_data(command, message, line)
        }
        Err(error) => operation_failure(command, error),
    }
}
