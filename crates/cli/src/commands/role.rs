use linekeeper_core::domain::identity::{Role, UserId};

use crate::commands::{
    operation_failure, require_session, CommandResult, Workspace, EXIT_REJECTED,
};

pub fn assign(actor: Option<&str>, user_id: &str, role: &str) -> CommandResult {
    let session = match require_session("role assign", actor) {
        Ok(session) => session,
        Err(failure) => return failure,
    };
    let Some(role) = Role::parse(role) else {
        return CommandResult::failure(
            "role assign",
            "invalid_input",
            format!("unknown role `{role}` (expected super_admin|support_executive)"),
            EXIT_REJECTED,
        );
    };
    let workspace = match Workspace::open("role assign") {
        Ok(workspace) => workspace,
        Err(failure) => return failure,
    };

    let user_id = UserId(user_id.to_string());
    let result = workspace.block_on(workspace.desk.assign_role(&session, &user_id, role));
    workspace.close();

    match result {
        Ok(assigned) => CommandResult::success_with_data(
            "role assign",
            format!("{} is now {}", assigned.user_id.0, assigned.role.as_str()),
            assigned,
        ),
        Err(error) => operation_failure("role assign", error),
    }
}

pub fn revoke(actor: Option<&str>, user_id: &str) -> CommandResult {
    let session = match require_session("role revoke", actor) {
        Ok(session) => session,
        Err(failure) => return failure,
    };
    let workspace = match Workspace::open("role revoke") {
        Ok(workspace) => workspace,
        Err(failure) => return failure,
    };

    let user_id = UserId(user_id.to_string());
    let result = workspace.block_on(workspace.desk.revoke_role(&session, &user_id));
    workspace.close();

    match result {
        Ok(()) => CommandResult::success("role revoke", format!("{} has no role", user_id.0)),
        Err(error) => operation_failure("role revoke", error),
    }
}
