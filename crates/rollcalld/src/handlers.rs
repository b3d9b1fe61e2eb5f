//! Control-protocol command handling

use rollcall_api::{
    ClientRole, Command, ErrorCode, ErrorInfo, Response, ResponsePayload,
};
use rollcall_core::SchedulerHandle;
use rollcall_store::AttendanceLog;
use rollcall_util::{ClientId, RollcallError};
use std::sync::Arc;
use tracing::{info, warn};

/// Upper bound on records returned by one `RecentLog`
pub const MAX_LOG_LIMIT: usize = 500;

/// What a command needs from the running service
#[derive(Clone)]
pub struct CommandContext {
    pub scheduler: SchedulerHandle,
    pub history: Arc<dyn AttendanceLog>,
}

pub async fn handle_command(
    ctx: &CommandContext,
    client_id: &ClientId,
    role: ClientRole,
    request_id: u64,
    command: Command,
) -> Response {
    if command.is_mutating() && !role.can_mutate() {
        warn!(client_id = %client_id, command = ?command, "Rejected command from observer");
        return Response::error(
            request_id,
            ErrorInfo::new(ErrorCode::PermissionDenied, "Operator role required"),
        );
    }

    match command {
        Command::GetState => match ctx.scheduler.snapshot().await {
            Ok(snapshot) => Response::success(request_id, ResponsePayload::State(snapshot)),
            Err(e) => error_response(request_id, &e),
        },

        Command::Skip { period } => match ctx.scheduler.skip(period).await {
            Ok(outcome) => {
                info!(client_id = %client_id, period = %period, already = outcome.already, "Period skipped");
                Response::success(
                    request_id,
                    ResponsePayload::Skipped {
                        period: outcome.period,
                        already: outcome.already,
                    },
                )
            }
            Err(e) => error_response(request_id, &e),
        },

        Command::Retry { period } => {
            info!(client_id = %client_id, period = %period, "Manual retry requested");
            match ctx.scheduler.retry(period).await {
                Ok(report) => Response::success(request_id, ResponsePayload::RetryFinished(report)),
                Err(e) => error_response(request_id, &e),
            }
        }

        Command::UpdateSettings {
            mode,
            student_count,
        } => match ctx.scheduler.update_settings(mode, student_count).await {
            Ok(settings) => Response::success(request_id, ResponsePayload::SettingsUpdated(settings)),
            Err(e) => error_response(request_id, &e),
        },

        Command::RecentLog { limit } => match ctx.history.recent(limit.min(MAX_LOG_LIMIT)) {
            Ok(records) => Response::success(request_id, ResponsePayload::Log(records)),
            Err(e) => {
                warn!(error = %e, "Failed to read attendance history");
                Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::StoreError, e.to_string()),
                )
            }
        },

        Command::SubscribeEvents => Response::success(
            request_id,
            ResponsePayload::Subscribed {
                client_id: client_id.clone(),
            },
        ),

        Command::UnsubscribeEvents => Response::success(request_id, ResponsePayload::Unsubscribed),

        Command::Ping => Response::success(request_id, ResponsePayload::Pong),
    }
}

pub fn error_response(request_id: u64, error: &RollcallError) -> Response {
    let code = match error {
        RollcallError::PeriodNotFound(_) | RollcallError::InvalidPeriodId(_) => {
            ErrorCode::PeriodNotFound
        }
        RollcallError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
        RollcallError::InvalidStudentCount(_) => ErrorCode::InvalidSettings,
        RollcallError::SchedulerUnavailable => ErrorCode::SchedulerUnavailable,
        RollcallError::StoreError(_) => ErrorCode::StoreError,
        _ => ErrorCode::InternalError,
    };

    Response::error(request_id, ErrorInfo::new(code, error.to_string()))
}
