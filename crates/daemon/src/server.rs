// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use dl_core::{Clock, CycleEvent, Timer, User, UserInput};
use dl_daemon::protocol::{
    self, InputResult, Query, Request, Response, TimerSummary, UserSummary, DEFAULT_TIMEOUT,
    DEFAULT_EVENT_LIMIT, PROTOCOL_VERSION,
};
use tokio::net::UnixStream;
use tracing::{debug, error, info};

use crate::lifecycle::ListenCtx;

/// Handle a single client connection
pub async fn handle_connection(
    ctx: &ListenCtx,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    let response = handle_request(ctx, request).await;

    debug!("Sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

fn failure(message: impl ToString) -> Response {
    Response::Error {
        message: message.to_string(),
    }
}

/// Handle a single request and return a response
async fn handle_request(ctx: &ListenCtx, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => {
            let store = ctx.runtime.store();
            let users = store.users();
            let pending_timers = users.iter().map(|u| store.timers(&u.id).len()).sum();
            Response::Status {
                uptime_secs: ctx.start_time.elapsed().as_secs(),
                users: users.len(),
                active_cycles: store.active_cycles().len(),
                pending_timers,
                wal_sequence: store.sequence(),
                next_due: store.next_due(),
            }
        }

        Request::Input {
            user_id,
            kind,
            payload,
            received_at,
        } => {
            let input = UserInput {
                user_id,
                kind,
                payload,
                received_at: received_at.unwrap_or_else(|| ctx.runtime.clock().now()),
            };
            match ctx.runtime.handle_event(CycleEvent::Input { input }).await {
                Ok(handled) => {
                    let result = InputResult {
                        outcome: handled.outcome.to_string(),
                        stage: handled.stage,
                        rejected: handled.rejected.as_ref().map(|e| e.to_string()),
                    };
                    ctx.spawn_deferred(handled.deferred);
                    Response::Input { result }
                }
                Err(e) => failure(e),
            }
        }

        Request::RegisterUser { user } => {
            let now = ctx.runtime.clock().now();
            let user = match ctx.settings.defaults.build_user(user, now) {
                Ok(user) => user,
                Err(e) => return failure(e),
            };
            match ctx.runtime.register_user(user.clone()).await {
                Ok(timer) => Response::Registered {
                    first_morning: timer.due.resolve(&user.timezone),
                    user: Box::new(user),
                },
                Err(e) => failure(e),
            }
        }

        Request::UpdateUser { user_id, patch } => {
            let Some(current) = ctx.runtime.store().user(&user_id) else {
                return failure(format!("unknown user: {}", user_id));
            };
            let updated = match patch.apply(&current) {
                Ok(user) => user,
                Err(e) => return failure(e),
            };
            match ctx.runtime.update_user(updated).await {
                Ok(()) => Response::User {
                    user: ctx.runtime.store().user(&user_id).map(Box::new),
                },
                Err(e) => failure(e),
            }
        }

        Request::Query { query } => handle_query(ctx, query),

        Request::Compact => match ctx.runtime.store().compact() {
            Ok(sequence) => {
                info!(sequence, "compacted on request");
                Response::Compacted { sequence }
            }
            Err(e) => failure(e),
        },

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }
    }
}

/// Handle query requests
fn handle_query(ctx: &ListenCtx, query: Query) -> Response {
    let store = ctx.runtime.store();

    match query {
        Query::User { user_id } => Response::User {
            user: store.user(&user_id).map(Box::new),
        },

        Query::Users => {
            let users = store
                .users()
                .into_iter()
                .map(|user| {
                    let next_timer = store
                        .timers(&user.id)
                        .iter()
                        .map(|t| t.due.resolve(&user.timezone))
                        .min();
                    UserSummary {
                        stage: store.get_active(&user.id).map(|c| c.stage),
                        timezone: user.timezone.name().to_string(),
                        id: user.id,
                        name: user.name,
                        next_timer,
                    }
                })
                .collect();
            Response::Users { users }
        }

        Query::Cycle { user_id } => Response::Cycle {
            cycle: store.get_active(&user_id).map(Box::new),
        },

        Query::Timers { user_id } => {
            let users: Vec<User> = match user_id {
                Some(id) => match store.user(&id) {
                    Some(user) => vec![user],
                    None => return failure(format!("unknown user: {}", id)),
                },
                None => store.users(),
            };
            let mut timers: Vec<TimerSummary> = users
                .iter()
                .flat_map(|user| {
                    store
                        .timers(&user.id)
                        .into_iter()
                        .map(|timer| summarize(timer, &user.timezone))
                })
                .collect();
            timers.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.id.cmp(&b.id)));
            Response::Timers { timers }
        }

        Query::History { user_id, limit } => {
            let mut cycles = store.history(&user_id);
            cycles.reverse();
            if let Some(limit) = limit {
                cycles.truncate(limit);
            }
            Response::History { cycles }
        }

        Query::Events { user_id, limit } => {
            match ctx
                .runtime
                .events(&user_id, limit.unwrap_or(DEFAULT_EVENT_LIMIT))
            {
                Ok(events) => Response::Events { events },
                Err(e) => failure(e),
            }
        }
    }
}

fn summarize(timer: Timer, tz: &Tz) -> TimerSummary {
    let due_at: DateTime<Utc> = timer.due.resolve(tz);
    TimerSummary {
        id: timer.id,
        user_id: timer.user_id,
        purpose: timer.purpose,
        attempt: timer.attempt,
        cycle_date: timer.cycle_date,
        due_at,
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}
