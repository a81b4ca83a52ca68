//! Host boundary for an Ivy session.
//!
//! [`AppShell`] owns one session on the standard runtime and talks to a
//! single client: inbound events arrive as JSON through
//! [`AppShell::receive`], and [`AppShell::pump`] runs the turns they cause,
//! forwarding each commit to the [`ClientConnection`].

mod config;
mod sinks;
mod wire;

use std::rc::Rc;

use ivy_core::{ExceptionPipeline, InboundEvent, Session, TurnError, View, WidgetNode};
use ivy_runtime_std::StdRuntime;
use thiserror::Error;

pub use config::ShellConfig;
pub use sinks::{notification_for, ClientNotificationHandler, LogExceptionHandler};
pub use wire::{decode_event, ClientConnection, Notification, OutboundMessage, WireError};

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error(transparent)]
    Wire(#[from] WireError),
}

pub struct AppShell<C: ClientConnection + 'static> {
    runtime: StdRuntime,
    session: Session,
    connection: Rc<C>,
    config: ShellConfig,
}

impl<C: ClientConnection + 'static> AppShell<C> {
    pub fn new(root: impl View, connection: C, config: ShellConfig) -> Self {
        let runtime = StdRuntime::new();
        let connection = Rc::new(connection);

        let mut pipeline = ExceptionPipeline::new();
        if config.notify_client_on_error {
            pipeline.push(ClientNotificationHandler::new(Rc::clone(&connection)));
        }
        if config.log_unhandled {
            pipeline.push(LogExceptionHandler);
        }

        let session = Session::with_runtime(root, runtime.runtime())
            .with_exception_handler(pipeline.build())
            .with_config(config.session.clone());
        Self {
            runtime,
            session,
            connection,
            config,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn runtime(&self) -> &StdRuntime {
        &self.runtime
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn committed_tree(&self) -> Option<&Rc<WidgetNode>> {
        self.session.committed_tree()
    }

    /// Decodes one JSON event and queues it for the next turn.
    pub fn receive(&mut self, json: &str) -> Result<(), WireError> {
        let event = decode_event(json)?;
        log::trace!(
            "received {} for widget {:#x}",
            event.event_name,
            event.widget_id
        );
        self.session.enqueue_event(event);
        Ok(())
    }

    pub fn receive_event(&mut self, event: InboundEvent) {
        self.session.enqueue_event(event);
    }

    /// Runs turns while work is queued, sending each commit to the client.
    /// Returns how many commits were sent.
    ///
    /// A turn that ended with an unhandled exception still sends its commit
    /// before the error is returned.
    pub fn pump(&mut self) -> Result<usize, ShellError> {
        if self.session.is_disposed() {
            return Err(TurnError::Disposed.into());
        }
        if self.session.is_poisoned() {
            return Err(TurnError::Poisoned.into());
        }
        let limit = self.session.config().max_turns_per_drain;
        let mut turns = 0;
        let mut sent = 0;
        self.runtime.take_turn_request();
        while self.session.needs_turn() {
            if turns >= limit {
                return Err(TurnError::TurnLimit(limit).into());
            }
            turns += 1;
            let report = match self.session.run_turn() {
                Ok(report) => report,
                Err(TurnError::Unhandled {
                    exception,
                    mut report,
                }) => {
                    if let Some(commit) = report.commit.take() {
                        self.connection.send(OutboundMessage::Commit(commit))?;
                    }
                    return Err(TurnError::Unhandled { exception, report }.into());
                }
                Err(err) => return Err(err.into()),
            };
            if let Some(commit) = report.commit {
                log::debug!(
                    "sending commit {} ({} patches)",
                    commit.version,
                    commit.patches.len()
                );
                self.connection.send(OutboundMessage::Commit(commit))?;
                sent += 1;
            }
            self.runtime.take_turn_request();
        }
        Ok(sent)
    }

    /// Tears down the session. Later pumps fail with
    /// [`TurnError::Disposed`].
    pub fn dispose(&mut self) {
        self.session.dispose();
    }
}
