//! Exception handlers installed at the host boundary.

use std::rc::Rc;

use ivy_core::{ExceptionHandler, RuntimeException};

use crate::wire::{ClientConnection, Notification, OutboundMessage};

/// Logs every exception at error level and reports it handled.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogExceptionHandler;

impl ExceptionHandler for LogExceptionHandler {
    fn handle_exception(&self, exception: &RuntimeException) -> bool {
        log::error!("{exception}");
        true
    }
}

/// Forwards exceptions to the client as notifications. Reports an exception
/// handled only when the notification was delivered.
pub struct ClientNotificationHandler<C: ?Sized> {
    connection: Rc<C>,
}

impl<C: ClientConnection + ?Sized> ClientNotificationHandler<C> {
    pub fn new(connection: Rc<C>) -> Self {
        Self { connection }
    }
}

impl<C: ClientConnection + ?Sized> ExceptionHandler for ClientNotificationHandler<C> {
    fn handle_exception(&self, exception: &RuntimeException) -> bool {
        let message = OutboundMessage::Notification(notification_for(exception));
        match self.connection.send(message) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("could not notify client: {err}");
                false
            }
        }
    }
}

pub fn notification_for(exception: &RuntimeException) -> Notification {
    let title = match exception {
        RuntimeException::Event(_) => "Event handler failed",
        RuntimeException::Effect(_) => "Effect failed",
        RuntimeException::HookSequence { .. } | RuntimeException::DuplicateKey(_) => {
            "Render failed"
        }
    };
    Notification {
        title: title.to_owned(),
        description: exception.to_string(),
    }
}
