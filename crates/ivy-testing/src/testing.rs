use std::rc::Rc;

use ivy_core::{
    CommitMessage, DispatchOutcome, EventArgs, InboundEvent, NodeId, Session, TurnError,
    TurnReport, View, WidgetNode,
};
use serde_json::Value;
use thiserror::Error;

use crate::mirror::{MirrorClient, MirrorError};

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error("patch stream could not be applied: {0}")]
    Mirror(#[from] MirrorError),
    #[error("mirror diverged from the committed tree at version {version}")]
    Diverged { version: u64 },
    #[error("no widget of kind {0} in the committed tree")]
    MissingKind(String),
}

/// Headless harness that drives a [`Session`] and replays every commit into a
/// [`MirrorClient`].
///
/// After each commit the mirror is compared with the session's own tree, so
/// any test built on the harness also checks that the patch stream alone is
/// enough to reconstruct what the server committed.
pub struct TestSession {
    session: Session,
    mirror: MirrorClient,
    commits: Vec<CommitMessage>,
}

impl TestSession {
    pub fn new(root: impl View) -> Self {
        Self::with_session(Session::new(root))
    }

    /// Wrap an already configured session. Nothing may have been committed
    /// yet, since the mirror starts out empty.
    pub fn with_session(session: Session) -> Self {
        Self {
            session,
            mirror: MirrorClient::new(),
            commits: Vec::new(),
        }
    }

    /// Run turns until the session is idle, applying each commit to the
    /// mirror. A commit attached to an unhandled exception is still applied
    /// before the error is returned.
    pub fn settle(&mut self) -> Result<Vec<TurnReport>, HarnessError> {
        let limit = self.session.config().max_turns_per_drain;
        let mut reports = Vec::new();
        while self.session.needs_turn() {
            if reports.len() >= limit {
                return Err(TurnError::TurnLimit(limit).into());
            }
            match self.session.run_turn() {
                Ok(report) => {
                    self.absorb(&report)?;
                    reports.push(report);
                }
                Err(TurnError::Unhandled { exception, report }) => {
                    self.absorb(&report)?;
                    return Err(TurnError::Unhandled { exception, report }.into());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(reports)
    }

    /// Dispatch an event, then settle.
    pub fn dispatch(
        &mut self,
        widget_id: NodeId,
        event: &str,
        args: EventArgs,
    ) -> Result<DispatchOutcome, HarnessError> {
        let outcome = self
            .session
            .dispatch(InboundEvent::new(widget_id, event, args))?;
        self.settle()?;
        Ok(outcome)
    }

    /// Dispatch `event` to the first widget of `kind` in pre-order.
    pub fn dispatch_to_kind(
        &mut self,
        kind: &str,
        event: &str,
        args: EventArgs,
    ) -> Result<DispatchOutcome, HarnessError> {
        let id = self
            .find_kind(kind)
            .map(|node| node.id)
            .ok_or_else(|| HarnessError::MissingKind(kind.to_owned()))?;
        self.dispatch(id, event, args)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn mirror(&self) -> &MirrorClient {
        &self.mirror
    }

    pub fn commits(&self) -> &[CommitMessage] {
        &self.commits
    }

    pub fn last_commit(&self) -> Option<&CommitMessage> {
        self.commits.last()
    }

    pub fn tree(&self) -> Option<Rc<WidgetNode>> {
        self.session.committed_tree().cloned()
    }

    pub fn find(&self, id: NodeId) -> Option<WidgetNode> {
        self.session
            .committed_tree()
            .and_then(|root| root.find(id))
            .cloned()
    }

    /// First widget of `kind` in pre-order.
    pub fn find_kind(&self, kind: &str) -> Option<WidgetNode> {
        let mut found = None;
        if let Some(root) = self.session.committed_tree() {
            root.walk(&mut |node| {
                if found.is_none() && node.kind == kind {
                    found = Some(node.clone());
                }
            });
        }
        found
    }

    /// Every string-valued `prop` in pre-order.
    pub fn prop_strings(&self, prop: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(root) = self.session.committed_tree() {
            root.walk(&mut |node| {
                if let Some(Value::String(value)) = node.props.get(prop) {
                    out.push(value.clone());
                }
            });
        }
        out
    }

    fn absorb(&mut self, report: &TurnReport) -> Result<(), HarnessError> {
        let Some(commit) = &report.commit else {
            return Ok(());
        };
        self.mirror.apply_commit(commit)?;
        let committed = self.session.committed_tree().map(Rc::as_ref);
        if !self.mirror.matches(committed) {
            return Err(HarnessError::Diverged {
                version: commit.version,
            });
        }
        log::trace!(
            "mirror applied commit {} ({} patches)",
            commit.version,
            commit.patches.len()
        );
        self.commits.push(commit.clone());
        Ok(())
    }
}

/// Convenience helper for tests that only need temporary access to a
/// settled [`TestSession`].
pub fn run_test_session<R>(
    root: impl View,
    f: impl FnOnce(&mut TestSession) -> R,
) -> Result<R, HarnessError> {
    let mut harness = TestSession::new(root);
    harness.settle()?;
    Ok(f(&mut harness))
}
