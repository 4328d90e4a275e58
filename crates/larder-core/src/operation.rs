//! The per-operation state machine driven by the consistency enforcer.
//!
//! `Pending -> Validated -> Applied -> Committed`, with `Aborted` reachable
//! from every non-terminal phase. Backends advance an [`Operation`] as they
//! go; the phase it dies in is what the logs report.

use serde::Serialize;
use strum::{AsRefStr, Display};

use crate::{Error, Result, id::TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
  Receive,
  Consume,
  Adjust,
  Transfer,
  Block,
  Unblock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Pending,
  Validated,
  Applied,
  Committed,
  Aborted,
}

impl Phase {
  pub fn is_terminal(self) -> bool { matches!(self, Self::Committed | Self::Aborted) }

  pub fn can_advance_to(self, next: Phase) -> bool {
    matches!(
      (self, next),
      (Self::Pending, Self::Validated)
        | (Self::Validated, Self::Applied)
        | (Self::Applied, Self::Committed)
    ) || (next == Self::Aborted && !self.is_terminal())
  }
}

#[derive(Debug)]
pub struct Operation {
  kind:   OperationKind,
  tenant: TenantId,
  phase:  Phase,
}

impl Operation {
  pub fn begin(kind: OperationKind, tenant: TenantId) -> Self {
    Self { kind, tenant, phase: Phase::Pending }
  }

  pub fn kind(&self) -> OperationKind { self.kind }

  pub fn phase(&self) -> Phase { self.phase }

  pub fn advance(&mut self, next: Phase) -> Result<()> {
    if !self.phase.can_advance_to(next) {
      return Err(Error::IllegalTransition { from: self.phase, to: next });
    }
    tracing::debug!(
      operation = %self.kind,
      tenant = %self.tenant,
      from = ?self.phase,
      to = ?next,
      "operation phase"
    );
    self.phase = next;
    Ok(())
  }

  /// Move to `Aborted`, recording the phase the failure interrupted.
  pub fn abort(&mut self, cause: &dyn std::error::Error) {
    if self.phase.is_terminal() {
      return;
    }
    tracing::warn!(
      operation = %self.kind,
      tenant = %self.tenant,
      phase = ?self.phase,
      error = %cause,
      "operation aborted"
    );
    self.phase = Phase::Aborted;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn happy_path_reaches_committed() {
    let mut op = Operation::begin(OperationKind::Consume, TenantId::new());
    op.advance(Phase::Validated).unwrap();
    op.advance(Phase::Applied).unwrap();
    op.advance(Phase::Committed).unwrap();
    assert_eq!(op.phase(), Phase::Committed);
  }

  #[test]
  fn phases_cannot_be_skipped() {
    let mut op = Operation::begin(OperationKind::Receive, TenantId::new());
    assert!(matches!(
      op.advance(Phase::Applied),
      Err(Error::IllegalTransition { from: Phase::Pending, to: Phase::Applied })
    ));
  }

  #[test]
  fn abort_is_terminal() {
    let mut op = Operation::begin(OperationKind::Adjust, TenantId::new());
    op.advance(Phase::Validated).unwrap();
    op.abort(&Error::LockTimeout);
    assert_eq!(op.phase(), Phase::Aborted);
    assert!(op.advance(Phase::Applied).is_err());

    // A second abort is a no-op rather than a transition out of a terminal.
    op.abort(&Error::LockTimeout);
    assert_eq!(op.phase(), Phase::Aborted);
  }

  #[test]
  fn committed_cannot_abort() {
    assert!(!Phase::Committed.can_advance_to(Phase::Aborted));
    assert!(Phase::Applied.can_advance_to(Phase::Aborted));
  }
}
