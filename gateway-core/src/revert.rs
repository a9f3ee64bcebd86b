//! Revert / compensation
//!
//! Undoes the furthest ledger action taken for a session, once per ledger.
//! Compensating calls go through the same adapters as forward actions and
//! are never retried.

use crate::{gateway::Gateway, session::SessionData, Error, Result};
use odap_protocol::TransferState;
use tracing::{debug, error, info, warn};

impl Gateway {
    /// Revert a session.
    ///
    /// A no-op for an unknown or terminal session. Otherwise each registered
    /// ledger with a recorded action gets one compensating call, and the
    /// session moves to `Reverted` once every ledger is compensated.
    ///
    /// A compensation failure is returned even if saving the session fails
    /// afterwards; the save error surfaces only when compensation succeeded.
    pub async fn revert(&self, session_id: &str) -> Result<()> {
        let Some(handle) = self.sessions.open(session_id).await else {
            debug!("Revert of unknown session {} ignored", session_id);
            return Ok(());
        };

        let mut session = handle.lock().await;
        let compensated = self.compensate(&mut session).await;
        match (compensated, self.sessions.save(&session).await) {
            (Err(e), Err(save)) => {
                warn!("Session {}: save after revert failed: {}", session.id, save);
                Err(e)
            }
            (compensated, Ok(())) => compensated,
            (Ok(()), Err(save)) => Err(save),
        }
    }

    /// Revert a session whose phase failed with `cause`, and return the
    /// error to surface to the caller
    pub(crate) async fn unwind(&self, session: &mut SessionData, cause: Error) -> Error {
        warn!("Session {}: {}; reverting", session.id, cause);
        let reverted = self.compensate(session).await;
        if let Err(e) = self.sessions.save(session).await {
            warn!("Session {}: save after revert failed: {}", session.id, e);
        }

        match reverted {
            Ok(()) => cause,
            Err(compensation) => Error::CompensationFailed {
                cause: Box::new(cause),
                compensation: Box::new(compensation),
            },
        }
    }

    pub(crate) async fn compensate(&self, session: &mut SessionData) -> Result<()> {
        if session.state().is_terminal() {
            debug!(
                "Session {} already {:?}, nothing to revert",
                session.id,
                session.state()
            );
            return Ok(());
        }

        let mut failure = None;
        for dlt in self.adapters.registered_dlts().await {
            let Some(action) = session
                .ledger_actions
                .get(&dlt)
                .and_then(|actions| actions.compensation())
            else {
                continue;
            };

            let label = action.operation().to_string();
            match self.adapters.invoke(&dlt, &action).await {
                Ok(invocation) => {
                    self.metrics.record_ledger_action(&dlt, &label, true);
                    self.metrics
                        .record_ledger_duration(&dlt, &label, invocation.duration);

                    if let Some(actions) = session.ledger_actions.get_mut(&dlt) {
                        actions.clear();
                    }
                    session
                        .rollback_actions_performed
                        .push(format!("{} {} on {}", label, action.asset_id(), dlt));
                    session.rollback_proofs.push(invocation.receipt);
                    info!(
                        "Session {}: compensated with {} {} on {}",
                        session.id,
                        label,
                        action.asset_id(),
                        dlt
                    );
                }
                Err(source) => {
                    self.metrics.record_ledger_action(&dlt, &label, false);
                    error!(
                        "Session {}: compensation {} {} on {} failed: {}",
                        session.id,
                        label,
                        action.asset_id(),
                        dlt,
                        source
                    );
                    if failure.is_none() {
                        failure = Some(Error::Compensation {
                            session_id: session.id.clone(),
                            dlt,
                            source,
                        });
                    }
                }
            }
        }

        match failure {
            None => {
                session.state.transition(TransferState::Reverted)?;
                self.metrics.record_revert(true);
                info!("Session {} reverted", session.id);
                Ok(())
            }
            Some(err) => {
                self.metrics.record_revert(false);
                warn!("Session {} left {:?} after failed revert", session.id, session.state());
                Err(err)
            }
        }
    }
}
