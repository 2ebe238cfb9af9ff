use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::wizard::states::{
    TransitionOutcome, WizardAction, WizardContext, WizardEvent, WizardLayout, WizardPhase,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("payment must be initiated before leaving the payment step")]
    PaymentRequired,
    #[error("the wizard is already completed")]
    AlreadyCompleted,
    #[error("event {event:?} is not valid on step {step}")]
    InvalidTransition { step: usize, event: WizardEvent },
}

/// Pure step-transition rules over a [`WizardLayout`]. The engine never
/// touches field values or the network; the controller owns those and
/// interprets the actions this returns.
#[derive(Clone, Copy, Debug, Default)]
pub struct WizardEngine {
    layout: WizardLayout,
}

impl WizardEngine {
    pub fn new(layout: WizardLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> WizardLayout {
        self.layout
    }

    pub fn initial_phase(&self) -> WizardPhase {
        WizardPhase::Step(0)
    }

    pub fn apply(
        &self,
        current: WizardPhase,
        event: WizardEvent,
        context: &WizardContext,
    ) -> Result<TransitionOutcome, WizardError> {
        transition(self.layout, current, event, context)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: WizardPhase,
        event: WizardEvent,
        context: &WizardContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, WizardError>
    where
        S: AuditSink,
    {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "wizard.transition_applied",
                        AuditCategory::Wizard,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "wizard.transition_rejected",
                        AuditCategory::Wizard,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

fn transition(
    layout: WizardLayout,
    current: WizardPhase,
    event: WizardEvent,
    context: &WizardContext,
) -> Result<TransitionOutcome, WizardError> {
    use WizardAction::{BeginSubmission, OpenPaymentWindow};
    use WizardEvent::{Advance, PaymentInitiated, Retreat};

    let WizardPhase::Step(step) = current else {
        return Err(WizardError::AlreadyCompleted);
    };
    debug_assert!(step < layout.step_count());

    let (to, actions) = match event {
        Advance if step == layout.payment_step() && !context.payment_acknowledged => {
            return Err(WizardError::PaymentRequired);
        }
        // Leaving the submit step means running the submission protocol;
        // the phase only moves once the controller reports success.
        Advance if step == layout.submit_step() => {
            if !context.payment_acknowledged {
                return Err(WizardError::PaymentRequired);
            }
            (WizardPhase::Step(step), vec![BeginSubmission])
        }
        Advance => (WizardPhase::Step(step + 1), Vec::new()),
        Retreat => (WizardPhase::Step(step.saturating_sub(1)), Vec::new()),
        PaymentInitiated if step == layout.payment_step() => {
            (WizardPhase::Step(step), vec![OpenPaymentWindow])
        }
        PaymentInitiated => {
            return Err(WizardError::InvalidTransition { step, event });
        }
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}
