use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codes::CertificateCode;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid wizard layout: {0}")]
pub struct LayoutError(String);

/// Where the wizard currently is: one visible step, or the terminal
/// confirmation state after a successful submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardPhase {
    Step(usize),
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardEvent {
    Advance,
    Retreat,
    PaymentInitiated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardAction {
    OpenPaymentWindow,
    BeginSubmission,
}

/// Submission lifecycle for one wizard session. At most one transition into
/// `Submitting` is in flight at a time; once `Submitted`, the code is cached
/// and no further network call is issued for this session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionState {
    NotSubmitted,
    Submitting,
    Submitted(CertificateCode),
    Failed(String),
}

impl SubmissionState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Submitting)
    }

    pub fn certificate(&self) -> Option<&CertificateCode> {
        match self {
            Self::Submitted(code) => Some(code),
            _ => None,
        }
    }
}

/// Read-only view of the session facts a transition may depend on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardContext {
    pub payment_acknowledged: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: WizardPhase,
    pub to: WizardPhase,
    pub event: WizardEvent,
    pub actions: Vec<WizardAction>,
}

/// Shape of the step sequence. The submit step is always the last step;
/// the payment step sits strictly before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardLayout {
    step_count: usize,
    payment_step: usize,
}

impl WizardLayout {
    pub fn new(step_count: usize, payment_step: usize) -> Result<Self, LayoutError> {
        if step_count < 2 {
            return Err(LayoutError(format!("step_count must be at least 2, got {step_count}")));
        }
        if payment_step + 1 >= step_count {
            return Err(LayoutError(format!(
                "payment_step {payment_step} must precede the submit step {}",
                step_count - 1
            )));
        }
        Ok(Self { step_count, payment_step })
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn payment_step(&self) -> usize {
        self.payment_step
    }

    pub fn submit_step(&self) -> usize {
        self.step_count - 1
    }
}

impl Default for WizardLayout {
    /// The six intake sections: certificate type, leave details, personal
    /// details, dates and symptoms, payment, review and submit.
    fn default() -> Self {
        Self { step_count: 6, payment_step: 4 }
    }
}

#[cfg(test)]
mod tests {
    use super::{SubmissionState, WizardLayout};
    use crate::codes::CertificateCode;

    #[test]
    fn layout_rejects_payment_at_or_after_submit() {
        assert!(WizardLayout::new(6, 5).is_err());
        assert!(WizardLayout::new(6, 6).is_err());
        assert!(WizardLayout::new(1, 0).is_err());

        let layout = WizardLayout::new(6, 4).expect("default shape is valid");
        assert_eq!(layout.submit_step(), 5);
    }

    #[test]
    fn submission_state_exposes_cached_certificate() {
        let code = CertificateCode::parse("MEDC123456").expect("valid code");
        let state = SubmissionState::Submitted(code.clone());

        assert_eq!(state.certificate(), Some(&code));
        assert!(!state.is_in_flight());
        assert!(SubmissionState::Submitting.is_in_flight());
        assert_eq!(SubmissionState::NotSubmitted.certificate(), None);
    }
}
