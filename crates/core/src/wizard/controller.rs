use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::codes::CertificateCode;
use crate::domain::certificate::CertificateRequest;
use crate::validation::{validate_request, DatePolicy};
use crate::wizard::engine::{WizardEngine, WizardError};
use crate::wizard::preview::{self, CertificatePreview};
use crate::wizard::states::{
    SubmissionState, WizardAction, WizardContext, WizardEvent, WizardPhase,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("submission rejected: {0}")]
    Rejected(String),
}

/// The wizard's only network seam: one call that submits the payload and
/// returns the assigned certificate code.
#[async_trait]
pub trait SubmitGateway: Send + Sync {
    async fn submit(&self, request: &CertificateRequest) -> Result<CertificateCode, SubmitError>;
}

/// What an `advance` at the submit step resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    MovedTo(usize),
    SubmissionAccepted(CertificateCode),
    /// A submission is already in flight; this trigger was ignored.
    SubmissionIgnored,
    SubmissionFailed(String),
}

/// Single source of truth for one intake session: which step is visible,
/// whether it is safe to submit, and the current field values. Owns the
/// at-most-once submission guarantee.
pub struct WizardController<G, C = SystemClock> {
    engine: WizardEngine,
    gateway: G,
    clock: C,
    policy: DatePolicy,
    payment_url: String,
    phase: WizardPhase,
    payment_acknowledged: bool,
    submission: SubmissionState,
    fields: BTreeMap<String, String>,
}

impl<G> WizardController<G, SystemClock>
where
    G: SubmitGateway,
{
    pub fn new(engine: WizardEngine, gateway: G, payment_url: impl Into<String>) -> Self {
        Self::with_clock(engine, gateway, payment_url, SystemClock)
    }
}

impl<G, C> WizardController<G, C>
where
    G: SubmitGateway,
    C: Clock,
{
    pub fn with_clock(
        engine: WizardEngine,
        gateway: G,
        payment_url: impl Into<String>,
        clock: C,
    ) -> Self {
        let phase = engine.initial_phase();
        Self {
            engine,
            gateway,
            clock,
            policy: DatePolicy::default(),
            payment_url: payment_url.into(),
            phase,
            payment_acknowledged: false,
            submission: SubmissionState::NotSubmitted,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: DatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn layout(&self) -> crate::wizard::states::WizardLayout {
        self.engine.layout()
    }

    pub fn phase(&self) -> WizardPhase {
        self.phase
    }

    pub fn step_index(&self) -> Option<usize> {
        match self.phase {
            WizardPhase::Step(step) => Some(step),
            WizardPhase::Completed => None,
        }
    }

    pub fn payment_acknowledged(&self) -> bool {
        self.payment_acknowledged
    }

    pub fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    /// Read-only summary recomputed from current field values; placeholder
    /// text stands in for anything unset.
    pub fn preview(&self) -> CertificatePreview {
        preview::render(&self.fields)
    }

    /// Marks the payment gate satisfied and hands back the external payment
    /// destination to open. The gate is optimistic: actual payment happens
    /// in a context the controller cannot observe.
    pub fn initiate_payment(&mut self) -> Result<&str, WizardError> {
        let outcome =
            self.engine.apply(self.phase, WizardEvent::PaymentInitiated, &self.context())?;
        debug_assert!(outcome.actions.contains(&WizardAction::OpenPaymentWindow));
        self.payment_acknowledged = true;
        Ok(&self.payment_url)
    }

    pub fn retreat(&mut self) -> Result<usize, WizardError> {
        let outcome = self.engine.apply(self.phase, WizardEvent::Retreat, &self.context())?;
        self.phase = outcome.to;
        match self.phase {
            WizardPhase::Step(step) => Ok(step),
            WizardPhase::Completed => Err(WizardError::AlreadyCompleted),
        }
    }

    /// Moves to the next step; at the submit step this runs the submission
    /// protocol instead. Gate violations surface as errors and leave the
    /// state untouched.
    pub async fn advance(&mut self) -> Result<AdvanceOutcome, WizardError> {
        let outcome = self.engine.apply(self.phase, WizardEvent::Advance, &self.context())?;
        if outcome.actions.contains(&WizardAction::BeginSubmission) {
            return Ok(self.run_submission().await);
        }

        self.phase = outcome.to;
        match self.phase {
            WizardPhase::Step(step) => Ok(AdvanceOutcome::MovedTo(step)),
            WizardPhase::Completed => Err(WizardError::AlreadyCompleted),
        }
    }

    async fn run_submission(&mut self) -> AdvanceOutcome {
        match &self.submission {
            SubmissionState::Submitting => return AdvanceOutcome::SubmissionIgnored,
            SubmissionState::Submitted(code) => {
                return AdvanceOutcome::SubmissionAccepted(code.clone());
            }
            SubmissionState::NotSubmitted | SubmissionState::Failed(_) => {}
        }

        // Snapshot taken synchronously at trigger time; later field edits
        // cannot leak into an in-flight submission.
        let request = self.build_request();
        if let Err(error) = validate_request(&request, self.policy, self.clock.today()) {
            let reason = error.to_string();
            self.submission = SubmissionState::Failed(reason.clone());
            return AdvanceOutcome::SubmissionFailed(reason);
        }

        self.submission = SubmissionState::Submitting;
        match self.gateway.submit(&request).await {
            Ok(code) => {
                self.submission = SubmissionState::Submitted(code.clone());
                self.phase = WizardPhase::Completed;
                AdvanceOutcome::SubmissionAccepted(code)
            }
            Err(error) => {
                let reason = error.to_string();
                self.submission = SubmissionState::Failed(reason.clone());
                AdvanceOutcome::SubmissionFailed(reason)
            }
        }
    }

    fn build_request(&self) -> CertificateRequest {
        CertificateRequest {
            cert_type: self.field("certType").to_string(),
            leave_from: self.field("leaveFrom").to_string(),
            other_leave: self.field("otherLeave").to_string(),
            reason: self.field("reason").to_string(),
            email: self.field("email").to_string(),
            first_name: self.field("firstName").to_string(),
            last_name: self.field("lastName").to_string(),
            dob: self.field("dob").to_string(),
            mobile: self.field("mobile").to_string(),
            gender: self.field("gender").to_string(),
            address: self.field("address").to_string(),
            city: self.field("city").to_string(),
            state: self.field("state").to_string(),
            postcode: self.field("postcode").to_string(),
            from_date: self.field("fromDate").to_string(),
            to_date: self.field("toDate").to_string(),
            symptoms: self.field("symptoms").to_string(),
            doctor_note: self.field("doctorNote").to_string(),
        }
    }

    fn context(&self) -> WizardContext {
        WizardContext { payment_acknowledged: self.payment_acknowledged }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::{AdvanceOutcome, SubmitError, SubmitGateway, WizardController};
    use crate::clock::FixedClock;
    use crate::codes::CertificateCode;
    use crate::domain::certificate::CertificateRequest;
    use crate::wizard::engine::{WizardEngine, WizardError};
    use crate::wizard::states::{SubmissionState, WizardPhase};

    #[derive(Default)]
    struct CountingGateway {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SubmitGateway for CountingGateway {
        async fn submit(
            &self,
            _request: &CertificateRequest,
        ) -> Result<CertificateCode, SubmitError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CertificateCode::parse("MEDC123456").expect("valid code"))
        }
    }

    struct FlakyGateway {
        calls: Arc<AtomicUsize>,
        fail_first: usize,
    }

    #[async_trait]
    impl SubmitGateway for FlakyGateway {
        async fn submit(
            &self,
            _request: &CertificateRequest,
        ) -> Result<CertificateCode, SubmitError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(SubmitError::Transport("connection refused".to_string()))
            } else {
                Ok(CertificateCode::parse("MEDC654321").expect("valid code"))
            }
        }
    }

    fn test_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).single().expect("valid instant"))
    }

    fn controller_with<G: SubmitGateway>(gateway: G) -> WizardController<G, FixedClock> {
        WizardController::with_clock(
            WizardEngine::default(),
            gateway,
            "https://pay.example/checkout",
            test_clock(),
        )
    }

    fn fill_required(controller: &mut WizardController<impl SubmitGateway, FixedClock>) {
        controller.set_field("email", "a@b.com");
        controller.set_field("firstName", "Ann");
        controller.set_field("lastName", "Lee");
        controller.set_field("fromDate", "2025-01-10");
        controller.set_field("toDate", "2025-01-12");
    }

    async fn drive_to_submit_step(
        controller: &mut WizardController<impl SubmitGateway, FixedClock>,
    ) {
        while controller.step_index() != Some(controller.layout().submit_step()) {
            if controller.step_index() == Some(controller.layout().payment_step()) {
                controller.initiate_payment().expect("payment initiation on payment step");
            }
            controller.advance().await.expect("advance toward the submit step");
        }
    }

    #[tokio::test]
    async fn happy_path_submits_once_and_completes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut controller = controller_with(CountingGateway { calls: calls.clone() });
        fill_required(&mut controller);
        drive_to_submit_step(&mut controller).await;

        let outcome = controller.advance().await.expect("submit advance");
        let AdvanceOutcome::SubmissionAccepted(code) = outcome else {
            panic!("expected an accepted submission, got {outcome:?}");
        };
        assert_eq!(code.as_str(), "MEDC123456");
        assert_eq!(controller.phase(), WizardPhase::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_submit_triggers_issue_one_network_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut controller = controller_with(CountingGateway { calls: calls.clone() });
        fill_required(&mut controller);
        drive_to_submit_step(&mut controller).await;

        let first = controller.advance().await.expect("first submit");
        let AdvanceOutcome::SubmissionAccepted(code) = first else {
            panic!("first submit should be accepted");
        };

        // The wizard is completed now; further advances are rejected
        // outright and the cached code stays available without another call.
        let error = controller.advance().await.expect_err("completed wizard rejects advance");
        assert_eq!(error, WizardError::AlreadyCompleted);
        assert_eq!(controller.submission().certificate(), Some(&code));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submit_without_payment_is_refused() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut controller = controller_with(CountingGateway { calls: calls.clone() });
        fill_required(&mut controller);

        // Walk forward without ever initiating payment.
        for _ in 0..controller.layout().payment_step() {
            controller.advance().await.expect("advance before the payment step");
        }
        let error = controller.advance().await.expect_err("payment gate must hold");
        assert_eq!(error, WizardError::PaymentRequired);
        assert_eq!(controller.step_index(), Some(controller.layout().payment_step()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_required_fields_fail_locally_without_a_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut controller = controller_with(CountingGateway { calls: calls.clone() });
        drive_to_submit_step(&mut controller).await;

        let outcome = controller.advance().await.expect("submit advance");
        let AdvanceOutcome::SubmissionFailed(reason) = outcome else {
            panic!("expected a local validation failure, got {outcome:?}");
        };
        assert!(reason.contains("missing required fields"), "unexpected reason: {reason}");
        assert_eq!(controller.step_index(), Some(controller.layout().submit_step()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn out_of_policy_dates_fail_locally() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut controller = controller_with(CountingGateway { calls: calls.clone() });
        fill_required(&mut controller);
        controller.set_field("fromDate", "2024-12-01");
        controller.set_field("toDate", "2024-12-02");
        drive_to_submit_step(&mut controller).await;

        let outcome = controller.advance().await.expect("submit advance");
        assert!(matches!(outcome, AdvanceOutcome::SubmissionFailed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_submission_allows_manual_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut controller =
            controller_with(FlakyGateway { calls: calls.clone(), fail_first: 1 });
        fill_required(&mut controller);
        drive_to_submit_step(&mut controller).await;

        let first = controller.advance().await.expect("first submit");
        assert!(matches!(first, AdvanceOutcome::SubmissionFailed(_)));
        assert!(matches!(controller.submission(), SubmissionState::Failed(_)));
        assert_eq!(controller.step_index(), Some(controller.layout().submit_step()));

        let second = controller.advance().await.expect("manual retry");
        let AdvanceOutcome::SubmissionAccepted(code) = second else {
            panic!("retry should succeed, got {second:?}");
        };
        assert_eq!(code.as_str(), "MEDC654321");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retreat_keeps_payment_acknowledgment_and_fields() {
        let mut controller = controller_with(CountingGateway::default());
        fill_required(&mut controller);
        drive_to_submit_step(&mut controller).await;

        controller.retreat().expect("retreat from the submit step");
        controller.retreat().expect("retreat again");
        assert!(controller.payment_acknowledged());
        assert_eq!(controller.field("firstName"), "Ann");
    }

    #[tokio::test]
    async fn payment_initiation_only_works_on_the_payment_step() {
        let mut controller = controller_with(CountingGateway::default());

        let error = controller.initiate_payment().expect_err("not on the payment step yet");
        assert!(matches!(error, WizardError::InvalidTransition { .. }));

        for _ in 0..controller.layout().payment_step() {
            controller.advance().await.expect("advance");
        }
        let url = controller.initiate_payment().expect("payment step reached").to_string();
        assert_eq!(url, "https://pay.example/checkout");
        assert!(controller.payment_acknowledged());
        assert_eq!(controller.step_index(), Some(controller.layout().payment_step()));
    }

    #[tokio::test]
    async fn preview_reflects_fields_and_placeholders() {
        let mut controller = controller_with(CountingGateway::default());

        let empty = controller.preview();
        assert_eq!(empty.full_name, "First Name Last Name");
        assert_eq!(empty.from_date, "-");

        controller.set_field("certType", "Sick Leave");
        controller.set_field("firstName", "Ann");
        controller.set_field("fromDate", "2025-01-10");

        let preview = controller.preview();
        assert_eq!(preview.cert_type, "Sick Leave");
        assert_eq!(preview.full_name, "Ann Last Name");
        assert_eq!(preview.from_date, "2025-01-10");
        assert_eq!(preview.to_date, "-");

        // Previewing never disturbs the flow.
        assert_eq!(controller.step_index(), Some(0));
        assert_eq!(*controller.submission(), SubmissionState::NotSubmitted);
    }
}
