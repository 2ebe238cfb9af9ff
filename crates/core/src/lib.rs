pub mod audit;
pub mod clock;
pub mod codes;
pub mod config;
pub mod domain;
pub mod errors;
pub mod validation;
pub mod wizard;

pub use clock::{Clock, FixedClock, SystemClock};
pub use codes::{
    CertificateCode, CodeError, CodeGenerator, RandomCodeGenerator, ScriptedCodeGenerator,
};
pub use domain::certificate::{CertificateRecord, CertificateRequest};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use validation::{missing_required_fields, validate_request, DatePolicy, ValidationError};
pub use wizard::controller::{AdvanceOutcome, SubmitError, SubmitGateway, WizardController};
pub use wizard::engine::{WizardEngine, WizardError};
pub use wizard::preview::CertificatePreview;
pub use wizard::states::{
    LayoutError, SubmissionState, TransitionOutcome, WizardAction, WizardContext, WizardEvent,
    WizardLayout, WizardPhase,
};
