//! Service layer containing business logic.
//!
//! Services orchestrate the repository and the token codec; handlers
//! call services and translate results into HTTP responses. All
//! reviewer-facing operations are gated here to the meeting owner or an
//! admin and fail `Forbidden` before any mutation.
//!
//! # Components
//!
//! - **Meeting Lifecycle** - create/start/end/cancel/postpone, token issuance
//! - **Submission Ledger** - token redemption and checkout
//! - **Approval Workflow** - approve, reject, bulk reconcile, modify, remove

pub mod approval;
pub mod ledger;
pub mod lifecycle;

pub use approval::ApprovalService;
pub use ledger::RedemptionService;
pub use lifecycle::MeetingLifecycleService;
