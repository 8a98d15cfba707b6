//! Core domain logic for timesheet approvals.
//!
//! This crate contains the pure logic of the approval workflow:
//! - Clock arithmetic: minute-granular durations parsed from `HH:MM`
//! - Budget ledger: per-project consumable-hours accounting
//! - Approval planning: the entry lifecycle state machine and hour splitting
//! - Reconciliation planning: post-completion conversion of non-billable time
//! - Weekly aggregation: per-day rollups with a leave overlay
//!
//! Nothing here performs I/O; persistence and delivery live in `tsa-db`
//! and the notification sink implementations.

pub mod approval;
pub mod clock;
pub mod entry;
pub mod ledger;
pub mod notify;
pub mod reconcile;
pub mod types;
pub mod week;

pub use approval::{
    ApprovalPlan, RejectionPlan, SplitEntry, StateError, can_delete, ensure_reviewable,
    ensure_submittable, plan_approval, plan_rejection,
};
pub use clock::Minutes;
pub use entry::{NewEntry, TimeEntry, Tracking, TrackingInput};
pub use ledger::{BudgetLedger, Reservation};
pub use notify::{
    NotificationSink, NullSink, Recipient, ReviewSummary, SinkError, SummaryAction, SummaryLine,
};
pub use reconcile::{Conversion, ReconcilableEntry, ReconcilePlan, plan_reconciliation};
pub use types::{
    Activity, Actor, BillingType, EntryStatus, LeaveKind, LeaveStatus, ReviewDecision, Role,
    TrackingMode, ValidationError,
};
pub use week::{Availability, DayTotals, LeaveSpan, WeeklyReport, WorkedEntry, weekly_totals};
