pub mod case_ctx;
pub mod case_flow;

pub use case_ctx::CaseCtx;
pub use case_flow::{CaseSession, DiagnosticsState, PhaseState, TreatmentState};
