//! Restore side of the fragment protocol: classify each decoded scan, then
//! fold it into a session until every fragment is present.

pub mod classify;
pub mod session;

pub use classify::{check_hint, classify, AuxiliaryTargets, ClassifyError, ScanItem, ScanKind, TargetError};
pub use session::SessionState;
