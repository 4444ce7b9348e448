pub mod ai;
pub mod eligibility;
pub mod estimate;
pub mod lifecycle;
pub mod transitions;
