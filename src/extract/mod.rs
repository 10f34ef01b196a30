//! Stage data extractors.
//!
//! Each pipeline node emits a state delta with its own, not entirely
//! consistent shape; the extractors normalize those into typed records.
//! All of them are total: a payload without the node's defining field
//! yields `None` ("no data yet"), never an error.

mod coerce;
mod nodes;

pub use coerce::{string_list, tech_stack, TechStack};
pub use nodes::{
    extract_checker, extract_integrator, extract_paster, extract_planner, extract_source,
    extract_target, CheckerData, IntegratorData, PastedFile, PasterData, PlannerData, SourceData,
    TargetData,
};
