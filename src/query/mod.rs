//! Query planning: from a geographic request to a level, a pixel overlap and
//! the tiles that cover it.

mod planner;

pub use planner::{QueryPlan, QueryPlanner};
