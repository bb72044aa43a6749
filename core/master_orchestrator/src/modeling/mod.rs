//! Modeling / Monte-Carlo engine: the numeric side of the orchestrator.
//!
//! `router` decides which calculators/simulations a question needs,
//! `monte_carlo` runs the seeded simulations themselves, `scenario` and
//! `stress` build on top of the same engine for goal-achievement search and
//! historical stress testing, and `calculators` holds the closed-form
//! (non-simulated) math the router can reach for instead.

pub mod calculators;
pub mod monte_carlo;
pub mod router;
pub mod scenario;
pub mod stress;

pub use monte_carlo::MonteCarloEngine;
pub use router::{route_modeling_request, ModelingKind};
