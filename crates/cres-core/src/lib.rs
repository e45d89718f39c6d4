//! Relativistic charged-particle tracker core.
//!
//! One evaluator/equation/stepper/driver set is constructed per worker
//! and advances a single track at a time:
//! driver -> stepper -> equation of motion -> field evaluator.

pub mod boris;
pub mod driver;
pub mod equation;
pub mod field;
pub mod field_map;
