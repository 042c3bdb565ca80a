//! Lock convergence and resolution for keel.
//!
//! A [`definition::Definition`] reconciles the declared dependencies and
//! sources with a previous lockfile, hands the stale part of the graph to a
//! pluggable [`solver::Solver`], and renders the outcome back as lockfile text.

pub mod conflict;
pub mod definition;
pub mod fetch;
pub mod index;
pub mod materialize;
pub mod solver;
pub mod spec_set;
