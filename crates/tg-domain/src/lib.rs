//! # tg-domain
//!
//! The values that travel along timelines.
//!
//! - [`Domain`] — a constraint over one attribute: integer or float interval
//!   (bounds may be infinite), boolean, or a set of symbols
//! - [`Node`] — the declarative attribute/value tree used to describe
//!   reactors, goals and observations
//! - [`Goal`] / [`Observation`] — predicates posted on a named timeline
//! - [`DomainFactory`] — the table of tag → [`DomainProducer`] used to turn
//!   description nodes (including `date` and `duration`) into domains
//! - [`exchange`] — goal/observation import and export in the [`Node`] format

pub mod domain;
pub mod error;
pub mod exchange;
pub mod factory;
pub mod node;
pub mod predicate;

pub use domain::{Bound, Domain, Interval};
pub use error::DomainError;
pub use exchange::{
    date_export, domain_export, duration_export, export_goal, export_observation, parse_goal,
    parse_observation,
};
pub use factory::{DomainFactory, DomainProducer};
pub use node::Node;
pub use predicate::{Goal, Observation, Predicate};
