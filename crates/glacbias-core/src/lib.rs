//! Core data model and per-glacier climate accounting for GCM bias adjustment.
//!
//! Future-climate projections carry their own temperature and precipitation
//! biases relative to the reference climate a glacier model was calibrated
//! against. Left uncorrected, those biases masquerade as simulated glacier
//! change. This crate provides the building blocks used to solve for a
//! per-glacier bias-adjustment pair (an additive temperature offset and a
//! multiplicative precipitation factor):
//!
//! - the glacier and climate data model ([`glacier`], [`climate`], [`params`]),
//! - elevation-bin downscaling of centroid climate ([`downscale`]),
//! - static surface typing and degree-day melt accounting ([`surface`], [`melt`]),
//! - the mass-balance engine interface the optimizer evaluates ([`massbalance`]).
//!
//! The full glacier simulator (refreezing, surface-type evolution, geometry
//! redistribution) is an external collaborator behind the
//! [`massbalance::MassBalanceModel`] trait.

pub mod climate;
pub mod config;
pub mod downscale;
pub mod glacier;
pub mod massbalance;
pub mod melt;
pub mod params;
pub mod surface;

mod errors;

pub use errors::{CoreError, CoreResult};
