//! Quotagate - Composable Rate Limiting
//!
//! This crate gates concurrent callers against several independent token
//! bucket quotas at once. Limiters compose into aggregates whose throughput
//! equals their most restrictive member, and a resource gate binds named
//! operations to aggregates built from shared quota categories.

pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod ratelimit;
