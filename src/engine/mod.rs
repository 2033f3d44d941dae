//! # Engine Module
//!
//! Core building blocks of the hierarchical component store:
//! - identifiers and the packed branch layout,
//! - identity records and sort keys,
//! - sorted per-type component stores,
//! - the context, which owns the stores and maintains the hierarchy,
//! - traversal views and joins,
//! - passes, systems and schedules.
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod info;
pub mod entity;
pub mod storage;
pub mod component;
pub mod config;
pub mod commands;
pub mod context;
pub mod query;
pub mod borrow;
pub mod systems;
pub mod scheduler;
