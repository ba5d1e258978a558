//! Jotter library
//!
//! Local-first core of a notes and to-do app: an on-device cache, a hosted
//! backend client, and the reconciling store that keeps the two in step.

pub mod app;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod remote;
pub mod services;
pub mod storage;
