//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate record store calls into ordering operations.
//! - Keep CLI callers decoupled from storage details.

pub mod order_service;
