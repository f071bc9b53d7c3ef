//! Tillbook - order reconciliation backend for credit-plan purchases
//!
//! This library converts purchase intent into durable, exactly-once-effect
//! order state: checkout session creation with catalog validation, webhook
//! ingestion and verification, order matching, idempotent settlement, and
//! fan-out of downstream effects (credit grant, commission, receipt email).

pub mod catalog;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod models;
pub mod payments;
pub mod reconcile;
pub mod settlement;
