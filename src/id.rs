//! Prefixed ID generation for Tillbook entities.
//!
//! All IDs use a `tb_` brand prefix to guarantee collision avoidance with
//! payment provider IDs (`prod_`, `cus_`, `ch_`, etc.). The order number is
//! the opaque correlation token handed to the provider and echoed back by
//! its webhooks.
//!
//! Format: `tb_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["tb_ord_", "tb_cg_", "tb_com_"];

/// Validate that a string is a valid Tillbook prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `tb_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in Tillbook.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    Order,
    CreditGrant,
    Commission,
}

impl EntityType {
    /// Returns the prefix for this entity type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Order => "tb_ord",
            Self::CreditGrant => "tb_cg",
            Self::Commission => "tb_com",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
