//! Refusal to plan on top of unapplied migrations.

use tracing::warn;

use crate::error::{GenerationError, Result};
use crate::reflect::MigrationLedger;

/// Checks the ledger before any diffing happens.
#[derive(Debug, Default, Clone, Copy)]
pub struct MigrationGuard;

impl MigrationGuard {
    /// Fails when migrations exist that were never applied, since the live
    /// schema would not reflect them.
    ///
    /// # Errors
    ///
    /// `PendingMigrationsExist` listing the pending identifiers, or `Ledger`
    /// when the ledger cannot be read.
    pub fn check<L: MigrationLedger + ?Sized>(ledger: &L) -> Result<()> {
        let pending = ledger
            .pending_migrations()
            .map_err(GenerationError::ledger)?;
        if pending.is_empty() {
            return Ok(());
        }
        warn!(count = pending.len(), pending = ?pending, "Pending migrations must be applied first");
        Err(GenerationError::PendingMigrationsExist(pending))
    }
}
