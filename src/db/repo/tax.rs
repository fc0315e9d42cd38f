//! Tax-state read/write for the repository.

use crate::domain::{TaxState, UserId};
use tracing::info;

use super::Repository;

impl Repository {
    /// Current tax balances for a user, zeroed when none were stored
    /// yet. First use starts from a clean slate; the rate and
    /// allowance get seeded through `store_tax_state`.
    pub async fn get_tax_state(&self, user: &UserId) -> Result<TaxState, sqlx::Error> {
        let row = sqlx::query(
            "SELECT loss_carryforward, tax_allowance, tax_rate FROM tax_states WHERE user_id = ?",
        )
        .bind(user.as_str())
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => super::tax_state_from_row(&row),
            None => Ok(TaxState::zeroed()),
        }
    }

    /// Overwrite a user's tax balances.
    pub async fn store_tax_state(
        &self,
        user: &UserId,
        state: &TaxState,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO tax_states (user_id, loss_carryforward, tax_allowance, tax_rate)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                loss_carryforward = excluded.loss_carryforward,
                tax_allowance = excluded.tax_allowance,
                tax_rate = excluded.tax_rate
            "#,
        )
        .bind(user.as_str())
        .bind(state.loss_carryforward.to_canonical_string())
        .bind(state.tax_allowance.to_canonical_string())
        .bind(state.tax_rate.to_canonical_string())
        .execute(self.pool())
        .await?;

        info!(
            user = %user,
            loss_carryforward = %state.loss_carryforward,
            tax_allowance = %state.tax_allowance,
            tax_rate = %state.tax_rate,
            "Tax state stored"
        );
        Ok(())
    }
}
