//! `balance-view`: a materialized `wallet_balances` table kept up to date
//! by the view worker (spec.md §4.7, scenario S4). Idempotent under
//! replay via a `last_position` high-water mark per row, rather than
//! relying on the events themselves being naturally idempotent upserts.
use async_trait::async_trait;
use eventline::RawEvent;
use eventline_postgres::views::ViewProjector;
use eventline_postgres::Error;
use sqlx::{PgConnection, PgPool};

pub struct WalletBalanceView;

impl WalletBalanceView {
    /// Creates the view's own table. Run once at startup, independently of
    /// `eventline_postgres::Migrator` -- a view owns its read-model schema,
    /// the framework only owns `events`/`commands`/the progress tables.
    pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS wallet_balances (
                wallet_id TEXT PRIMARY KEY,
                balance BIGINT NOT NULL DEFAULT 0,
                last_position BIGINT NOT NULL DEFAULT 0
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

fn wallet_id_of(event: &RawEvent) -> Option<&str> {
    event.tags.iter().find(|t| t.key() == "wallet_id").map(|t| t.value())
}

#[async_trait]
impl ViewProjector for WalletBalanceView {
    async fn handle_batch(&self, events: &[RawEvent], conn: &mut PgConnection) -> Result<(), Error> {
        for event in events {
            let Some(wallet_id) = wallet_id_of(event) else { continue };

            match event.event_type.as_str() {
                "WalletOpened" => {
                    let balance = event.payload["balance"].as_i64().unwrap_or(0);
                    sqlx::query(
                        "INSERT INTO wallet_balances (wallet_id, balance, last_position)
                         VALUES ($1, $2, $3)
                         ON CONFLICT (wallet_id) DO UPDATE
                            SET balance = EXCLUDED.balance, last_position = EXCLUDED.last_position
                            WHERE wallet_balances.last_position < EXCLUDED.last_position",
                    )
                    .bind(wallet_id)
                    .bind(balance)
                    .bind(event.position)
                    .execute(&mut *conn)
                    .await?;
                }
                "DepositMade" | "WithdrawalMade" => {
                    let amount = event.payload["amount"].as_i64().unwrap_or(0);
                    let delta = if event.event_type == "DepositMade" { amount } else { -amount };
                    sqlx::query(
                        "UPDATE wallet_balances
                            SET balance = balance + $2, last_position = $3
                          WHERE wallet_id = $1 AND last_position < $3",
                    )
                    .bind(wallet_id)
                    .bind(delta)
                    .bind(event.position)
                    .execute(&mut *conn)
                    .await?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}
