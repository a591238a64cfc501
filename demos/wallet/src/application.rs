//! Wires the domain's decisions into [`eventline::Command`]/[`eventline::CommandHandler`]
//! and exposes a small facade over [`eventline_postgres::CommandPipeline`].
use std::any::Any;

use async_trait::async_trait;
use chrono::Utc;
use eventline::{
    new_event, AppendCondition, Command, CommandError, CommandHandler, CommandRegistry, CommandResult, Cursor,
    EventStore, Query, QueryItem,
};
use eventline_postgres::{CommandPipeline, DispatchOutcome, PgEventStore, TxEventStore};
use serde::{Deserialize, Serialize};

use crate::domain::{self, Balance, BalanceProjector, Error as DomainError, WalletId};

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenWallet {
    pub wallet_id: WalletId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MakeDeposit {
    pub wallet_id: WalletId,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MakeWithdrawal {
    pub wallet_id: WalletId,
    pub amount: i64,
}

macro_rules! impl_command {
    ($ty:ty, $name:literal) => {
        impl Command for $ty {
            fn command_type(&self) -> &'static str {
                $name
            }

            fn to_json(&self) -> serde_json::Value {
                serde_json::to_value(self).expect("command payload serialization should not fail")
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

impl_command!(OpenWallet, "OpenWallet");
impl_command!(MakeDeposit, "MakeDeposit");
impl_command!(MakeWithdrawal, "MakeWithdrawal");

/// Projects `wallet_id`'s current [`Balance`] and the cursor it was read
/// at, through `store` -- whatever transaction the caller is already in.
async fn read_balance<ES: EventStore>(store: &ES, wallet_id: &str) -> Result<(Balance, Cursor, Query), CommandError> {
    let projector = BalanceProjector::new(wallet_id);
    let result = store
        .project(Balance::default(), &[&projector], Cursor::ZERO)
        .await
        .map_err(CommandError::Store)?;
    Ok((result.state, result.cursor, projector.query()))
}

pub struct OpenWalletHandler;

#[async_trait]
impl CommandHandler<TxEventStore> for OpenWalletHandler {
    type Command = OpenWallet;

    async fn handle(&self, store: &TxEventStore, command: &OpenWallet) -> Result<CommandResult, CommandError> {
        let (state, cursor, query) = read_balance(store, &command.wallet_id).await?;
        let event = domain::decide_open(&command.wallet_id, &state).map_err(CommandError::invalid)?;
        let new_event = new_event(&event, Utc::now()).expect("WalletOpened is a short, fixed type name");

        let idempotency = QueryItem::new()
            .with_types(["WalletOpened"])
            .with_tags(domain::wallet_tags(&command.wallet_id));

        Ok(CommandResult::new(
            vec![new_event],
            AppendCondition::new(query, cursor).with_idempotency(idempotency),
        ))
    }
}

pub struct MakeDepositHandler;

#[async_trait]
impl CommandHandler<TxEventStore> for MakeDepositHandler {
    type Command = MakeDeposit;

    async fn handle(&self, store: &TxEventStore, command: &MakeDeposit) -> Result<CommandResult, CommandError> {
        let (state, cursor, query) = read_balance(store, &command.wallet_id).await?;
        let event =
            domain::decide_deposit(&command.wallet_id, command.amount, &state).map_err(CommandError::invalid)?;
        let new_event = new_event(&event, Utc::now()).expect("DepositMade is a short, fixed type name");
        Ok(CommandResult::new(vec![new_event], AppendCondition::new(query, cursor)))
    }
}

pub struct MakeWithdrawalHandler;

#[async_trait]
impl CommandHandler<TxEventStore> for MakeWithdrawalHandler {
    type Command = MakeWithdrawal;

    async fn handle(&self, store: &TxEventStore, command: &MakeWithdrawal) -> Result<CommandResult, CommandError> {
        let (state, cursor, query) = read_balance(store, &command.wallet_id).await?;
        let event =
            domain::decide_withdraw(&command.wallet_id, command.amount, &state).map_err(CommandError::invalid)?;
        let new_event = new_event(&event, Utc::now()).expect("WithdrawalMade is a short, fixed type name");
        Ok(CommandResult::new(vec![new_event], AppendCondition::new(query, cursor)))
    }
}

/// Builds the registry every `Application` shares: one handler per command
/// type, rejected at startup on a duplicate (spec.md §4.3).
pub fn build_registry() -> CommandRegistry<TxEventStore> {
    let mut registry = CommandRegistry::new();
    registry.register("OpenWallet", OpenWalletHandler).expect("no prior registration");
    registry
        .register("MakeDeposit", MakeDepositHandler)
        .expect("no prior registration");
    registry
        .register("MakeWithdrawal", MakeWithdrawalHandler)
        .expect("no prior registration");
    registry
}

/// A thin facade: typed methods over [`CommandPipeline::dispatch`], plus a
/// read-only balance query that does not go through the command pipeline
/// (spec.md §4.2 `query`/`project`, used directly against the pooled store).
#[derive(Clone)]
pub struct Application {
    pipeline: std::sync::Arc<CommandPipeline>,
    store: PgEventStore,
}

impl Application {
    pub fn new(store: PgEventStore) -> Self {
        let pipeline = CommandPipeline::new(store.clone(), build_registry());
        Self {
            pipeline: std::sync::Arc::new(pipeline),
            store,
        }
    }

    pub async fn open_wallet(&self, wallet_id: impl Into<WalletId>) -> Result<DispatchOutcome, CommandError> {
        self.pipeline.dispatch(&OpenWallet { wallet_id: wallet_id.into() }).await
    }

    pub async fn deposit(&self, wallet_id: impl Into<WalletId>, amount: i64) -> Result<DispatchOutcome, CommandError> {
        self.pipeline
            .dispatch(&MakeDeposit { wallet_id: wallet_id.into(), amount })
            .await
    }

    pub async fn withdraw(
        &self,
        wallet_id: impl Into<WalletId>,
        amount: i64,
    ) -> Result<DispatchOutcome, CommandError> {
        self.pipeline
            .dispatch(&MakeWithdrawal { wallet_id: wallet_id.into(), amount })
            .await
    }

    pub async fn balance_of(&self, wallet_id: &str) -> Result<Balance, eventline::EventStoreError> {
        let projector = BalanceProjector::new(wallet_id);
        let result = self
            .store
            .project(Balance::default(), &[&projector], Cursor::ZERO)
            .await?;
        Ok(result.state)
    }
}

/// Re-exposes the domain error a handler's `InvalidCommand` wraps, so
/// callers that want to pattern-match on it don't have to downcast
/// `Box<dyn Error>` themselves.
pub fn as_domain_error(err: &CommandError) -> Option<&DomainError> {
    match err {
        CommandError::InvalidCommand(inner) => inner.downcast_ref::<DomainError>(),
        _ => None,
    }
}
