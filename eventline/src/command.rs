//! The command pipeline's storage-agnostic pieces (spec.md §4.3).
//!
//! Dispatch itself — running a handler inside a transaction and storing the
//! command record alongside the events it produced — is Postgres-specific
//! (atomicity requires the transaction scoping only the store can provide)
//! and lives in `eventline-postgres::CommandPipeline`. This module holds the
//! handler registry: type-erased lookup from a command's runtime `type`
//! string to the statically-typed handler registered for it.
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{CommandError, DuplicateRegistration};
use crate::event::NewEvent;
use crate::event_store::EventStore;
use crate::query::AppendCondition;

/// A command carries a runtime type tag (used for handler lookup and for
/// the stored command record) and its own JSON representation.
pub trait Command: Send + Sync {
    /// The command's type name, matched against handler registrations.
    fn command_type(&self) -> &'static str;

    /// The command's data, stored in the `commands` table.
    fn to_json(&self) -> serde_json::Value;

    /// Caller-supplied context stored alongside the command (e.g. a
    /// correlation id or the actor who issued it) -- `None` by default,
    /// since most commands carry none.
    fn metadata(&self) -> Option<serde_json::Value> {
        None
    }

    /// Exposes the concrete type so the registry can downcast back to
    /// whatever the matching handler expects. Every implementor writes
    /// this the same way: `fn as_any(&self) -> &dyn Any { self }`.
    fn as_any(&self) -> &dyn Any;
}

/// The events and append condition produced by a command handler.
pub struct CommandResult {
    pub events: Vec<NewEvent>,
    pub condition: AppendCondition,
}

impl CommandResult {
    pub fn new(events: Vec<NewEvent>, condition: AppendCondition) -> Self {
        Self { events, condition }
    }
}

/// A pure function `(store, command) -> CommandResult`, reading state
/// through `store` inside whatever transaction the caller is already
/// running in.
#[async_trait]
pub trait CommandHandler<ES: EventStore>: Send + Sync {
    type Command: Command + 'static;

    async fn handle(
        &self,
        store: &ES,
        command: &Self::Command,
    ) -> Result<CommandResult, CommandError>;
}

type ErasedHandler<ES> = Box<
    dyn for<'a> Fn(
            &'a ES,
            &'a dyn Any,
        ) -> Pin<Box<dyn Future<Output = Result<CommandResult, CommandError>> + Send + 'a>>
        + Send
        + Sync,
>;

/// Maps command type names to their unique registered handler.
///
/// Registration happens once at startup; a duplicate type name is rejected
/// rather than silently shadowing the first registration (spec.md §4.3
/// "duplicate registrations for the same type fail startup").
pub struct CommandRegistry<ES: EventStore> {
    handlers: HashMap<&'static str, ErasedHandler<ES>>,
}

impl<ES: EventStore + 'static> Default for CommandRegistry<ES> {
    fn default() -> Self {
        Self::new()
    }
}

impl<ES: EventStore + 'static> CommandRegistry<ES> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `command_type`. Fails if a handler is
    /// already registered for that type.
    pub fn register<C, H>(
        &mut self,
        command_type: &'static str,
        handler: H,
    ) -> Result<&mut Self, DuplicateRegistration>
    where
        C: Command + 'static,
        H: CommandHandler<ES, Command = C> + 'static,
    {
        if self.handlers.contains_key(command_type) {
            return Err(DuplicateRegistration(command_type.to_string()));
        }
        let handler = Arc::new(handler);
        self.handlers.insert(
            command_type,
            Box::new(move |store: &ES, command: &dyn Any| {
                let handler = Arc::clone(&handler);
                let command = command
                    .downcast_ref::<C>()
                    .expect("command type mismatch: registry lookup key did not match payload type");
                Box::pin(async move { handler.handle(store, command).await })
                    as Pin<Box<dyn Future<Output = Result<CommandResult, CommandError>> + Send>>
            }),
        );
        Ok(self)
    }

    /// Routes `command` to its registered handler and runs it against
    /// `store`.
    pub async fn dispatch(
        &self,
        store: &ES,
        command: &dyn Command,
    ) -> Result<CommandResult, CommandError> {
        let handler = self
            .handlers
            .get(command.command_type())
            .ok_or_else(|| CommandError::UnknownCommandType(command.command_type().to_string()))?;
        handler(store, command.as_any()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::append::AppendOutcome;
    use crate::query::Query;
    use crate::Cursor;
    use async_trait::async_trait;

    struct NullStore;

    #[async_trait]
    impl EventStore for NullStore {
        async fn append(&self, _events: Vec<NewEvent>) -> Result<(), crate::error::EventStoreError> {
            Ok(())
        }

        async fn append_if(
            &self,
            events: Vec<NewEvent>,
            _condition: AppendCondition,
        ) -> Result<AppendOutcome, crate::error::EventStoreError> {
            Ok(AppendOutcome {
                transaction_id: 1,
                events_count: events.len(),
                cursor: Cursor::new(events.len() as i64, 1),
            })
        }

        async fn query(
            &self,
            _query: &Query,
            _after: Cursor,
        ) -> Result<Vec<crate::event::RawEvent>, crate::error::EventStoreError> {
            Ok(vec![])
        }
    }

    #[derive(Debug)]
    struct OpenWallet {
        wallet_id: String,
    }

    impl Command for OpenWallet {
        fn command_type(&self) -> &'static str {
            "OpenWallet"
        }

        fn to_json(&self) -> serde_json::Value {
            serde_json::json!({ "wallet_id": self.wallet_id })
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct OpenWalletHandler;

    #[async_trait]
    impl CommandHandler<NullStore> for OpenWalletHandler {
        type Command = OpenWallet;

        async fn handle(
            &self,
            _store: &NullStore,
            command: &OpenWallet,
        ) -> Result<CommandResult, CommandError> {
            Ok(CommandResult::new(
                vec![],
                AppendCondition::new(Query::empty(), Cursor::ZERO),
            ))
            .map(|r| {
                assert_eq!(command.wallet_id, "W1");
                r
            })
        }
    }

    #[tokio::test]
    async fn it_dispatches_to_the_registered_handler() {
        let mut registry = CommandRegistry::new();
        registry.register("OpenWallet", OpenWalletHandler).unwrap();

        let store = NullStore;
        let command = OpenWallet {
            wallet_id: "W1".to_string(),
        };
        let result = registry.dispatch(&store, &command).await.unwrap();
        assert_eq!(result.events.len(), 0);
    }

    #[tokio::test]
    async fn it_rejects_duplicate_registrations() {
        let mut registry: CommandRegistry<NullStore> = CommandRegistry::new();
        registry.register("OpenWallet", OpenWalletHandler).unwrap();
        let err = registry.register("OpenWallet", OpenWalletHandler).unwrap_err();
        assert_eq!(err.0, "OpenWallet");
    }

    #[tokio::test]
    async fn dispatch_of_an_unknown_command_type_is_an_error() {
        let registry: CommandRegistry<NullStore> = CommandRegistry::new();
        let store = NullStore;
        let command = OpenWallet {
            wallet_id: "W1".to_string(),
        };
        let err = registry.dispatch(&store, &command).await.unwrap_err();
        assert!(matches!(err, CommandError::UnknownCommandType(t) if t == "OpenWallet"));
    }
}
