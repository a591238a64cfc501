//! The wallet: three events, a balance projection, and the business rules
//! a command handler checks before appending.
use eventline::{Event, Query, QueryItem, RawEvent, StateProjector, Tag, TagSet};
use serde::{Deserialize, Serialize};

pub type WalletId = String;

#[derive(Debug, Clone, Serialize, Deserialize, Event)]
pub enum WalletEvent {
    WalletOpened {
        #[tag]
        wallet_id: WalletId,
        balance: i64,
    },
    DepositMade {
        #[tag]
        wallet_id: WalletId,
        amount: i64,
    },
    WithdrawalMade {
        #[tag]
        wallet_id: WalletId,
        amount: i64,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("wallet {0:?} is already open")]
    AlreadyOpen(WalletId),
    #[error("wallet {0:?} does not exist")]
    NotFound(WalletId),
    #[error("wallet {wallet_id:?} has insufficient funds: balance {balance}, requested {amount}")]
    InsufficientFunds {
        wallet_id: WalletId,
        balance: i64,
        amount: i64,
    },
}

/// The wallet's folded state: whether it has been opened, and its current
/// balance. Mirrors spec.md §8 S1's `balanceOf(W)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balance {
    pub opened: bool,
    pub balance: i64,
}

/// Projects one wallet's events into its [`Balance`]. Shared by the
/// command handlers (to read state before deciding) and by the period
/// helper demo (to scope the same fold to a statement period).
pub struct BalanceProjector {
    wallet_id: WalletId,
}

impl BalanceProjector {
    pub fn new(wallet_id: impl Into<WalletId>) -> Self {
        Self {
            wallet_id: wallet_id.into(),
        }
    }

    pub fn wallet_tag(&self) -> Tag {
        Tag::new("wallet_id", self.wallet_id.clone()).expect("wallet ids are non-empty")
    }
}

impl StateProjector for BalanceProjector {
    type State = Balance;

    fn id(&self) -> &'static str {
        "wallet-balance"
    }

    fn query(&self) -> Query {
        Query::item(
            QueryItem::new()
                .with_types(["WalletOpened", "DepositMade", "WithdrawalMade"])
                .with_tag(self.wallet_tag()),
        )
    }

    fn apply(&self, state: &mut Balance, event: &RawEvent) {
        let amount = |e: &RawEvent, field: &str| e.payload[field].as_i64().unwrap_or(0);
        match event.event_type.as_str() {
            "WalletOpened" => {
                state.opened = true;
                state.balance = amount(event, "balance");
            }
            "DepositMade" => state.balance += amount(event, "amount"),
            "WithdrawalMade" => state.balance -= amount(event, "amount"),
            _ => {}
        }
    }
}

pub fn wallet_tags(wallet_id: &str) -> TagSet {
    let mut tags = TagSet::new();
    tags.insert(Tag::new("wallet_id", wallet_id).expect("wallet ids are non-empty"));
    tags
}

/// Decides whether opening `wallet_id` with `initial_balance` is allowed
/// given its current (necessarily empty) state.
pub fn decide_open(wallet_id: &str, state: &Balance) -> Result<WalletEvent, Error> {
    if state.opened {
        return Err(Error::AlreadyOpen(wallet_id.to_string()));
    }
    Ok(WalletEvent::WalletOpened {
        wallet_id: wallet_id.to_string(),
        balance: 0,
    })
}

pub fn decide_deposit(wallet_id: &str, amount: i64, state: &Balance) -> Result<WalletEvent, Error> {
    if !state.opened {
        return Err(Error::NotFound(wallet_id.to_string()));
    }
    Ok(WalletEvent::DepositMade {
        wallet_id: wallet_id.to_string(),
        amount,
    })
}

pub fn decide_withdraw(wallet_id: &str, amount: i64, state: &Balance) -> Result<WalletEvent, Error> {
    if !state.opened {
        return Err(Error::NotFound(wallet_id.to_string()));
    }
    if state.balance < amount {
        return Err(Error::InsufficientFunds {
            wallet_id: wallet_id.to_string(),
            balance: state.balance,
            amount,
        });
    }
    Ok(WalletEvent::WithdrawalMade {
        wallet_id: wallet_id.to_string(),
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw(event_type: &str, wallet_id: &str, field: &str, value: i64, position: i64) -> RawEvent {
        RawEvent {
            position,
            transaction_id: position,
            event_type: event_type.to_string(),
            tags: wallet_tags(wallet_id),
            payload: serde_json::json!({ field: value, "wallet_id": wallet_id }),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn it_folds_open_deposit_withdraw_into_a_balance() {
        let projector = BalanceProjector::new("W1");
        let mut state = Balance::default();
        projector.apply(&mut state, &raw("WalletOpened", "W1", "balance", 0, 1));
        projector.apply(&mut state, &raw("DepositMade", "W1", "amount", 100, 2));
        projector.apply(&mut state, &raw("WithdrawalMade", "W1", "amount", 40, 3));
        assert_eq!(state, Balance { opened: true, balance: 60 });
    }

    #[test]
    fn opening_twice_is_rejected() {
        let state = Balance { opened: true, balance: 0 };
        assert_eq!(decide_open("W1", &state), Err(Error::AlreadyOpen("W1".to_string())));
    }

    #[test]
    fn withdrawing_more_than_the_balance_is_rejected() {
        let state = Balance { opened: true, balance: 60 };
        assert_eq!(
            decide_withdraw("W1", 70, &state),
            Err(Error::InsufficientFunds { wallet_id: "W1".to_string(), balance: 60, amount: 70 })
        );
    }

    #[test]
    fn depositing_into_an_unopened_wallet_is_rejected() {
        let state = Balance::default();
        assert_eq!(decide_deposit("W1", 10, &state), Err(Error::NotFound("W1".to_string())));
    }
}
