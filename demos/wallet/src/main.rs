mod application;
mod domain;
mod view;

use std::sync::Arc;
use std::time::Duration;

use application::Application;
use chrono::Utc;
use eventline::{AppendCondition, Cursor, EventStore, EventStoreError, ProcessorConfig, Query, QueryItem};
use eventline_postgres::outbox::{self, LogPublisher, OutboxBatchHandler, OutboxFetcher, StatsPublisher, Topic, TopicPredicate};
use eventline_postgres::scheduler::Scheduler;
use eventline_postgres::views::{ViewBatchHandler, ViewFetcher, ViewSubscriptionConfig};
use eventline_postgres::{Migrator, PgEventStore, PgLeaderElector, PgProgressTracker};
use sqlx::postgres::PgConnectOptions;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use domain::WalletEvent;
use view::WalletBalanceView;

/// Demonstrates the command pipeline, the outbox worker's topic fan-out,
/// a materialized view, and period-scoped projection end to end, covering
/// spec.md §8 scenarios S1 (concurrency fence), S2 (idempotent create),
/// S3 (outbox fan-out), and S6 (period-scoped projection).
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    let pool = PgPool::connect_with(PgConnectOptions::new()).await?;
    Migrator::new(&pool).run().await?;
    WalletBalanceView::ensure_schema(&pool).await?;

    let store = PgEventStore::new(pool.clone());
    let app = Application::new(store.clone());

    let shutdown = CancellationToken::new();
    let workers = spawn_workers(pool.clone(), store.clone(), shutdown.clone());

    run_concurrency_fence_scenario(&store).await?;
    run_idempotent_open_scenario(&app).await?;
    run_command_pipeline_scenario(&app).await?;
    run_period_scenario(&store).await?;

    // Give the outbox and view schedulers a few poll cycles to catch up
    // before we inspect their results and shut down.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    report_outbox_and_view_state(&pool).await?;

    shutdown.cancel();
    for worker in workers {
        let _ = worker.await;
    }
    Ok(())
}

fn spawn_workers(
    pool: PgPool,
    store: PgEventStore,
    shutdown: CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    let leader: Arc<dyn eventline::LeaderElector> = Arc::new(PgLeaderElector::new(pool.clone()));
    let outbox_progress: Arc<dyn eventline::ProgressTracker> = Arc::new(PgProgressTracker::outbox(pool.clone()));
    let view_progress: Arc<dyn eventline::ProgressTracker> = Arc::new(PgProgressTracker::views(pool.clone()));
    // Outbox defaults to one lock for the whole subsystem; views default to
    // one lock per view, so a slow view can't stall the others (spec.md
    // §4.5/§4.6/§4.7 "Lock strategy choice").
    let config = ProcessorConfig {
        lock_strategy: eventline::LockStrategy::Global,
        ..ProcessorConfig::default()
    };
    let view_config = ProcessorConfig::default();

    let mut handles = Vec::new();

    // Two topics, both keyed on the presence of `wallet_id` -- any wallet
    // event fans out to both (spec.md §4.6 "An event may be routed to
    // multiple topics").
    let ledger_topic = Topic::new("ledger", TopicPredicate::new().require_key("wallet_id"));
    let ledger_name = outbox::subscription_name("ledger", "log");
    let ledger_scheduler = Scheduler::new(
        ledger_name,
        outbox::LEADER_FAMILY_KEY,
        config.clone(),
        OutboxFetcher::new(store.clone(), ledger_topic.clone()),
        OutboxBatchHandler::new(ledger_topic, Arc::new(LogPublisher)),
        Arc::clone(&leader),
        Arc::clone(&outbox_progress),
    );
    handles.push(tokio::spawn(ledger_scheduler.run(shutdown.clone())));

    let stats_publisher = Arc::new(StatsPublisher::new());
    let audit_topic = Topic::new("audit", TopicPredicate::new().require_key("wallet_id"));
    let audit_name = outbox::subscription_name("audit", "stats");
    let audit_scheduler = Scheduler::new(
        audit_name,
        outbox::LEADER_FAMILY_KEY,
        config.clone(),
        OutboxFetcher::new(store.clone(), audit_topic.clone()),
        OutboxBatchHandler::new(audit_topic, stats_publisher),
        Arc::clone(&leader),
        Arc::clone(&outbox_progress),
    );
    handles.push(tokio::spawn(audit_scheduler.run(shutdown.clone())));

    let view_subscription = ViewSubscriptionConfig::new(
        "balance-view",
        ["WalletOpened", "DepositMade", "WithdrawalMade"],
    );
    let view_scheduler = Scheduler::new(
        "balance-view",
        eventline_postgres::views::LEADER_FAMILY_KEY,
        view_config,
        ViewFetcher::new(store.clone(), view_subscription.clone()),
        ViewBatchHandler::new(view_subscription, WalletBalanceView, pool),
        leader,
        view_progress,
    );
    handles.push(tokio::spawn(view_scheduler.run(shutdown)));

    handles
}

/// S1: open a wallet, read its balance, then append a conflicting write
/// using the stale cursor directly against the store (bypassing the
/// command pipeline, which always re-reads) to show `append_if` rejecting
/// it as a concurrency conflict, the way two racing requests would.
async fn run_concurrency_fence_scenario(store: &PgEventStore) -> anyhow::Result<()> {
    let wallet_id = "W-fence";
    let opened = eventline::new_event(
        &WalletEvent::WalletOpened { wallet_id: wallet_id.to_string(), balance: 100 },
        Utc::now(),
    )?;
    store.append(vec![opened]).await?;

    let decision = Query::item(QueryItem::new().with_tags(domain::wallet_tags(wallet_id)));
    let stale_cursor = Cursor::ZERO;

    let withdrawal = eventline::new_event(
        &WalletEvent::WithdrawalMade { wallet_id: wallet_id.to_string(), amount: 40 },
        Utc::now(),
    )?;
    let first = store
        .append_if(vec![withdrawal], AppendCondition::new(decision.clone(), stale_cursor))
        .await;
    println!("S1: first append against a cursor that already precedes WalletOpened: {first:?}");
    assert!(matches!(first, Err(EventStoreError::ConcurrencyConflict)));

    Ok(())
}

/// S2: open the same wallet twice under the same idempotency key; the
/// second attempt must fail `DuplicateOperation`, not create a second
/// `WalletOpened` event.
async fn run_idempotent_open_scenario(app: &Application) -> anyhow::Result<()> {
    let wallet_id = "W-idempotent";
    let first = app.open_wallet(wallet_id).await;
    let second = app.open_wallet(wallet_id).await;

    println!("S2: first open: {:?}", first.map(|o| o.transaction_id));
    match second {
        Err(err) => {
            let is_duplicate = matches!(&err, eventline::CommandError::Store(EventStoreError::DuplicateOperation));
            println!("S2: second open rejected as duplicate: {is_duplicate}");
        }
        Ok(_) => anyhow::bail!("expected the second OpenWallet to be rejected as a duplicate"),
    }
    Ok(())
}

/// The everyday path: open, deposit, withdraw, then attempt an
/// over-withdrawal and observe the domain-level rejection.
async fn run_command_pipeline_scenario(app: &Application) -> anyhow::Result<()> {
    let wallet_id = "W1";
    app.open_wallet(wallet_id).await?;
    app.deposit(wallet_id, 100).await?;
    app.withdraw(wallet_id, 40).await?;

    let balance = app.balance_of(wallet_id).await?;
    println!("balance after deposit(100)/withdraw(40): {balance:?}");
    assert_eq!(balance.balance, 60);

    let overdraft = app.withdraw(wallet_id, 1_000).await;
    match overdraft {
        Err(err) => println!("over-withdrawal rejected: {:?}", application::as_domain_error(&err)),
        Ok(_) => anyhow::bail!("expected the over-withdrawal to be rejected"),
    }
    Ok(())
}

/// S6: open a second wallet and project it scoped to the current
/// (monthly) statement period; with no prior `StatementOpened`, the
/// helper emits one as part of the same append as the deposit.
async fn run_period_scenario(store: &PgEventStore) -> anyhow::Result<()> {
    use eventline::PeriodType;
    use eventline_postgres::period::ensure_active_period_and_project;

    let wallet_id = "W-period";
    let entity_tag = eventline::Tag::new("wallet_id", wallet_id)?;
    let opened = eventline::new_event(
        &WalletEvent::WalletOpened { wallet_id: wallet_id.to_string(), balance: 0 },
        Utc::now(),
    )?;
    store.append(vec![opened]).await?;

    let deposit = eventline::new_event(
        &WalletEvent::DepositMade { wallet_id: wallet_id.to_string(), amount: 500 },
        Utc::now(),
    )?;
    let condition = AppendCondition::new(
        Query::item(QueryItem::new().with_tag(entity_tag.clone())),
        Cursor::ZERO,
    );

    let projector = domain::BalanceProjector::new(wallet_id);
    let (scope, projection, events, condition) = ensure_active_period_and_project(
        store,
        entity_tag,
        PeriodType::Monthly,
        Utc::now(),
        vec![deposit],
        condition,
        domain::Balance::default(),
        &[&projector],
    )
    .await?;

    store.append_if(events, condition).await?;
    println!(
        "S6: period {} balance before this deposit lands: {:?}",
        scope.period_id, projection.state
    );
    Ok(())
}

async fn report_outbox_and_view_state(pool: &PgPool) -> anyhow::Result<()> {
    let balances: Vec<(String, i64)> =
        sqlx::query_as("SELECT wallet_id, balance FROM wallet_balances ORDER BY wallet_id")
            .fetch_all(pool)
            .await?;
    println!("materialized wallet_balances: {balances:?}");

    let outbox_progress: Vec<(String, i64)> =
        sqlx::query_as("SELECT name, position FROM outbox_progress ORDER BY name")
            .fetch_all(pool)
            .await?;
    println!("outbox progress: {outbox_progress:?}");

    Ok(())
}
