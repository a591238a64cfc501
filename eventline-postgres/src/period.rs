//! Glue between the pure [`eventline::PeriodId`]/[`eventline::PeriodType`]
//! helper and the append/query machinery: the two modes spec.md §4.8
//! describes for "closing the books" on a period-scoped entity.
use chrono::{DateTime, Duration, Months, Utc};
use eventline::{
    AppendCondition, Cursor, EventStore, EventStoreError, NewEvent, PeriodId, PeriodType, ProjectionResult, Query,
    QueryItem, StateProjector, Tag,
};
use serde_json::json;

/// The period an entity's projection was scoped to, returned alongside the
/// projection so callers can tag newly emitted events with it.
#[derive(Debug, Clone)]
pub struct PeriodScope {
    pub period_id: PeriodId,
    pub period_tag: Tag,
}

impl PeriodScope {
    fn query(entity_tag: &Tag, period_type: PeriodType, now: DateTime<Utc>) -> (Self, Query) {
        let period_id = PeriodId::containing(period_type, now);
        let period_tag = period_id.tag();
        let query = Query::item(
            QueryItem::new().with_tag(entity_tag.clone()).with_tag(period_tag.clone()),
        );
        (Self { period_id, period_tag }, query)
    }
}

/// Mode 1 (spec.md §4.8): project `entity_tag`'s events scoped to the
/// period containing `now`, with no writes -- the period is a read-side
/// query scope only.
pub async fn project_current_period<ES, S>(
    store: &ES,
    entity_tag: Tag,
    period_type: PeriodType,
    now: DateTime<Utc>,
    init: S,
    projectors: &[&(dyn StateProjector<State = S> + Sync)],
) -> Result<(PeriodScope, ProjectionResult<S>), EventStoreError>
where
    ES: EventStore,
    S: Send + 'static,
{
    let (scope, query) = PeriodScope::query(&entity_tag, period_type, now);
    let events = store.query(&query, Cursor::ZERO).await?;

    let mut state = init;
    let mut cursor = Cursor::ZERO;
    for event in &events {
        for projector in projectors {
            if projector.query().matches_event(event) {
                projector.apply(&mut state, event);
            }
        }
        cursor = Cursor::new(event.position, event.transaction_id);
    }

    Ok((scope, ProjectionResult { state, cursor }))
}

/// Mode 2 (spec.md §4.8): ensures a `StatementOpened` event exists for
/// `entity_tag`'s current period, emitting one (and a `StatementClosed`
/// for the previous period, if it was left open) as part of `events`
/// before appending, then projects scoped to the current period.
///
/// `events`/`condition` are the caller's own command output; this only
/// adds the statement-lifecycle events and widens the append condition's
/// idempotency clause to cover the `StatementOpened` check, so the whole
/// thing still commits as a single atomic append.
pub async fn ensure_active_period_and_project<ES, S>(
    store: &ES,
    entity_tag: Tag,
    period_type: PeriodType,
    now: DateTime<Utc>,
    mut events: Vec<NewEvent>,
    condition: AppendCondition,
    init: S,
    projectors: &[&(dyn StateProjector<State = S> + Sync)],
) -> Result<(PeriodScope, ProjectionResult<S>, Vec<NewEvent>, AppendCondition), EventStoreError>
where
    ES: EventStore,
    S: Send + 'static,
{
    let (scope, _query) = PeriodScope::query(&entity_tag, period_type, now);

    let opened_query = Query::item(
        QueryItem::new()
            .with_types(["StatementOpened"])
            .with_tag(entity_tag.clone())
            .with_tag(scope.period_tag.clone()),
    );
    let already_open = !store.query(&opened_query, Cursor::ZERO).await?.is_empty();

    let mut condition = condition;
    if !already_open {
        if let Some(previous) = previous_period_tag(period_type, now, &scope.period_id) {
            let mut closed_tags = eventline::TagSet::new();
            closed_tags.insert(entity_tag.clone());
            closed_tags.insert(previous);
            events.insert(
                0,
                NewEvent::new("StatementClosed", closed_tags, json!({}), now)
                    .expect("StatementClosed is a short, fixed type name"),
            );
        }

        let mut opened_tags = eventline::TagSet::new();
        opened_tags.insert(entity_tag.clone());
        opened_tags.insert(scope.period_tag.clone());
        events.insert(
            0,
            NewEvent::new("StatementOpened", opened_tags, json!({}), now)
                .expect("StatementOpened is a short, fixed type name"),
        );

        condition = condition.with_idempotency(
            QueryItem::new()
                .with_types(["StatementOpened"])
                .with_tag(entity_tag.clone())
                .with_tag(scope.period_tag.clone()),
        );
    }

    let (_scope_again, projection) =
        project_current_period(store, entity_tag, period_type, now, init, projectors).await?;

    Ok((scope, projection, events, condition))
}

/// The tag of the period immediately preceding `period_id`, if `now` is
/// recent enough for that period to ever have existed (it always is, this
/// just avoids a meaningless lookup for `PeriodType::None`, which has no
/// "previous").
fn previous_period_tag(period_type: PeriodType, now: DateTime<Utc>, _period_id: &PeriodId) -> Option<Tag> {
    let previous_instant = match period_type {
        PeriodType::Yearly => now.checked_sub_months(Months::new(12))?,
        PeriodType::Monthly => now.checked_sub_months(Months::new(1))?,
        PeriodType::Daily => now.checked_sub_signed(Duration::days(1))?,
        PeriodType::Hourly => now.checked_sub_signed(Duration::hours(1))?,
        PeriodType::None => return None,
    };
    Some(PeriodId::containing(period_type, previous_instant).tag())
}
