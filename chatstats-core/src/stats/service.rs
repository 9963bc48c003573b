//! Statistics request orchestration.
//!
//! ```text
//! ParseRequest -> ValidateScopesAndTimeframes -> ResolveAndFetch
//!   -> FilterByDateRange -> [per granularity: GenerateBuckets
//!        -> per scope: Sweep + Compute] -> AssembleResponse
//! ```
//!
//! Every step returns a [`Result`]; the first failure aborts the request and
//! no partial data is returned.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::metrics::{self, FirstSeen, NewEntityPolicy};
use super::request::StatsRequest;
use super::scope::{self, Calculator};
use super::timeframe::{self, Bucket};
use crate::error::{Error, Result};
use crate::store::EventStore;
use crate::types::{Event, Granularity, RawDataset, Scope, Series};

/// Response payload, serialized as `{"data": {"<granularity>": {"<scope>": [...]}}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsResponse {
    pub data: BTreeMap<Granularity, BTreeMap<Scope, Series>>,
}

impl StatsResponse {
    /// Series for one granularity and scope.
    pub fn series(&self, granularity: Granularity, scope: Scope) -> Option<&Series> {
        self.data.get(&granularity)?.get(&scope)
    }
}

/// Inclusive time window a dataset is reported over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A fetched dataset, sorted and windowed for one request.
#[derive(Debug)]
struct Dataset {
    /// Full history, ascending by `created_at`
    history: Vec<Event>,
    /// Only built when a first-seen scope reads this dataset
    first_seen: Option<FirstSeen>,
    /// `None` when there is nothing to report
    window: Option<DateWindow>,
}

impl Dataset {
    fn prepare(
        mut events: Vec<Event>,
        request: &StatsRequest,
        tz: Tz,
        needs_first_seen: bool,
    ) -> Self {
        events.sort_by_key(|e| e.created_at);
        let first_seen = needs_first_seen.then(|| metrics::first_seen(&events));
        let window = resolve_window(&events, request, tz);
        Self {
            history: events,
            first_seen,
            window,
        }
    }

    /// Events inside the window, borrowed from the sorted history.
    fn in_range(&self) -> &[Event] {
        let Some(window) = self.window else {
            return &[];
        };
        let lo = self.history.partition_point(|e| e.created_at < window.start);
        let hi = self.history.partition_point(|e| e.created_at <= window.end);
        &self.history[lo..hi.max(lo)]
    }
}

/// Resolve the reporting window for one dataset.
///
/// Missing bounds default to the dataset's earliest and latest events. An
/// empty dataset with no explicit bound, or an inverted window, has nothing
/// to report.
pub fn resolve_window(sorted: &[Event], request: &StatsRequest, tz: Tz) -> Option<DateWindow> {
    let start = request
        .from_date
        .map(|d| timeframe::local_midnight(d, tz))
        .or_else(|| sorted.first().map(|e| e.created_at));
    let end = request
        .to_date
        .map(|d| timeframe::end_of_day(d, tz))
        .or_else(|| sorted.last().map(|e| e.created_at));

    match (start, end) {
        (Some(start), Some(end)) if start <= end => Some(DateWindow { start, end }),
        (Some(_), Some(_)) => None,
        (Some(only), None) | (None, Some(only)) => Some(DateWindow {
            start: only,
            end: only,
        }),
        (None, None) => None,
    }
}

/// Answers statistics requests from an [`EventStore`].
pub struct StatisticsService<S> {
    store: S,
    tz: Tz,
}

impl<S: EventStore> StatisticsService<S> {
    /// Bucket boundaries are aligned to local midnights in `tz`.
    pub fn new(store: S, tz: Tz) -> Self {
        Self { store, tz }
    }

    /// Answer a raw JSON body with `(status, body)`.
    ///
    /// Success is `200 {"data": ...}`; every failure is `400 {"error": ...}`.
    pub async fn respond(&self, body: Option<&Value>) -> (u16, Value) {
        let result = self
            .handle(body)
            .await
            .and_then(|response| serde_json::to_value(&response).map_err(Error::from));

        match result {
            Ok(value) => (200, value),
            Err(e) => {
                tracing::warn!(error = %e, "statistics request failed");
                (e.status_code(), json!({ "error": e.user_message() }))
            }
        }
    }

    /// Parse, validate and compute.
    pub async fn handle(&self, body: Option<&Value>) -> Result<StatsResponse> {
        let request = StatsRequest::from_json(body)?;
        self.compute(&request).await
    }

    /// Compute every requested series from fresh snapshots.
    #[tracing::instrument(name = "stats_request", skip_all)]
    pub async fn compute(&self, request: &StatsRequest) -> Result<StatsResponse> {
        let wanted = scope::resolve(&request.scopes)?;
        if request.timeframes.is_empty() {
            return Err(Error::NoTimeframes);
        }

        tracing::info!(
            scopes = request.scopes.len(),
            timeframes = request.timeframes.len(),
            datasets = wanted.len(),
            from = ?request.from_date,
            to = ?request.to_date,
            "computing statistics"
        );

        let snapshots = self.fetch(&wanted).await?;
        let datasets: BTreeMap<RawDataset, Dataset> = snapshots
            .into_iter()
            .map(|(which, events)| {
                let needs_first_seen = request.scopes.iter().any(|s| {
                    let d = scope::descriptor(*s);
                    d.dataset == which && d.calculator == Calculator::NewEntity
                });
                (which, Dataset::prepare(events, request, self.tz, needs_first_seen))
            })
            .collect();

        let mut data = BTreeMap::new();
        for &granularity in &request.timeframes {
            let by_scope = tracing::debug_span!("granularity", %granularity)
                .in_scope(|| self.compute_granularity(granularity, request, &datasets))?;
            data.insert(granularity, by_scope);
        }

        Ok(StatsResponse { data })
    }

    /// One timeline per fetched dataset, then one series per scope.
    fn compute_granularity(
        &self,
        granularity: Granularity,
        request: &StatsRequest,
        datasets: &BTreeMap<RawDataset, Dataset>,
    ) -> Result<BTreeMap<Scope, Series>> {
        let mut timelines: BTreeMap<RawDataset, Vec<Bucket>> = BTreeMap::new();
        for (which, dataset) in datasets {
            if let Some(window) = dataset.window {
                timelines.insert(
                    *which,
                    timeframe::generate(granularity, window.start, window.end, self.tz)?,
                );
            }
        }

        let mut by_scope = BTreeMap::new();
        for &scope in &request.scopes {
            let descriptor = scope::descriptor(scope);
            let dataset = datasets
                .get(&descriptor.dataset)
                .ok_or_else(|| Error::Store(format!("{} was not fetched", descriptor.dataset)))?;

            let series = match timelines.get(&descriptor.dataset) {
                Some(buckets) => compute_series(descriptor.calculator, dataset, buckets)?,
                None => empty_series(descriptor.calculator),
            };
            tracing::debug!(scope = %scope, buckets = series.len(), "computed series");
            by_scope.insert(scope, series);
        }
        Ok(by_scope)
    }

    /// Fetch the wanted datasets, concurrently when both are needed.
    async fn fetch(
        &self,
        wanted: &BTreeSet<RawDataset>,
    ) -> Result<Vec<(RawDataset, Vec<Event>)>> {
        let want_inputs = wanted.contains(&RawDataset::InputEvents);
        let want_users = wanted.contains(&RawDataset::UserCreationEvents);

        let (inputs, users) = tokio::join!(
            async {
                if want_inputs {
                    Some(self.store.fetch_all_input_events().await)
                } else {
                    None
                }
            },
            async {
                if want_users {
                    Some(self.store.fetch_all_user_creation_events().await)
                } else {
                    None
                }
            },
        );

        let mut snapshots = Vec::new();
        for (which, fetched) in [
            (RawDataset::InputEvents, inputs),
            (RawDataset::UserCreationEvents, users),
        ] {
            match fetched {
                Some(Ok(events)) => {
                    tracing::debug!(dataset = %which, events = events.len(), "fetched dataset");
                    snapshots.push((which, events));
                }
                Some(Err(e)) => {
                    tracing::warn!(dataset = %which, error = %e, "dataset fetch failed");
                    return Err(Error::UpstreamFetch {
                        dataset: which,
                        message: e.to_string(),
                    });
                }
                None => {}
            }
        }
        Ok(snapshots)
    }
}

fn compute_series(
    calculator: Calculator,
    dataset: &Dataset,
    buckets: &[Bucket],
) -> Result<Series> {
    let events = dataset.in_range();
    Ok(match calculator {
        Calculator::RawCount => Series::Counts(metrics::raw_counts(events, buckets)),
        Calculator::NewEntity => {
            let first_seen = dataset
                .first_seen
                .as_ref()
                .ok_or_else(|| Error::Store("first-seen index was not built".to_string()))?;
            Series::Cumulative(metrics::new_entity_counts(
                events,
                buckets,
                NewEntityPolicy::FirstSeen(first_seen),
            ))
        }
        Calculator::FavouritesRatio => {
            // Every user record in range is new here; no first-seen dedup.
            let with_favourites = metrics::new_entity_counts(
                events.iter().filter(|e| e.has_favourites),
                buckets,
                NewEntityPolicy::EveryRecord,
            );
            let all_users =
                metrics::new_entity_counts(events, buckets, NewEntityPolicy::EveryRecord);
            Series::Ratio(metrics::ratio(&with_favourites, &all_users)?)
        }
    })
}

fn empty_series(calculator: Calculator) -> Series {
    match calculator {
        Calculator::RawCount => Series::Counts(Vec::new()),
        Calculator::NewEntity => Series::Cumulative(Vec::new()),
        Calculator::FavouritesRatio => Series::Ratio(Vec::new()),
    }
}
