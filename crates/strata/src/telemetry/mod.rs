// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache telemetry integration with OpenTelemetry and tracing.
//!
//! Every manager operation emits one event: a metric data point on the
//! event counter plus, when logging is enabled, a structured `tracing`
//! event at a severity matched to the activity. Durations feed a histogram
//! and per-handle entry counts feed a gauge.

use std::sync::Arc;
use std::time::Duration;

use arrayvec::ArrayVec;
use opentelemetry::{
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

pub(crate) mod attributes;
pub mod metrics;
#[cfg(test)]
pub(crate) mod testing;

use metrics::{create_entry_gauge, create_event_counter, create_operation_duration_histogram};

/// Maximum attributes per event: `cache.name`, operation, activity, handle = 4.
const MAX_ATTRIBUTES: usize = 4;

type Attributes = ArrayVec<KeyValue, MAX_ATTRIBUTES>;

#[derive(Debug)]
struct TelemetryInner {
    logging_enabled: bool,
    event_counter: Option<Counter<u64>>,
    operation_duration: Option<Histogram<f64>>,
    entries: Option<Gauge<u64>>,
}

/// Telemetry collector handed to a cache manager at construction.
///
/// Wraps an optional OpenTelemetry meter and a logging switch. Construct one
/// and pass it to the manager builder via `.telemetry()`; managers without
/// one record nothing.
///
/// # Examples
///
/// ```no_run
/// use opentelemetry::metrics::MeterProvider;
/// use opentelemetry_sdk::metrics::SdkMeterProvider;
/// use strata::CacheTelemetry;
///
/// let provider = SdkMeterProvider::builder().build();
/// let meter = strata::telemetry::metrics::create_meter(&provider);
/// let telemetry = CacheTelemetry::new(true, Some(&meter));
/// ```
#[derive(Clone, Debug)]
pub struct CacheTelemetry {
    inner: Arc<TelemetryInner>,
}

impl CacheTelemetry {
    /// Creates a new telemetry collector.
    ///
    /// # Arguments
    ///
    /// * `logging_enabled` - Whether `tracing` events are emitted
    /// * `meter` - The OpenTelemetry meter to create instruments from
    #[must_use]
    pub fn new(logging_enabled: bool, meter: Option<&Meter>) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                logging_enabled,
                event_counter: meter.map(create_event_counter),
                operation_duration: meter.map(create_operation_duration_histogram),
                entries: meter.map(create_entry_gauge),
            }),
        }
    }

    /// Creates a collector that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(false, None)
    }

    /// Records one cache operation.
    pub(crate) fn record(
        &self,
        cache_name: &str,
        operation: CacheOperation,
        activity: CacheActivity,
        duration: Duration,
    ) {
        let mut attrs = Attributes::new();
        attrs.push(KeyValue::new(attributes::CACHE_NAME, cache_name.to_string()));
        attrs.push(KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()));
        attrs.push(KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()));

        if let Some(counter) = &self.inner.event_counter {
            counter.add(1, &attrs);
        }
        if let Some(histogram) = &self.inner.operation_duration {
            histogram.record(duration.as_secs_f64(), &attrs);
        }
        if self.inner.logging_enabled {
            Self::emit(cache_name, operation, activity, duration);
        }
    }

    /// Records the current entry count of one handle.
    pub(crate) fn record_entries(&self, cache_name: &str, handle_name: &str, entries: u64) {
        if let Some(gauge) = &self.inner.entries {
            let attrs = [
                KeyValue::new(attributes::CACHE_NAME, cache_name.to_string()),
                KeyValue::new(attributes::CACHE_HANDLE_NAME, handle_name.to_string()),
            ];
            gauge.record(entries, &attrs);
        }
    }

    fn emit(cache_name: &str, operation: CacheOperation, activity: CacheActivity, duration: Duration) {
        let op = operation.as_str();
        let act = activity.as_str();
        let duration_ns = duration.as_nanos() as u64;

        // Tracing level must be constant, so a macro selects the level.
        // Field names must match the constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = act,
                    cache.duration_ns = duration_ns,
                    "cache.event"
                )
            };
        }

        match activity.level() {
            EventLevel::Error => emit_event!(error),
            EventLevel::Info => emit_event!(info),
            EventLevel::Debug => emit_event!(debug),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheOperation {
    Add,
    Put,
    Get,
    Remove,
    Update,
    Expire,
    Clear,
    ClearRegion,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "cache.add",
            Self::Put => "cache.put",
            Self::Get => "cache.get",
            Self::Remove => "cache.remove",
            Self::Update => "cache.update",
            Self::Expire => "cache.expire",
            Self::Clear => "cache.clear",
            Self::ClearRegion => "cache.clear_region",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Added,
    AlreadyExists,
    Stored,
    Removed,
    NotFound,
    Updated,
    UpdateMissing,
    UpdateCanceled,
    UpdateConflicted,
    Ok,
    Error,
}

pub(crate) enum EventLevel {
    Debug,
    Info,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Added => "cache.added",
            Self::AlreadyExists => "cache.already_exists",
            Self::Stored => "cache.stored",
            Self::Removed => "cache.removed",
            Self::NotFound => "cache.not_found",
            Self::Updated => "cache.updated",
            Self::UpdateMissing => "cache.update_missing",
            Self::UpdateCanceled => "cache.update_canceled",
            Self::UpdateConflicted => "cache.update_conflicted",
            Self::Ok => "cache.ok",
            Self::Error => "cache.error",
        }
    }

    pub fn level(self) -> EventLevel {
        match self {
            Self::Hit | Self::Miss | Self::AlreadyExists | Self::NotFound | Self::Ok => {
                EventLevel::Debug
            }
            Self::Added
            | Self::Stored
            | Self::Removed
            | Self::Updated
            | Self::UpdateMissing
            | Self::UpdateCanceled
            | Self::UpdateConflicted => EventLevel::Info,
            Self::Error => EventLevel::Error,
        }
    }
}
