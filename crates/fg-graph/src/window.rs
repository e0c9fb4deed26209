use std::fmt::Write as _;

use orion_error::prelude::*;
use serde::{Deserialize, Serialize};

use fg_schema::Value;

use crate::error::{GraphReason, GraphResult};

// ---------------------------------------------------------------------------
// Policy enums
// ---------------------------------------------------------------------------

/// Window type of an input port. Every port starts out `NotWindowed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    #[default]
    NotWindowed,
    Sliding,
    Tumbling,
}

/// Rule for removing tuples from a window's buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    #[default]
    None,
    Count(u32),
    /// Seconds.
    Time(f64),
    Punctuation,
    Delta {
        attribute: String,
        delta: Value,
    },
}

/// Rule for when a sliding window's contents are processed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    #[default]
    None,
    Count(u32),
    /// Seconds.
    Time(f64),
    Delta {
        attribute: String,
        delta: Value,
    },
}

/// Rule for retiring whole partitions of a partitioned window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionEviction {
    #[default]
    None,
    /// Partitions idle longer than this many seconds are evicted.
    PartitionAge(f64),
    /// At most this many partitions are retained.
    PartitionCount(u32),
    /// At most this many tuples are retained across all partitions.
    TupleCount(u32),
}

// ---------------------------------------------------------------------------
// WindowConfig — per-input-port state machine
// ---------------------------------------------------------------------------

/// The windowing configuration of one input port.
///
/// The five fields are not independent: every mutator validates the
/// requested change against the current window kind and fails with
/// `InvalidState` when the combination is contradictory, leaving the
/// configuration untouched. Switching to `Sliding` or `Tumbling` resets
/// every policy field to its default, so policies must be re-specified
/// after a kind change.
///
/// Mutation legality is checked eagerly here; configuration
/// *completeness* (windowed port without an eviction policy, partitioned
/// window without a partition-eviction policy) is deliberately not — it
/// is verified once, by the compile-check pass, so callers may build up
/// a window in any order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    kind: WindowKind,
    partitioned: bool,
    eviction: EvictionPolicy,
    trigger: TriggerPolicy,
    partition_eviction: PartitionEviction,
}

impl WindowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn is_windowed(&self) -> bool {
        self.kind != WindowKind::NotWindowed
    }

    pub fn is_partitioned(&self) -> bool {
        self.partitioned
    }

    pub fn eviction(&self) -> &EvictionPolicy {
        &self.eviction
    }

    pub fn trigger(&self) -> &TriggerPolicy {
        &self.trigger
    }

    pub fn partition_eviction(&self) -> PartitionEviction {
        self.partition_eviction
    }

    // -- kind transitions ---------------------------------------------------

    /// Declare a sliding window. Resets all policy fields.
    pub fn sliding(&mut self) {
        self.reset();
        self.kind = WindowKind::Sliding;
        log::debug!("window kind set to sliding");
    }

    /// Declare a tumbling window. Resets all policy fields.
    pub fn tumbling(&mut self) {
        self.reset();
        self.kind = WindowKind::Tumbling;
        log::debug!("window kind set to tumbling");
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    // -- partitioning -------------------------------------------------------

    pub fn set_partitioned(&mut self) -> GraphResult<()> {
        self.check_windowed()?;
        self.partitioned = true;
        Ok(())
    }

    // -- eviction policies --------------------------------------------------

    pub fn set_evict_count(&mut self, count: u32) -> GraphResult<()> {
        self.check_windowed()?;
        self.eviction = EvictionPolicy::Count(count);
        Ok(())
    }

    pub fn set_evict_time(&mut self, seconds: f64) -> GraphResult<()> {
        self.check_windowed()?;
        check_seconds("eviction time", seconds)?;
        self.eviction = EvictionPolicy::Time(seconds);
        Ok(())
    }

    pub fn set_evict_punctuation(&mut self) -> GraphResult<()> {
        self.check_kind(WindowKind::Tumbling)?;
        self.eviction = EvictionPolicy::Punctuation;
        Ok(())
    }

    /// Delta eviction. The attribute/value pair is validated against the
    /// port schema by the port declaration before this is called.
    pub fn set_evict_delta(&mut self, attribute: String, delta: Value) -> GraphResult<()> {
        self.check_windowed()?;
        self.eviction = EvictionPolicy::Delta { attribute, delta };
        Ok(())
    }

    // -- trigger policies ---------------------------------------------------

    pub fn set_trigger_count(&mut self, count: u32) -> GraphResult<()> {
        self.check_kind(WindowKind::Sliding)?;
        self.trigger = TriggerPolicy::Count(count);
        Ok(())
    }

    pub fn set_trigger_time(&mut self, seconds: f64) -> GraphResult<()> {
        self.check_kind(WindowKind::Sliding)?;
        check_seconds("trigger time", seconds)?;
        self.trigger = TriggerPolicy::Time(seconds);
        Ok(())
    }

    pub fn set_trigger_delta(&mut self, attribute: String, delta: Value) -> GraphResult<()> {
        self.check_kind(WindowKind::Sliding)?;
        self.trigger = TriggerPolicy::Delta { attribute, delta };
        Ok(())
    }

    // -- partition eviction -------------------------------------------------

    pub fn set_partition_eviction_age(&mut self, seconds: f64) -> GraphResult<()> {
        self.check_partitioned()?;
        check_seconds("partition eviction age", seconds)?;
        self.partition_eviction = PartitionEviction::PartitionAge(seconds);
        Ok(())
    }

    pub fn set_partition_eviction_count(&mut self, count: u32) -> GraphResult<()> {
        self.check_partitioned()?;
        check_positive("partition eviction count", count)?;
        self.partition_eviction = PartitionEviction::PartitionCount(count);
        Ok(())
    }

    pub fn set_partition_eviction_tuple_count(&mut self, count: u32) -> GraphResult<()> {
        self.check_partitioned()?;
        check_positive("partition eviction tuple count", count)?;
        self.partition_eviction = PartitionEviction::TupleCount(count);
        Ok(())
    }

    // -- state gates --------------------------------------------------------

    pub(crate) fn check_windowed(&self) -> GraphResult<()> {
        if !self.is_windowed() {
            return StructError::from(GraphReason::InvalidState)
                .with_detail("port is not windowed")
                .err();
        }
        Ok(())
    }

    pub(crate) fn check_sliding(&self) -> GraphResult<()> {
        self.check_kind(WindowKind::Sliding)
    }

    fn check_kind(&self, required: WindowKind) -> GraphResult<()> {
        self.check_windowed()?;
        if self.kind != required {
            return StructError::from(GraphReason::InvalidState)
                .with_detail(format!(
                    "window kind is {:?}, operation requires {required:?}",
                    self.kind,
                ))
                .err();
        }
        Ok(())
    }

    fn check_partitioned(&self) -> GraphResult<()> {
        self.check_windowed()?;
        if !self.partitioned {
            return StructError::from(GraphReason::InvalidState)
                .with_detail("window is not partitioned")
                .err();
        }
        Ok(())
    }

    // -- display ------------------------------------------------------------

    /// One-line human summary, e.g. `tumbling(evict=count:200)` or
    /// `sliding(evict=time:30s, trigger=count:5), partitioned(age:60s)`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        match self.kind {
            WindowKind::NotWindowed => return "not windowed".to_string(),
            WindowKind::Sliding => out.push_str("sliding("),
            WindowKind::Tumbling => out.push_str("tumbling("),
        }

        match &self.eviction {
            EvictionPolicy::None => out.push_str("evict=unset"),
            EvictionPolicy::Count(n) => {
                write!(out, "evict=count:{n}").ok();
            }
            EvictionPolicy::Time(s) => {
                write!(out, "evict=time:{s}s").ok();
            }
            EvictionPolicy::Punctuation => out.push_str("evict=punct"),
            EvictionPolicy::Delta { attribute, delta } => {
                write!(out, "evict=delta:{attribute}:{delta}").ok();
            }
        }

        match &self.trigger {
            TriggerPolicy::None => {}
            TriggerPolicy::Count(n) => {
                write!(out, ", trigger=count:{n}").ok();
            }
            TriggerPolicy::Time(s) => {
                write!(out, ", trigger=time:{s}s").ok();
            }
            TriggerPolicy::Delta { attribute, delta } => {
                write!(out, ", trigger=delta:{attribute}:{delta}").ok();
            }
        }
        out.push(')');

        if self.partitioned {
            match self.partition_eviction {
                PartitionEviction::None => out.push_str(", partitioned"),
                PartitionEviction::PartitionAge(s) => {
                    write!(out, ", partitioned(age:{s}s)").ok();
                }
                PartitionEviction::PartitionCount(n) => {
                    write!(out, ", partitioned(partitions:{n})").ok();
                }
                PartitionEviction::TupleCount(n) => {
                    write!(out, ", partitioned(tuples:{n})").ok();
                }
            }
        }

        out
    }
}

fn check_seconds(what: &str, seconds: f64) -> GraphResult<()> {
    if !seconds.is_finite() || seconds < 0.0 {
        return StructError::from(GraphReason::InvalidArgument)
            .with_detail(format!("{what} must be a finite value >= 0, got {seconds}"))
            .err();
    }
    Ok(())
}

fn check_positive(what: &str, count: u32) -> GraphResult<()> {
    if count == 0 {
        return StructError::from(GraphReason::InvalidArgument)
            .with_detail(format!("{what} must be > 0"))
            .err();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn reason_of<T: std::fmt::Debug>(result: GraphResult<T>) -> String {
        format!("{:?}", result.unwrap_err())
    }

    // -- 1. kind transitions reset everything --------------------------------

    #[test]
    fn kind_change_resets_policies() {
        let mut w = WindowConfig::new();
        w.sliding();
        w.set_partitioned().unwrap();
        w.set_evict_count(10).unwrap();
        w.set_trigger_count(5).unwrap();
        w.set_partition_eviction_count(3).unwrap();

        w.tumbling();

        assert_eq!(w.kind(), WindowKind::Tumbling);
        assert!(!w.is_partitioned());
        assert_eq!(*w.eviction(), EvictionPolicy::None);
        assert_eq!(*w.trigger(), TriggerPolicy::None);
        assert_eq!(w.partition_eviction(), PartitionEviction::None);
    }

    #[test]
    fn same_kind_reset_is_still_destructive() {
        let mut w = WindowConfig::new();
        w.sliding();
        w.set_evict_count(10).unwrap();
        w.sliding();
        assert_eq!(*w.eviction(), EvictionPolicy::None);
    }

    // -- 2. state-gated setters ----------------------------------------------

    #[test]
    fn eviction_requires_windowed() {
        let mut w = WindowConfig::new();
        assert!(reason_of(w.set_evict_count(5)).contains("InvalidState"));
        assert!(w.set_evict_time(1.0).is_err());

        w.tumbling();
        w.set_evict_count(5).unwrap();
        assert_eq!(*w.eviction(), EvictionPolicy::Count(5));
    }

    #[test]
    fn punctuation_requires_tumbling() {
        let mut w = WindowConfig::new();
        assert!(w.set_evict_punctuation().is_err());

        w.sliding();
        assert!(reason_of(w.set_evict_punctuation()).contains("InvalidState"));

        w.tumbling();
        w.set_evict_punctuation().unwrap();
        assert_eq!(*w.eviction(), EvictionPolicy::Punctuation);
    }

    #[test]
    fn trigger_requires_sliding() {
        let mut w = WindowConfig::new();
        assert!(w.set_trigger_count(5).is_err());

        w.tumbling();
        assert!(reason_of(w.set_trigger_count(5)).contains("InvalidState"));

        w.sliding();
        w.set_trigger_count(5).unwrap();
        assert_eq!(*w.trigger(), TriggerPolicy::Count(5));
    }

    #[test]
    fn partitioned_requires_windowed() {
        let mut w = WindowConfig::new();
        assert!(w.set_partitioned().is_err());
        w.sliding();
        w.set_partitioned().unwrap();
        assert!(w.is_partitioned());
    }

    #[test]
    fn partition_eviction_requires_partitioned() {
        let mut w = WindowConfig::new();
        w.tumbling();
        assert!(reason_of(w.set_partition_eviction_age(60.0)).contains("InvalidState"));

        w.set_partitioned().unwrap();
        w.set_partition_eviction_age(60.0).unwrap();
        assert_eq!(
            w.partition_eviction(),
            PartitionEviction::PartitionAge(60.0),
        );
    }

    // -- 3. argument validation ----------------------------------------------

    #[test]
    fn negative_time_rejected() {
        let mut w = WindowConfig::new();
        w.sliding();
        assert!(reason_of(w.set_evict_time(-1.0)).contains("InvalidArgument"));
        assert!(w.set_trigger_time(f64::NAN).is_err());
        // state untouched on failure
        assert_eq!(*w.eviction(), EvictionPolicy::None);
        assert_eq!(*w.trigger(), TriggerPolicy::None);
    }

    #[test]
    fn zero_partition_counts_rejected() {
        let mut w = WindowConfig::new();
        w.tumbling();
        w.set_partitioned().unwrap();
        assert!(reason_of(w.set_partition_eviction_count(0)).contains("InvalidArgument"));
        assert!(w.set_partition_eviction_tuple_count(0).is_err());
        assert_eq!(w.partition_eviction(), PartitionEviction::None);
    }

    // -- 4. describe ----------------------------------------------------------

    #[test]
    fn describe_summaries() {
        let mut w = WindowConfig::new();
        assert_eq!(w.describe(), "not windowed");

        w.tumbling();
        w.set_evict_count(200).unwrap();
        assert_eq!(w.describe(), "tumbling(evict=count:200)");

        w.sliding();
        w.set_evict_time(30.0).unwrap();
        w.set_trigger_count(5).unwrap();
        assert_eq!(w.describe(), "sliding(evict=time:30s, trigger=count:5)");
    }
}
