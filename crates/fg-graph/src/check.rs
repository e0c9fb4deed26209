use crate::error::GraphResult;
use crate::invocation::OperatorInvocation;
use crate::port::{InputPortDecl, PortWindowMode};
use crate::window::{EvictionPolicy, PartitionEviction, TriggerPolicy, WindowKind};

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Severity of a compile-check diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One compile-check finding, located by operator and (optionally) port.
#[derive(Debug, Clone)]
pub struct CheckDiagnostic {
    pub severity: Severity,
    pub operator: String,
    pub port: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CheckDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.port {
            Some(port) => write!(
                f,
                "{prefix}: operator `{}` port `{port}`: {}",
                self.operator, self.message,
            ),
            None => write!(f, "{prefix}: operator `{}`: {}", self.operator, self.message),
        }
    }
}

/// Accumulated diagnostics from one compile-check pass.
///
/// The pass never stops at the first problem: a single run surfaces
/// everything wrong with the graph.
#[derive(Debug, Default)]
pub struct CheckReport {
    diagnostics: Vec<CheckDiagnostic>,
}

impl CheckReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff no error-severity diagnostics were recorded.
    pub fn passed(&self) -> bool {
        self.error_count() == 0
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn diagnostics(&self) -> &[CheckDiagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub(crate) fn push(&mut self, diag: CheckDiagnostic) {
        self.diagnostics.push(diag);
    }
}

// ---------------------------------------------------------------------------
// OperatorCheck — external callback seam
// ---------------------------------------------------------------------------

/// Outcome of an operator-supplied compile check.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub passed: bool,
    /// Diagnostic text, carried verbatim into the report.
    pub messages: Vec<String>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            messages: Vec::new(),
        }
    }

    pub fn fail(messages: Vec<String>) -> Self {
        Self {
            passed: false,
            messages,
        }
    }
}

/// Compile-check logic supplied by an operator implementation.
///
/// Invoked with a read-only view of the invocation during the graph
/// check pass. An `Err` means the check itself failed to run and is
/// propagated unmodified; a `Ok(CheckOutcome)` with `passed: false` is
/// an ordinary, aggregated check failure.
pub trait OperatorCheck {
    fn check(&self, invocation: &OperatorInvocation, verbose: bool) -> GraphResult<CheckOutcome>;
}

// ---------------------------------------------------------------------------
// Invocation-level pass
// ---------------------------------------------------------------------------

/// Check one invocation: per-input-port window completeness, then the
/// operator callback. All findings accumulate into `report`.
pub(crate) fn check_invocation(
    inv: &OperatorInvocation,
    verbose: bool,
    report: &mut CheckReport,
) -> GraphResult<()> {
    for port in inv.inputs() {
        check_input_port(inv.name(), port, report);
    }

    if let Some(callback) = inv.check_callback() {
        log::debug!("operator {}: running compile check", inv.name());
        let outcome = callback.check(inv, verbose)?;
        let severity = if outcome.passed {
            Severity::Warning
        } else {
            Severity::Error
        };
        if !outcome.passed && outcome.messages.is_empty() {
            report.push(CheckDiagnostic {
                severity,
                operator: inv.name().to_string(),
                port: None,
                message: "operator compile check failed".to_string(),
            });
        }
        for message in outcome.messages {
            report.push(CheckDiagnostic {
                severity,
                operator: inv.name().to_string(),
                port: None,
                message,
            });
        }
    }

    Ok(())
}

/// Window-completeness rules for one input port.
///
/// These are distinct from the setter-time legality gates: a port may be
/// left half-configured during construction, and only here is the final
/// configuration required to be complete.
fn check_input_port(op_name: &str, port: &InputPortDecl, report: &mut CheckReport) {
    let window = port.window();

    if port.window_mode() == PortWindowMode::Required && !window.is_windowed() {
        report.push(diag(
            Severity::Error,
            op_name,
            port,
            "port requires a window but none is configured",
        ));
    }

    if !window.is_windowed() {
        return;
    }

    if *window.eviction() == EvictionPolicy::None {
        report.push(diag(
            Severity::Error,
            op_name,
            port,
            "no window eviction policy specified",
        ));
    }

    if window.kind() == WindowKind::Sliding && *window.trigger() == TriggerPolicy::None {
        report.push(diag(
            Severity::Warning,
            op_name,
            port,
            "sliding window has no trigger policy",
        ));
    }

    if window.is_partitioned() && window.partition_eviction() == PartitionEviction::None {
        report.push(diag(
            Severity::Error,
            op_name,
            port,
            "partitioned window has no partition eviction policy",
        ));
    }
}

fn diag(severity: Severity, op_name: &str, port: &InputPortDecl, message: &str) -> CheckDiagnostic {
    CheckDiagnostic {
        severity,
        operator: op_name.to_string(),
        port: Some(port.name().to_string()),
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use orion_error::prelude::*;

    use super::*;
    use crate::error::GraphReason;
    use crate::invocation::OpId;

    fn invocation() -> OperatorInvocation {
        OperatorInvocation::new(OpId(0), "flt_1".into(), "test::Filter".into())
    }

    fn schema() -> fg_schema::Schema {
        "v: int64".parse().unwrap()
    }

    fn run(inv: &OperatorInvocation) -> CheckReport {
        let mut report = CheckReport::new();
        check_invocation(inv, false, &mut report).unwrap();
        report
    }

    // -- 1. completeness ------------------------------------------------------

    #[test]
    fn unwindowed_optional_port_passes() {
        let mut inv = invocation();
        inv.add_input(None, schema()).unwrap();
        assert!(run(&inv).passed());
    }

    #[test]
    fn windowed_without_eviction_fails() {
        let mut inv = invocation();
        let port = inv.add_input(None, schema()).unwrap();
        inv.input_mut(port.index()).unwrap().tumbling().unwrap();

        let report = run(&inv);
        assert!(!report.passed());
        assert_eq!(report.error_count(), 1);
        let d = &report.diagnostics()[0];
        assert_eq!(d.port.as_deref(), Some("in0"));
        assert!(d.message.contains("eviction"), "{}", d.message);
    }

    #[test]
    fn eviction_set_afterwards_passes() {
        let mut inv = invocation();
        let port = inv.add_input(None, schema()).unwrap();
        let p = inv.input_mut(port.index()).unwrap();
        p.sliding().unwrap();
        p.trigger_count(5).unwrap();
        assert!(!run(&inv).passed(), "trigger alone is not enough");

        inv.input_mut(port.index()).unwrap().evict_count(10).unwrap();
        assert!(run(&inv).passed());
    }

    #[test]
    fn sliding_without_trigger_warns() {
        let mut inv = invocation();
        let port = inv.add_input(None, schema()).unwrap();
        let p = inv.input_mut(port.index()).unwrap();
        p.sliding().unwrap();
        p.evict_count(10).unwrap();

        let report = run(&inv);
        assert!(report.passed(), "warning only");
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn partitioned_without_partition_eviction_fails() {
        let mut inv = invocation();
        let port = inv.add_input(None, schema()).unwrap();
        let p = inv.input_mut(port.index()).unwrap();
        p.tumbling().unwrap();
        p.evict_count(10).unwrap();
        p.partitioned().unwrap();
        assert_eq!(run(&inv).error_count(), 1);

        inv.input_mut(port.index())
            .unwrap()
            .partition_eviction_age(60.0)
            .unwrap();
        assert!(run(&inv).passed());
    }

    #[test]
    fn required_mode_unwindowed_fails() {
        let mut inv = invocation();
        inv.add_input_with_mode(None, schema(), PortWindowMode::Required)
            .unwrap();
        let report = run(&inv);
        assert_eq!(report.error_count(), 1);
        assert!(report.diagnostics()[0].message.contains("requires a window"));
    }

    // -- 2. operator callback -------------------------------------------------

    struct FixedCheck(CheckOutcome);

    impl OperatorCheck for FixedCheck {
        fn check(&self, _: &OperatorInvocation, _: bool) -> GraphResult<CheckOutcome> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn failed_callback_messages_become_errors() {
        let mut inv = invocation();
        inv.set_check(Arc::new(FixedCheck(CheckOutcome::fail(vec![
            "bad parameter".into(),
            "missing port".into(),
        ]))));

        let report = run(&inv);
        assert_eq!(report.error_count(), 2);
        assert_eq!(report.diagnostics()[0].message, "bad parameter");
    }

    #[test]
    fn failed_callback_without_messages_still_fails() {
        let mut inv = invocation();
        inv.set_check(Arc::new(FixedCheck(CheckOutcome::fail(vec![]))));
        assert_eq!(run(&inv).error_count(), 1);
    }

    #[test]
    fn passed_callback_messages_become_warnings() {
        let mut inv = invocation();
        inv.set_check(Arc::new(FixedCheck(CheckOutcome {
            passed: true,
            messages: vec!["deprecated parameter".into()],
        })));

        let report = run(&inv);
        assert!(report.passed());
        assert_eq!(report.warning_count(), 1);
    }

    struct BrokenCheck;

    impl OperatorCheck for BrokenCheck {
        fn check(&self, _: &OperatorInvocation, _: bool) -> GraphResult<CheckOutcome> {
            StructError::from(GraphReason::CheckFailure)
                .with_detail("callback panicked internally")
                .err()
        }
    }

    #[test]
    fn callback_error_propagates() {
        let mut inv = invocation();
        inv.set_check(Arc::new(BrokenCheck));
        let mut report = CheckReport::new();
        assert!(check_invocation(&inv, false, &mut report).is_err());
    }
}
