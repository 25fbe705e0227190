//! Structured events emitted by the handler.
//!
//! The handler never logs directly. It reports execution errors and slow
//! responses to a [`HandlerObserver`]; [`TracingObserver`] turns them into
//! `tracing` events.

use std::fmt::Write as _;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::ErrorCode;

/// An error reported by the schema while executing a request.
#[derive(Debug, Clone, Copy)]
pub struct ErrorEvent<'a> {
    pub kind: ErrorCode,
    pub message: &'a str,
    pub stack: Option<&'a str>,
}

/// A request that took longer than the configured threshold.
#[derive(Debug, Clone, Copy)]
pub struct SlowResponseEvent<'a> {
    pub elapsed: Duration,
    pub query: &'a str,
    pub operation_name: &'a str,
}

/// Receives handler events.
pub trait HandlerObserver: Send + Sync {
    fn on_execution_error(&self, event: &ErrorEvent<'_>);

    fn on_slow_response(&self, event: &SlowResponseEvent<'_>);
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl HandlerObserver for NoopObserver {
    fn on_execution_error(&self, _event: &ErrorEvent<'_>) {}

    fn on_slow_response(&self, _event: &SlowResponseEvent<'_>) {}
}

/// Observer that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver {
    /// Log raw stacks instead of the filtered report.
    pub show_full_stack_trace: bool,
}

impl TracingObserver {
    pub fn new(show_full_stack_trace: bool) -> Self {
        Self {
            show_full_stack_trace,
        }
    }
}

impl HandlerObserver for TracingObserver {
    fn on_execution_error(&self, event: &ErrorEvent<'_>) {
        if self.show_full_stack_trace {
            error!(kind = %event.kind, "{}", event.message);
            if let Some(stack) = event.stack {
                error!(kind = %event.kind, "{}", stack);
            }
        } else {
            let cwd = std::env::current_dir()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default();
            error!(
                kind = %event.kind,
                "{}",
                format_error_report(event.message, event.stack, &cwd)
            );
        }
    }

    fn on_slow_response(&self, event: &SlowResponseEvent<'_>) {
        warn!("------------------ slow response -------------------");
        warn!(
            operation_name = event.operation_name,
            "response time: {:?}", event.elapsed
        );
        for line in event.query.lines() {
            warn!("{}", line);
        }
    }
}

const RULE: &str = "|---------------------------------------------------------------------------\n";

/// Stack lines containing any of these come from the toolchain or the async
/// runtime and are left out of reports.
const NOISE_MARKERS: &[&str] = &[
    "/rustc/",
    "std::",
    "core::",
    "tokio::",
    "rust_begin_unwind",
];

/// Renders an error and its stack as a boxed, multi-line report.
///
/// Toolchain and runtime frames are dropped and `cwd` is stripped from the
/// remaining lines so paths read relative to the project.
pub fn format_error_report(message: &str, stack: Option<&str>, cwd: &str) -> String {
    let mut report = String::from("\n\n");
    report.push_str(RULE);
    report.push_str("|  graphql error\n");
    report.push_str(RULE);
    let _ = writeln!(report, "|\n|  {message}\n|  ...");

    for line in stack.unwrap_or_default().lines() {
        if NOISE_MARKERS.iter().any(|marker| line.contains(marker)) {
            continue;
        }
        let line = if cwd.is_empty() {
            line.to_string()
        } else {
            line.replace(cwd, "")
        };
        let _ = writeln!(report, "|  {line}");
    }

    report.push_str("|  ...\n");
    report.push_str(RULE);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_report_filters_frames_and_strips_cwd() {
        let stack = "\
   0: app::resolvers::user
             at /home/dev/app/src/resolvers.rs:42:9
   1: tokio::runtime::task::raw::poll
   2: std::panicking::try
             at /rustc/abc/library/std/src/panicking.rs:1:1";

        let report = format_error_report("boom", Some(stack), "/home/dev/app");

        insta::assert_snapshot!(report.trim_start(), @r"
        |---------------------------------------------------------------------------
        |  graphql error
        |---------------------------------------------------------------------------
        |
        |  boom
        |  ...
        |     0: app::resolvers::user
        |               at /src/resolvers.rs:42:9
        |  ...
        |---------------------------------------------------------------------------
        ");
    }

    #[test]
    fn test_report_without_stack() {
        let report = format_error_report("no stack", None, "");
        assert!(report.contains("|  no stack\n"));
        assert_eq!(report.matches("|  ...\n").count(), 2);
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl HandlerObserver for Recording {
        fn on_execution_error(&self, event: &ErrorEvent<'_>) {
            self.0.lock().unwrap().push(format!("{}:{}", event.kind, event.message));
        }

        fn on_slow_response(&self, event: &SlowResponseEvent<'_>) {
            self.0.lock().unwrap().push(format!("slow:{}", event.query));
        }
    }

    #[test]
    fn test_observer_is_object_safe() {
        let recording = Recording::default();
        let observer: &dyn HandlerObserver = &recording;
        observer.on_execution_error(&ErrorEvent {
            kind: ErrorCode::ExecutionError,
            message: "bad",
            stack: None,
        });
        observer.on_slow_response(&SlowResponseEvent {
            elapsed: Duration::from_millis(250),
            query: "{ a }",
            operation_name: "",
        });

        assert_eq!(
            *recording.0.lock().unwrap(),
            vec!["EXECUTION_ERROR:bad".to_string(), "slow:{ a }".to_string()]
        );
    }
}
