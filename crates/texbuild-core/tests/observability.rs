//! Observability tests for the compilation lifecycle events.

use texbuild_core::{
    compile_span, emit_bibliography_decided, emit_compile_finished, emit_compile_started,
    emit_pass_finished,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_compile_started_logs_entry_and_engine() {
    emit_compile_started("req-1", "/tmp/w/main.tex", "xelatex");
    assert!(logs_contain("compile.started"));
    assert!(logs_contain("xelatex"));
}

#[traced_test]
#[test]
fn test_emit_pass_finished_logs_pass_index() {
    emit_pass_finished("req-2", 2, "exited(0)", 1200);
    assert!(logs_contain("compile.pass_finished"));
    assert!(logs_contain("pass=2"));
}

#[traced_test]
#[test]
fn test_emit_bibliography_decided() {
    emit_bibliography_decided("req-3", "skipped: no .bib sources", false);
    assert!(logs_contain("compile.bibliography"));
    assert!(logs_contain("ran=false"));
}

#[traced_test]
#[test]
fn test_span_tags_events_with_request_id() {
    compile_span("req-span-77").in_scope(|| {
        emit_compile_finished("req-span-77", "success", 10, 2);
    });
    assert!(logs_contain("req-span-77"));
    assert!(logs_contain("compile.finished"));
}
