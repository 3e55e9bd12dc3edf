//! Structured observability hooks for the compilation lifecycle.
//!
//! - Request-scoped tracing span, instrumented across the compile future
//! - Emission functions for start, per-pass finish, bibliography decision, finish

use tracing::info;

/// The request-scoped span, unentered. Use with `Instrument` across awaits.
pub fn compile_span(request_id: &str) -> tracing::Span {
    tracing::info_span!("texbuild.compile", request_id = %request_id)
}

/// Emit event: compile started with the chosen entry and engine.
pub fn emit_compile_started(request_id: &str, entry: &str, engine: &str) {
    info!(
        event = "compile.started",
        request_id = %request_id,
        entry = %entry,
        engine = %engine,
    );
}

/// Emit event: one engine pass finished.
pub fn emit_pass_finished(request_id: &str, pass: u8, status: &str, duration_ms: u64) {
    info!(
        event = "compile.pass_finished",
        request_id = %request_id,
        pass = pass,
        status = %status,
        duration_ms = duration_ms,
    );
}

/// Emit event: bibliography stage decided.
pub fn emit_bibliography_decided(request_id: &str, decision: &str, ran: bool) {
    info!(
        event = "compile.bibliography",
        request_id = %request_id,
        decision = %decision,
        ran = ran,
    );
}

/// Emit event: compile reached a terminal state.
pub fn emit_compile_finished(request_id: &str, status: &str, duration_ms: u64, passes: usize) {
    info!(
        event = "compile.finished",
        request_id = %request_id,
        status = %status,
        duration_ms = duration_ms,
        passes = passes,
    );
}
