/// Installs the global `tracing` subscriber appropriate for the build target.
///
/// On `wasm32` this wires `tracing-wasm`, which forwards spans/events to the
/// browser console (`console.log`/`warn`/`error`) in place of
/// `tracing_subscriber::fmt().with(EnvFilter)`, which assumes a process
/// with stdout and environment variables, neither of which exist inside a
/// wasm module. Off wasm (native test runs) this is a no-op: tests assert
/// on return values and state, not log output.
///
/// Idempotent — safe to call multiple times (e.g. once per test, once from
/// `Orchestrator::new`); subsequent calls are silently ignored.
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            console_error_panic_hook::set_once();
            tracing_wasm::set_as_global_default();
        });
    }
}
