//! Log subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` overrides the default `warn` filter. With `trace`, the VM's
/// per-instruction events are enabled on top of it.
pub fn init(trace: bool) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if trace {
        if let Ok(directive) = "lazyflow_vm=trace".parse() {
            filter = filter.add_directive(directive);
        }
    }

    // A second init (tests calling commands in-process) is not an error.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
