//! Logging utilities
//!
//! Log lines go to standard output. `RUST_LOG` takes precedence over the
//! configured level so operators can raise verbosity per module.

/// Initialize the logging system
///
/// # Parameters
///
/// * `level` - Default log level (error, warn, info, debug, trace)
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    let _ = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stdout)
        .try_init();
}
