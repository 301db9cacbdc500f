use log::SetLoggerError;

/// Attempt to init a env_logger for objsync.
/// Does nothing if the "builtin_env_logger" feature is disabled.
pub fn try_init() -> Result<(), SetLoggerError> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "builtin_env_logger")] {
            env_logger::try_init_from_env(
                // By default, use info level logging.
                env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
            )
        } else {
            Ok(())
        }
    }
}

/// Called when an inspector is attached. An embedder (a debugger front end, a
/// test harness) may already own the global logger, which is fine.
pub(crate) fn init_on_attach() {
    if try_init().is_err() {
        debug!("A logger is already installed. objsync will log through it.");
    }
}
