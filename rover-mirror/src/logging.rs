/// Install a fmt subscriber filtered at `log_level`; `RUST_LOG` takes precedence.
///
/// `"nope"` disables logging. Returns false when nothing was installed,
/// including when the host already set a global subscriber.
pub fn init_logging(log_level: &str) -> bool {
    if log_level == "nope" {
        return false;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nope_installs_nothing() {
        assert!(!init_logging("nope"));
    }

    #[test]
    fn test_second_init_is_harmless() {
        init_logging("debug");
        assert!(!init_logging("debug"));
    }
}
