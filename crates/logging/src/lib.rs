#![cfg_attr(not(feature = "std"), no_std)]

pub use tracing;
use tracing::level_filters::LevelFilter;
pub use tracing_subscriber;

/// Default log target for every beacon component.
pub const TARGET: &str = "beacon";

/// A [`trace`] log with the target `"beacon"`
///
/// [`trace`]: tracing::trace
#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($tt:tt)*) => {
        $crate::tracing::trace!(target: $target, $($tt)*)
    };
    ($($tt:tt)*) => {
        $crate::tracing::trace!(target: "beacon", $($tt)*)
    }
}

/// A [`debug`] log with the target `"beacon"`
///
/// [`debug`]: tracing::debug
#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($tt:tt)*) => {
        $crate::tracing::debug!(target: $target, $($tt)*)
    };
    ($($tt:tt)*) => {
        $crate::tracing::debug!(target: "beacon", $($tt)*)
    }
}

/// An [`info`] log with the target `"beacon"`
///
/// [`info`]: tracing::info
#[macro_export]
macro_rules! info {
    (target: $target:expr, $($tt:tt)*) => {
        $crate::tracing::info!(target: $target, $($tt)*)
    };
    ($($tt:tt)*) => {
        $crate::tracing::info!(target: "beacon", $($tt)*)
    }
}

/// A [`warn`] log with the target `"beacon"`
///
/// [`warn`]: tracing::warn
#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($tt:tt)*) => {
        $crate::tracing::warn!(target: $target, $($tt)*)
    };
    ($($tt:tt)*) => {
        $crate::tracing::warn!(target: "beacon", $($tt)*)
    }
}

/// An [`error`] log with the target `"beacon"`
///
/// [`error`]: tracing::error
#[macro_export]
macro_rules! error {
    (target: $target:expr, $($tt:tt)*) => {
        $crate::tracing::error!(target: $target, $($tt)*)
    };
    ($($tt:tt)*) => {
        $crate::tracing::error!(target: "beacon", $($tt)*)
    }
}

/// An [`error`] log tagged `critical = true`, used for faults that break
/// consensus across the whole cabinet.
///
/// [`error`]: tracing::error
#[macro_export]
macro_rules! critical {
    ($($tt:tt)*) => {
        $crate::tracing::error!(target: "beacon", critical = true, $($tt)*)
    }
}

/// Sets up the logging for any crate, honouring `RUST_LOG` and defaulting to `INFO`.
pub fn setup_log() {
    setup_log_with_level(LevelFilter::INFO);
}

/// Same as [`setup_log`], with a caller-chosen default level.
pub fn setup_log_with_level(level: LevelFilter) {
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::fmt::SubscriberBuilder::default()
        .without_time()
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .finish()
        .try_init();
}
