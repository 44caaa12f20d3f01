/// Runs `f`, logging how long it took when the `metrics` feature is on.
#[cfg(feature = "metrics")]
pub fn measure<T>(label: &str, f: impl FnOnce() -> T) -> T {
    let tt = std::time::Instant::now();
    let result = f();

    log::trace!("{label}: {}", humantime::format_duration(tt.elapsed()));

    result
}

/// Runs `f`, logging how long it took when the `metrics` feature is on.
#[cfg(not(feature = "metrics"))]
pub fn measure<T>(_label: &str, f: impl FnOnce() -> T) -> T {
    f()
}
