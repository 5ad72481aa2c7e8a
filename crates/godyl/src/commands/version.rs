use godyl_core::platform::Platform;
use std::fmt::Write;

/// Version banner plus the build target and the detected host.
#[must_use]
pub fn version_text() -> String {
    let host = Platform::detect();
    tracing::debug!(%host, "Detected host platform");

    let mut out = format!(
        "{} {}\n{}\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_DESCRIPTION"),
    );
    let _ = writeln!(out, "core:    {}", godyl_core::VERSION);
    let _ = writeln!(
        out,
        "build:   {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    let _ = writeln!(out, "host:    {host}");
    let _ = writeln!(out, "run id:  {}", crate::logging::correlation_id());
    out
}
