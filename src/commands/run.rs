//! Run command implementation

use crate::config::RunSettings;
use psramtest_board::open_board;
use psramtest_core::sequencer::{RunSummary, Sequencer};
use std::fmt;
use std::io::{self, Write};

/// Console adapter from `fmt::Write` to an `io::Write` sink
///
/// Output is flushed at every line end so results appear as they happen.
pub struct Console<W: Write> {
    inner: W,
}

impl Console<io::Stdout> {
    /// Console on standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Console<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> fmt::Write for Console<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.inner.write_all(s.as_bytes()).map_err(|_| fmt::Error)?;
        if s.contains('\n') {
            self.inner.flush().map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}

/// Open the configured board and run the sequencer on it
pub fn run<W: fmt::Write>(
    settings: &RunSettings,
    out: &mut W,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let handle = open_board(&settings.backend)?;
    log::info!(
        "Opened {} backend ({} held line(s))",
        handle.backend,
        handle.held.len()
    );

    // Held lines stay requested until the run returns
    let (board, _held) = handle.into_board();

    let mut out_buf = vec![0u8; settings.bulk_len];
    let mut in_buf = vec![0u8; settings.bulk_len];
    let mut sequencer = Sequencer::new(
        board,
        settings.sequencer.clone(),
        &mut out_buf,
        &mut in_buf,
    )?;

    let summary = sequencer.run(out, settings.iterations)?;
    log::info!(
        "{} iteration(s), {} failed",
        summary.iterations,
        summary.failed
    );
    Ok(summary)
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::config::RunConfig;

    fn settings(backend: &str, bulk_len: usize) -> RunSettings {
        RunConfig {
            backend: Some(backend.to_string()),
            bulk_len: Some(bulk_len),
            iterations: Some(2),
            interval_ms: Some(0),
            power_up_delay_us: Some(0),
            ..Default::default()
        }
        .resolve()
        .unwrap()
    }

    #[test]
    fn dummy_run_passes() {
        let mut out = String::new();
        let summary = run(&settings("dummy", 256), &mut out).unwrap();

        assert_eq!(summary, RunSummary { iterations: 2, failed: 0 });
        assert!(out.starts_with("PSRAM test running...\nReset returned: 0x0002\n"));
        assert_eq!(out.matches("Bulk test PASSED (256 bytes)").count(), 2);
    }

    #[test]
    fn wrong_wait_state_count_fails() {
        let mut out = String::new();
        let summary = run(&settings("dummy:wait=2", 64), &mut out).unwrap();

        assert_eq!(summary.failed, 2);
        assert!(out.contains("Bulk test FAILED"));
    }

    #[test]
    fn unknown_backend_is_fatal() {
        let mut out = String::new();
        assert!(run(&settings("nope", 0), &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn console_flushes_lines() {
        use std::fmt::Write as _;

        let mut console = Console::new(Vec::new());
        writeln!(console, "Write returned: 0x{:04X}", 8).unwrap();
        assert_eq!(console.into_inner(), b"Write returned: 0x0008\n");
    }
}
