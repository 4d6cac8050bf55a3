//! Console reporting.
//!
//! Renders progress lines, buffered sections, error blocks, the summary
//! line, and the PASS/FAIL banner. Writer-generic so tests can capture
//! output in a buffer.

use crate::hooks::HookKind;
use crate::tracker::BlockTracker;
use colored::Colorize;
use std::io::Write;
use std::time::Duration;

/// Formats an optional hook duration; an unrecorded start renders as
/// unknown rather than crashing.
fn format_elapsed(elapsed: Option<Duration>) -> String {
    match elapsed {
        Some(duration) => format!("{}ms", duration.as_millis()),
        None => "unknown".to_string(),
    }
}

/// Ordered, human-readable run output.
pub struct Reporter<W: Write> {
    out: W,
    verbose: bool,
    quiet: bool,
    setup: Vec<String>,
    teardown: Vec<String>,
    pending: Vec<String>,
}

impl<W: Write> Reporter<W> {
    /// Creates a reporter writing to `out`.
    pub fn new(out: W, verbose: bool, quiet: bool) -> Self {
        Self {
            out,
            verbose,
            quiet,
            setup: Vec::new(),
            teardown: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Emits a block header on a block change (first observation of a new
    /// identity). Suppressed entirely by `quiet`.
    pub fn block_changed(&mut self, tracker: &BlockTracker) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        writeln!(self.out, "{}", tracker.path.as_str().bold())
    }

    /// Emits a `before()`/`after()` duration line, gated by verbosity.
    pub fn hook_duration(
        &mut self,
        block: &str,
        which: &str,
        elapsed: Option<Duration>,
    ) -> std::io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        writeln!(
            self.out,
            "{block} - {which}() in {}",
            format_elapsed(elapsed)
        )
    }

    /// Buffers one completed-hook line; the setup/teardown sections are
    /// flushed once at the end.
    pub fn hook_completed(&mut self, kind: HookKind, source: &str, elapsed: Duration) {
        let line = format!("{source} in {}ms", elapsed.as_millis());
        match kind {
            HookKind::Setup => self.setup.push(line),
            HookKind::Teardown => self.teardown.push(line),
        }
    }

    /// Buffers one pending line; the section is flushed once at the end.
    pub fn pending_test(&mut self, block: &str, test: Option<&str>) {
        let line = match test {
            Some(test) => format!("{block} - {test}"),
            None => block.to_string(),
        };
        self.pending.push(line);
    }

    /// Emits the end-of-run sections: completed setup/teardown hooks and
    /// pending tests (unless quiet), error blocks in capture order, the
    /// bail-out notice when the run bailed out, the summary line, and the
    /// PASS/FAIL banner.
    pub fn finish(
        &mut self,
        error_blocks: &[String],
        tests_ran: usize,
        errors_reported: usize,
        bailed_out: bool,
    ) -> std::io::Result<()> {
        let setup = std::mem::take(&mut self.setup);
        let teardown = std::mem::take(&mut self.teardown);
        let pending = std::mem::take(&mut self.pending);

        if !self.quiet {
            let sections = [
                ("setup:", &setup),
                ("teardown:", &teardown),
                ("pending:", &pending),
            ];
            for (title, lines) in sections {
                if lines.is_empty() {
                    continue;
                }
                writeln!(self.out)?;
                writeln!(self.out, "{title}")?;
                for line in lines {
                    writeln!(self.out, "  {line}")?;
                }
            }
        }

        if !error_blocks.is_empty() {
            for block in error_blocks {
                writeln!(self.out)?;
                writeln!(self.out, "{block}")?;
            }
        }

        if bailed_out {
            writeln!(self.out)?;
            writeln!(self.out, "{}", "maxErrors exceeded, bailing out.".red())?;
        }

        writeln!(self.out)?;
        writeln!(self.out, "{tests_ran} tests ran. {errors_reported} errors reported.")?;

        let banner = if errors_reported == 0 && error_blocks.is_empty() {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        writeln!(self.out, "{banner}")?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::BlockTrackerRegistry;
    use canopy_proto::{BlockEvent, BlockKind};

    fn sample_tracker(registry: &mut BlockTrackerRegistry) -> &BlockTracker {
        let event = BlockEvent::new(vec!["suite".into(), "inner".into()], BlockKind::Describe);
        let (tracker, _) = registry.resolve(&event).unwrap();
        tracker
    }

    fn output_of(buf: &[u8]) -> String {
        String::from_utf8_lossy(buf).to_string()
    }

    #[test]
    fn test_block_header_on_change() {
        let mut registry = BlockTrackerRegistry::new();
        let mut buf = Vec::new();
        let mut reporter = Reporter::new(&mut buf, false, false);
        reporter.block_changed(sample_tracker(&mut registry)).unwrap();

        assert!(output_of(&buf).contains("suite > inner"));
    }

    #[test]
    fn test_quiet_suppresses_headers_and_pending() {
        let mut registry = BlockTrackerRegistry::new();
        let mut buf = Vec::new();
        let mut reporter = Reporter::new(&mut buf, false, true);
        reporter.block_changed(sample_tracker(&mut registry)).unwrap();
        reporter.hook_completed(HookKind::Setup, "db.setup", Duration::from_millis(4));
        reporter.pending_test("suite", Some("later"));
        reporter.finish(&[], 2, 0, false).unwrap();

        let output = output_of(&buf);
        assert!(!output.contains("suite > inner"));
        assert!(!output.contains("pending"));
        assert!(!output.contains("db.setup"));
        assert!(output.contains("2 tests ran. 0 errors reported."));
    }

    #[test]
    fn test_duration_line_gated_by_verbose() {
        let mut buf = Vec::new();
        let mut reporter = Reporter::new(&mut buf, false, false);
        reporter
            .hook_duration("suite", "before", Some(Duration::from_millis(12)))
            .unwrap();
        assert!(output_of(&buf).is_empty());

        let mut buf = Vec::new();
        let mut reporter = Reporter::new(&mut buf, true, false);
        reporter
            .hook_duration("suite", "before", Some(Duration::from_millis(12)))
            .unwrap();
        assert_eq!(output_of(&buf), "suite - before() in 12ms\n");
    }

    #[test]
    fn test_unknown_duration_does_not_crash() {
        let mut buf = Vec::new();
        let mut reporter = Reporter::new(&mut buf, true, false);
        reporter.hook_duration("suite", "after", None).unwrap();
        assert_eq!(output_of(&buf), "suite - after() in unknown\n");
    }

    #[test]
    fn test_finish_all_pass() {
        let mut buf = Vec::new();
        let mut reporter = Reporter::new(&mut buf, false, false);
        reporter.finish(&[], 5, 0, false).unwrap();

        let output = output_of(&buf);
        assert!(output.contains("5 tests ran. 0 errors reported."));
        assert!(output.contains("PASS"));
        assert!(!output.contains("FAIL"));
    }

    #[test]
    fn test_finish_with_errors_renders_blocks_in_order() {
        let mut buf = Vec::new();
        let mut reporter = Reporter::new(&mut buf, false, false);
        let blocks = vec![
            "suite - first\nstack line".to_string(),
            "suite - second\nother stack".to_string(),
        ];
        reporter.finish(&blocks, 3, 2, false).unwrap();

        let output = output_of(&buf);
        let first = output.find("suite - first").unwrap();
        let second = output.find("suite - second").unwrap();
        assert!(first < second);
        assert!(output.contains("3 tests ran. 2 errors reported."));
        assert!(output.contains("FAIL"));
    }

    #[test]
    fn test_pending_section_flushed_once() {
        let mut buf = Vec::new();
        let mut reporter = Reporter::new(&mut buf, false, false);
        reporter.pending_test("suite", Some("todo one"));
        reporter.pending_test("suite", Some("todo two"));
        reporter.finish(&[], 1, 0, false).unwrap();

        let output = output_of(&buf);
        assert!(output.contains("pending:"));
        assert!(output.contains("  suite - todo one"));
        assert!(output.contains("  suite - todo two"));
    }

    #[test]
    fn test_hook_sections_precede_pending() {
        let mut buf = Vec::new();
        let mut reporter = Reporter::new(&mut buf, false, false);
        reporter.hook_completed(HookKind::Setup, "db.setup", Duration::from_millis(12));
        reporter.hook_completed(HookKind::Teardown, "db.teardown", Duration::from_millis(3));
        reporter.pending_test("suite", Some("later"));
        reporter.finish(&[], 1, 0, false).unwrap();

        let output = output_of(&buf);
        assert!(output.contains("setup:"));
        assert!(output.contains("  db.setup in 12ms"));
        assert!(output.contains("teardown:"));
        assert!(output.contains("  db.teardown in 3ms"));
        let setup = output.find("setup:").unwrap();
        let teardown = output.find("teardown:").unwrap();
        let pending = output.find("pending:").unwrap();
        assert!(setup < teardown);
        assert!(teardown < pending);
    }

    #[test]
    fn test_bail_out_notice_follows_error_blocks() {
        let mut buf = Vec::new();
        let mut reporter = Reporter::new(&mut buf, false, false);
        let blocks = vec!["suite - boom\nstack line".to_string()];
        reporter.finish(&blocks, 0, 1, true).unwrap();

        let output = output_of(&buf);
        let block = output.find("suite - boom").unwrap();
        let notice = output.find("maxErrors exceeded, bailing out.").unwrap();
        let summary = output.find("0 tests ran. 1 errors reported.").unwrap();
        assert!(block < notice);
        assert!(notice < summary);
        assert!(output.contains("FAIL"));
    }
}
