//! # In-kernel Test Harness
//!
//! Runs checks on the real machine and reports through the logger, so the
//! result shows up on screen and in the captured serial transcript:
//!
//! ```text
//! [gdt] Running tests...
//! [PASS] KERNEL_CODE_SELECTOR.0 == 0x08
//! [FAIL] cs == 0x08: values not equal (src/main.rs:142)
//! [gdt] 1 passed, 1 failed
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut runner = TestRunner::new(&mut logger);
//! runner.begin("terminal");
//! check!(runner, WIDTH == 80);
//! check_eq!(runner, 25, HEIGHT);
//! runner.end();
//! let ok = runner.finish();
//! ```

use core::panic::Location;

use crate::logger::{Arg, Console, Logger, Sink};
use crate::terminal::Color;

pub struct TestRunner<'l, C, S> {
    logger: &'l mut Logger<C, S>,
    suite: &'static str,
    suite_passed: u32,
    suite_failed: u32,
    passed: u32,
    failed: u32,
}

impl<'l, C: Console, S: Sink> TestRunner<'l, C, S> {
    /// Prints the run header.
    pub fn new(logger: &'l mut Logger<C, S>) -> Self {
        logger.console_mut().set_color(Color::White, Color::Black);
        logger.print("\n========================================\n", &[]);
        logger.print("       OS-DEV KERNEL TEST SUITE        \n", &[]);
        logger.print("========================================\n\n", &[]);
        logger.console_mut().set_color(Color::LightGrey, Color::Black);
        Self {
            logger,
            suite: "unknown",
            suite_passed: 0,
            suite_failed: 0,
            passed: 0,
            failed: 0,
        }
    }

    pub fn begin(&mut self, suite: &'static str) {
        self.suite = suite;
        self.suite_passed = 0;
        self.suite_failed = 0;
        self.color(Color::LightGrey);
        self.logger.print("[%s] Running tests...\n", &[Arg::from(suite)]);
    }

    pub fn pass(&mut self, name: &str) {
        self.color(Color::LightGreen);
        self.logger.print("[PASS] ", &[]);
        self.color(Color::LightGrey);
        self.logger.print("%s\n", &[Arg::from(name)]);
        self.suite_passed += 1;
    }

    pub fn fail(&mut self, name: &str, reason: &str, location: &Location<'_>) {
        self.color(Color::LightRed);
        self.logger.print("[FAIL] ", &[]);
        self.color(Color::LightGrey);
        self.logger.print(
            "%s: %s (%s:%u)\n",
            &[
                Arg::from(name),
                Arg::from(reason),
                Arg::from(location.file()),
                Arg::from(location.line()),
            ],
        );
        self.suite_failed += 1;
    }

    /// Record `passed`, blaming the caller's source line on failure.
    #[track_caller]
    pub fn check(&mut self, passed: bool, name: &str, reason: &str) -> bool {
        if passed {
            self.pass(name);
        } else {
            self.fail(name, reason, Location::caller());
        }
        passed
    }

    /// Close the current suite and fold its counts into the totals.
    pub fn end(&mut self) {
        self.color(Color::LightGrey);
        self.logger.print(
            "[%s] %u passed, %u failed\n",
            &[
                Arg::from(self.suite),
                Arg::from(self.suite_passed),
                Arg::from(self.suite_failed),
            ],
        );
        self.passed += self.suite_passed;
        self.failed += self.suite_failed;
        self.suite_passed = 0;
        self.suite_failed = 0;
    }

    /// The logger under test. Anything a suite inspects must be read back
    /// before the next check, since every check prints.
    pub fn logger_mut(&mut self) -> &mut Logger<C, S> {
        self.logger
    }

    pub fn passed(&self) -> u32 {
        self.passed
    }

    pub fn failed(&self) -> u32 {
        self.failed
    }

    /// Grand total and verdict. True when nothing failed.
    pub fn finish(mut self) -> bool {
        self.color(Color::White);
        self.logger.print("\n========================================\n", &[]);
        self.logger.print("  TOTAL: ", &[]);
        self.color(Color::LightGreen);
        self.logger.print("%u", &[Arg::from(self.passed)]);
        self.color(Color::White);
        self.logger.print(" passed, ", &[]);
        if self.failed > 0 {
            self.color(Color::LightRed);
        }
        self.logger.print("%u", &[Arg::from(self.failed)]);
        self.color(Color::White);
        self.logger.print(" failed\n", &[]);
        self.logger.print("========================================\n\n", &[]);

        let ok = self.failed == 0;
        if ok {
            self.color(Color::LightGreen);
            self.logger.print("*** ALL TESTS PASSED ***\n", &[]);
        } else {
            self.color(Color::LightRed);
            self.logger.print("*** TESTS FAILED ***\n", &[]);
        }
        self.color(Color::LightGrey);
        ok
    }

    fn color(&mut self, fg: Color) {
        self.logger.console_mut().set_color(fg, Color::Black);
    }
}

/// `check!(runner, cond)` or `check!(runner, cond, "reason")`.
#[macro_export]
macro_rules! check {
    ($runner:expr, $cond:expr $(,)?) => {
        $runner.check($cond, stringify!($cond), "condition false")
    };
    ($runner:expr, $cond:expr, $reason:expr $(,)?) => {
        $runner.check($cond, stringify!($cond), $reason)
    };
}

/// `check_eq!(runner, expected, actual)`.
#[macro_export]
macro_rules! check_eq {
    ($runner:expr, $expected:expr, $actual:expr $(,)?) => {
        $runner.check(
            ($expected) == ($actual),
            concat!(stringify!($actual), " == ", stringify!($expected)),
            "values not equal",
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::Recorder;
    use crate::logger::Level;

    fn logger() -> Logger<Recorder, Recorder> {
        Logger::with_threshold(Recorder::new(), Recorder::new(), Level::Error)
    }

    #[test]
    fn test_suite_lines() {
        let mut logger = logger();
        let mut runner = TestRunner::new(&mut logger);
        runner.begin("format");
        check!(runner, 1 + 1 == 2);
        let line = line!() + 1;
        check_eq!(runner, 3, 1 + 1);
        runner.end();
        assert_eq!((runner.passed(), runner.failed()), (1, 1));
        assert!(!runner.finish());

        let text = logger.console().text();
        assert!(text.contains("[format] Running tests...\n"));
        assert!(text.contains("[PASS] 1 + 1 == 2\n"));
        let fail = format!("[FAIL] 1 + 1 == 3: values not equal ({}:{})\n", file!(), line);
        assert!(text.contains(&fail), "{}", text);
        assert!(text.contains("[format] 1 passed, 1 failed\n"));
        assert!(text.contains("  TOTAL: 1 passed, 1 failed\n"));
        assert!(text.ends_with("*** TESTS FAILED ***\n"));
    }

    #[test]
    fn test_header_matches_transcript() {
        let mut logger = logger();
        let _runner = TestRunner::new(&mut logger);
        assert_eq!(
            logger.console().text(),
            "\n========================================\n       OS-DEV KERNEL TEST SUITE        \n\
             ========================================\n\n"
        );
    }

    #[test]
    fn test_harness_ignores_log_threshold() {
        let mut logger = logger();
        let runner = TestRunner::new(&mut logger);
        assert!(runner.finish());
        assert!(logger.console().text().ends_with("*** ALL TESTS PASSED ***\n"));
        assert!(!logger.console().text().contains("[INFO]"));
    }

    #[test]
    fn test_totals_span_suites() {
        let mut logger = logger();
        let mut runner = TestRunner::new(&mut logger);
        runner.begin("a");
        check!(runner, true);
        check!(runner, true, "never shown");
        runner.end();
        runner.begin("b");
        check!(runner, false, "expected failure");
        runner.end();
        assert_eq!(runner.passed(), 2);
        assert_eq!(runner.failed(), 1);
        runner.finish();
        let text = logger.console().text();
        assert!(text.contains("[b] 0 passed, 1 failed\n"));
        assert!(text.contains("[FAIL] false: expected failure ("));
    }

    #[test]
    fn test_tag_colors() {
        let mut logger = logger();
        let mut runner = TestRunner::new(&mut logger);
        runner.begin("colors");
        runner.pass("ok");
        runner.fail("bad", "because", Location::caller());
        let colors = logger.console().colors();
        let fgs: Vec<Color> = colors.iter().map(|(fg, _)| *fg).collect();
        assert_eq!(
            &fgs[fgs.len() - 4..],
            &[Color::LightGreen, Color::LightGrey, Color::LightRed, Color::LightGrey]
        );
    }
}
