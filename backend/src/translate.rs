//! Translation of raw check/lint reply text into diagnostic records.
//!
//! Two regex-driven grammars over the joined normal-channel lines.
//! Both share the `<file>:<line>:<col>:` header; they differ in how
//! continuation lines attach to the message and in the severity they
//! assign. Pure functions with no process plumbing, so the grammars can
//! be tested on their own.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use hsmod_types::{DiagnosticRecord, Note, Region, Severity, Source};

/// Header of one reported issue. The flag token distinguishes
/// warnings (`Warning:`/`warning:`) from errors (`*` or absent).
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^(?P<file>\S*):(?P<line>\d+):(?P<col>\d+):(?:\s*(?P<flag>\*|[Ww]arning:)\s+)?(?P<rest>.*)$",
    )
    .expect("issue header pattern is valid")
});

struct RawIssue<'a> {
    file: &'a str,
    line: u32,
    col: u32,
    flag: Option<&'a str>,
    rest: &'a str,
    /// Text between this header line and the next header (or end).
    block: &'a str,
}

/// Split reply text into issues: each header match plus the lines
/// following it up to the next header.
fn issues(text: &str) -> Vec<RawIssue<'_>> {
    let matches: Vec<regex::Captures<'_>> = HEADER_RE.captures_iter(text).collect();
    let mut found = Vec::with_capacity(matches.len());
    for (idx, caps) in matches.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let (Some(file), Some(rest)) = (caps.name("file"), caps.name("rest")) else {
            continue;
        };
        let Some(line) = caps.name("line").and_then(|m| m.as_str().parse().ok()) else {
            continue;
        };
        let Some(col) = caps.name("col").and_then(|m| m.as_str().parse().ok()) else {
            continue;
        };
        let next_start = matches
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        found.push(RawIssue {
            file: file.as_str(),
            line,
            col,
            flag: caps.name("flag").map(|m| m.as_str()),
            rest: rest.as_str(),
            block: &text[whole.end()..next_start],
        });
    }
    found
}

fn continuation_lines(block: &str) -> impl Iterator<Item = &str> {
    block.strip_prefix('\n').unwrap_or(block).lines()
}

/// Check details continue on lines indented (optionally after a `*`).
fn is_check_continuation(line: &str) -> bool {
    let rest = line.strip_prefix('*').unwrap_or(line);
    rest.chars().next().is_some_and(char::is_whitespace)
}

/// The tool reports paths relative to the directory it was launched
/// in; reconstitute the absolute path the editor expects.
fn reconcile_path(project_dir: &Path, reported: &str) -> PathBuf {
    let path = Path::new(reported);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        normalize(&project_dir.join(path))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out.iter().collect()
}

fn record(
    project_dir: &Path,
    issue: &RawIssue<'_>,
    level: Severity,
    message: String,
) -> DiagnosticRecord {
    DiagnosticRecord::new(
        level,
        Note::new(message),
        Region::line_to_column(issue.line, issue.col),
        Source::new(reconcile_path(project_dir, issue.file), None),
    )
}

/// Translate `check` output.
///
/// `<file>:<line>:<col>: [flag] <details…>` where details may continue
/// on subsequent indented lines. Classified as a warning only when the
/// flag token case-insensitively starts with "warning".
#[must_use]
pub fn translate_check(project_dir: &Path, text: &str) -> Vec<DiagnosticRecord> {
    issues(text)
        .iter()
        .map(|issue| {
            let level = match issue.flag {
                Some(flag) if flag.to_lowercase().starts_with("warning") => Severity::Warning,
                _ => Severity::Error,
            };
            let mut message = issue.rest.trim_start().to_string();
            for line in continuation_lines(issue.block) {
                if !is_check_continuation(line) {
                    break;
                }
                message.push('\n');
                message.push_str(line);
            }
            record(project_dir, issue, level, message)
        })
        .collect()
}

/// Translate `lint` output.
///
/// `<file>:<line>:<col>: <message>` with any following lines up to the
/// next issue attached as details. Always a hint; lint output carries
/// no correction data.
#[must_use]
pub fn translate_lint(project_dir: &Path, text: &str) -> Vec<DiagnosticRecord> {
    issues(text)
        .iter()
        .map(|issue| {
            let mut lines: Vec<&str> = continuation_lines(issue.block).collect();
            while lines.last().is_some_and(|line| line.trim().is_empty()) {
                lines.pop();
            }
            let mut message = issue.rest.trim_start().to_string();
            for line in lines {
                message.push('\n');
                message.push_str(line);
            }
            record(project_dir, issue, Severity::Hint, message)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsmod_types::Position;

    fn proj() -> PathBuf {
        PathBuf::from("/proj")
    }

    #[test]
    fn check_warning_scenario() {
        let records = translate_check(&proj(), "Foo.hs:3:7: Warning: x shadows y");
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.level(), Severity::Warning);
        assert_eq!(rec.message(), "x shadows y");
        assert_eq!(rec.region().from(), Position::new(3, 1));
        assert_eq!(rec.region().to(), Position::new(3, 7));
        assert_eq!(rec.source().file(), Path::new("/proj/Foo.hs"));
        assert_eq!(rec.source().project(), None);
    }

    #[test]
    fn check_without_flag_is_an_error() {
        let records = translate_check(&proj(), "Foo.hs:5:1: parse error on input");
        assert_eq!(records[0].level(), Severity::Error);
    }

    #[test]
    fn check_star_flag_is_an_error() {
        let records = translate_check(&proj(), "Foo.hs:5:1: * Not in scope: bar");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level(), Severity::Error);
        assert_eq!(records[0].message(), "Not in scope: bar");
    }

    #[test]
    fn check_lowercase_warning_flag() {
        let records = translate_check(&proj(), "Foo.hs:3:7: warning: defaulting");
        assert_eq!(records[0].level(), Severity::Warning);
    }

    #[test]
    fn check_attaches_indented_continuation_lines() {
        let text = "Foo.hs:8:3: Not in scope: frobnicate\n  Perhaps you meant one of:\n    frobnicate2\nBar.hs:1:1: parse error";
        let records = translate_check(&proj(), text);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].message(),
            "Not in scope: frobnicate\n  Perhaps you meant one of:\n    frobnicate2"
        );
        assert_eq!(records[1].source().file(), Path::new("/proj/Bar.hs"));
    }

    #[test]
    fn check_stops_details_at_unindented_line() {
        let text = "Foo.hs:8:3: first\n  detail\nnot a detail line";
        let records = translate_check(&proj(), text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message(), "first\n  detail");
    }

    #[test]
    fn absolute_reported_path_passes_through() {
        let records = translate_check(&proj(), "/elsewhere/Foo.hs:1:1: boom");
        assert_eq!(records[0].source().file(), Path::new("/elsewhere/Foo.hs"));
    }

    #[test]
    fn relative_reported_path_is_normalized() {
        let records = translate_check(&proj(), "./src/../Foo.hs:1:1: boom");
        assert_eq!(records[0].source().file(), Path::new("/proj/Foo.hs"));
    }

    #[test]
    fn lint_scenario_joins_continuation_lines() {
        let text = "Foo.hs:10:1: Eta reduce\nFound:\n  f x = g x";
        let records = translate_lint(&proj(), text);
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.level(), Severity::Hint);
        assert_eq!(rec.message(), "Eta reduce\nFound:\n  f x = g x");
        assert_eq!(rec.region().to(), Position::new(10, 1));
    }

    #[test]
    fn lint_splits_issues_on_headers() {
        let text = "Foo.hs:10:1: Eta reduce\nFound:\n  f x = g x\n\nFoo.hs:20:5: Redundant bracket\nFound:\n  (x)";
        let records = translate_lint(&proj(), text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message(), "Eta reduce\nFound:\n  f x = g x");
        assert_eq!(records[1].message(), "Redundant bracket\nFound:\n  (x)");
    }

    #[test]
    fn lint_is_always_a_hint() {
        let records = translate_lint(&proj(), "Foo.hs:10:1: Warning: Eta reduce\nFound: f");
        assert_eq!(records[0].level(), Severity::Hint);
        // The flag token is consumed by the header, not the message.
        assert_eq!(records[0].message(), "Eta reduce\nFound: f");
    }

    #[test]
    fn no_issues_in_unrelated_text() {
        assert!(translate_check(&proj(), "").is_empty());
        assert!(translate_check(&proj(), "ghc-mod: some banner\nloaded").is_empty());
        assert!(translate_lint(&proj(), "").is_empty());
    }

    #[test]
    fn indented_header_lines_are_not_new_issues() {
        let text = "Foo.hs:8:3: top\n  Bar.hs:1:2: mentioned in detail";
        let records = translate_check(&proj(), text);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].message(),
            "top\n  Bar.hs:1:2: mentioned in detail"
        );
    }
}
