//! Parser for the `kiro-cli chat --no-interactive /usage` report
//!
//! The report is a box-drawn TUI panel, roughly:
//!
//! ```text
//! │ KIRO POWER                                                   │
//! │ Credits   ██████░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░ 14% │
//! │           (1428.4 of 10000 covered in plan, resets on 03/01)  │
//! ```
//!
//! Column widths and borders are not stable between CLI releases, so each
//! field is pulled out by its own independent rule instead of by position.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc};
use regex_lite::Regex;

use crate::core::{ProviderError, UsageSnapshot, DEFAULT_CREDITS_TOTAL, DEFAULT_PLAN_NAME};

/// CSI (`ESC [ ... letter`) and OSC (`ESC ] ... BEL` or `ESC ] ... ESC \`)
static CONTROL_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1B\[[0-9;?]*[A-Za-z]|\x1B\][^\x07\x1B]*(?:\x07|\x1B\\)")
        .expect("control sequence pattern")
});

static BORDERED_PLAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[│┃|][ \t]*(KIRO[ \t]+\w+)").expect("plan pattern"));

static PLAN_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Plan:[ \t]*([^\r\n]*)").expect("plan label pattern"));

static PROGRESS_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[█▉▊▋▌▍▎▏▓▒░]+\s*(\d+)%").expect("progress pattern")
});

static CREDITS_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((\d[\d,]*(?:\.\d+)?)\s+of\s+(\d[\d,]*(?:\.\d+)?)").expect("credits pattern")
});

static RESET_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)resets on (\d{1,2})/(\d{1,2})").expect("reset pattern"));

const AUTH_MARKERS: &[&str] = &["not logged in", "login required"];

/// Parse a raw report, resolving the reset date against the local clock
pub fn parse(raw: &str) -> Result<UsageSnapshot, ProviderError> {
    parse_at(raw, &Local::now())
}

/// Parse a raw report, resolving the reset date against `now`
pub fn parse_at<Tz: TimeZone>(raw: &str, now: &DateTime<Tz>) -> Result<UsageSnapshot, ProviderError> {
    let text = strip_control_sequences(raw);

    if is_not_authenticated(&text) {
        return Err(ProviderError::NotAuthenticated);
    }

    let plan_name = extract_plan_name(&text).unwrap_or_else(|| DEFAULT_PLAN_NAME.to_string());
    let percent = extract_percent(&text).unwrap_or(0);
    let (credits_used, credits_total) =
        extract_credits(&text).unwrap_or((0.0, DEFAULT_CREDITS_TOTAL));
    let resets_at = extract_reset_date(&text)
        .and_then(|(month, day)| resolve_reset_date(month, day, now));

    // All defaults means the text was not a usage report at all.
    if percent == 0 && credits_used == 0.0 && credits_total == DEFAULT_CREDITS_TOTAL {
        return Err(ProviderError::Parse("Could not parse usage output".to_string()));
    }

    let mut usage = UsageSnapshot::new(plan_name, credits_used, credits_total, percent);
    usage.resets_at = resets_at;
    Ok(usage)
}

/// Remove terminal control sequences, leaving every other character intact
pub fn strip_control_sequences(text: &str) -> String {
    let mut cleaned = CONTROL_SEQUENCE.replace_all(text, "").into_owned();
    // Removing one sequence can splice together another, e.g. "\x1B\x1B[0m[31m".
    loop {
        let next = CONTROL_SEQUENCE.replace_all(&cleaned, "").into_owned();
        if next.len() == cleaned.len() {
            return cleaned;
        }
        cleaned = next;
    }
}

/// Whether the tool says nobody is logged in
pub fn is_not_authenticated(text: &str) -> bool {
    let lower = text.to_lowercase();
    AUTH_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// "│ KIRO POWER" first, then a "Plan: ..." line
pub fn extract_plan_name(text: &str) -> Option<String> {
    if let Some(caps) = BORDERED_PLAN.captures(text) {
        return caps.get(1).map(|m| m.as_str().trim().to_string());
    }

    PLAN_LABEL
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches(|c: char| c.is_whitespace() || matches!(c, '│' | '┃' | '|')))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Percent printed right after the progress bar, clamped to 100
pub fn extract_percent(text: &str) -> Option<u8> {
    let caps = PROGRESS_PERCENT.captures(text)?;
    let value: u32 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.min(100) as u8)
}

/// `(used of total` from the credits clause
pub fn extract_credits(text: &str) -> Option<(f64, f64)> {
    let caps = CREDITS_CLAUSE.captures(text)?;
    let used = parse_number(caps.get(1)?.as_str())?;
    let total = parse_number(caps.get(2)?.as_str())?;
    Some((used, total))
}

/// Month and day from "resets on MM/DD"
pub fn extract_reset_date(text: &str) -> Option<(u32, u32)> {
    let caps = RESET_DATE.captures(text)?;
    let month = caps.get(1)?.as_str().parse().ok()?;
    let day = caps.get(2)?.as_str().parse().ok()?;
    Some((month, day))
}

/// Next occurrence of `month/day` (local midnight in `now`'s timezone).
///
/// This year if that moment is still strictly ahead of `now`, otherwise next
/// year. Impossible dates resolve to `None`.
pub fn resolve_reset_date<Tz: TimeZone>(
    month: u32,
    day: u32,
    now: &DateTime<Tz>,
) -> Option<DateTime<Utc>> {
    let tz = now.timezone();
    let midnight = |year: i32| {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        tz.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).earliest()
    };

    match midnight(now.year()) {
        Some(this_year) if this_year > *now => Some(this_year.with_timezone(&Utc)),
        _ => midnight(now.year() + 1).map(|next| next.with_timezone(&Utc)),
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.replace(',', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap()
    }

    const POWER_REPORT: &str = "\
│ KIRO POWER                                                                  │
│ Credits   ██████░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░ 14% │
│           (1428.4 of 10000 covered in plan, resets on 03/01)                │";

    const FREE_REPORT: &str = "\
│ KIRO FREE                                                                   │
│ Credits   ████████████████████████████████████████████████████████████ 100% │
│           (50 of 50 covered in plan, resets on 02/20)                       │";

    #[test]
    fn test_parse_power_plan() {
        let usage = parse_at(POWER_REPORT, &now()).unwrap();
        assert_eq!(usage.plan_name, "KIRO POWER");
        assert_eq!(usage.percent, 14);
        assert!((usage.credits_used - 1428.4).abs() < 0.01);
        assert_eq!(usage.credits_total, 10000.0);
        assert_eq!(
            usage.resets_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_free_plan() {
        let usage = parse_at(FREE_REPORT, &now()).unwrap();
        assert_eq!(usage.plan_name, "KIRO FREE");
        assert_eq!(usage.percent, 100);
        assert_eq!(usage.credits_used, 50.0);
        assert_eq!(usage.credits_total, 50.0);
        assert!(usage.resets_at.is_some());
    }

    #[test]
    fn test_parse_elided_bar() {
        let report = "│ KIRO POWER │\n│ Credits ██████░░...░ 14% │\n│ (1428.4 of 10000 covered in plan, resets on 03/01) │";
        let usage = parse_at(report, &now()).unwrap();
        assert_eq!(usage.plan_name, "KIRO POWER");
        assert_eq!(usage.percent, 14);
        assert_eq!(usage.credits_total, 10000.0);
        assert!(usage.resets_at.is_some());
    }

    #[test]
    fn test_parse_with_ansi_codes() {
        let report = "\x1b[32m│ KIRO POWER\x1b[0m\n██████ 25%\n(2500 of 10000 covered in plan, resets on 04/15)";
        let usage = parse_at(report, &now()).unwrap();
        assert_eq!(usage.plan_name, "KIRO POWER");
        assert_eq!(usage.percent, 25);
        assert_eq!(usage.credits_used, 2500.0);
        assert_eq!(usage.credits_total, 10000.0);
    }

    #[test]
    fn test_parse_escapes_inside_fields() {
        let report = "\x1b[1m│\x1b[0m \x1b[38;5;208mKIRO PRO\x1b[0m\n\
                      \x1b[33m████\x1b[90m░░░░\x1b[0m \x1b[1m40%\x1b[0m\n\
                      \x1b]0;kiro\x07(\x1b[1m400\x1b[0m of 1000 covered in plan)";
        let usage = parse_at(report, &now()).unwrap();
        assert_eq!(usage.plan_name, "KIRO PRO");
        assert_eq!(usage.percent, 40);
        assert_eq!(usage.credits_used, 400.0);
        assert_eq!(usage.credits_total, 1000.0);
        assert!(usage.resets_at.is_none());
    }

    #[test]
    fn test_not_logged_in() {
        let err = parse_at("Error: Not logged in. Please run kiro-cli login", &now()).unwrap_err();
        assert!(matches!(err, ProviderError::NotAuthenticated));
    }

    #[test]
    fn test_auth_check_takes_precedence() {
        let report = format!("{}\nerror: LOGIN REQUIRED", POWER_REPORT);
        let err = parse_at(&report, &now()).unwrap_err();
        assert!(matches!(err, ProviderError::NotAuthenticated));
    }

    #[test]
    fn test_random_text_fails() {
        let err = parse_at("Some random text", &now()).unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
        assert_eq!(err.kind(), "parse_failed");
    }

    #[test]
    fn test_plan_only_fails() {
        let err = parse_at("│ KIRO POWER │\nresets on 03/01", &now()).unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn test_parse_failure_detail_omits_raw_text() {
        let raw = "garbled output with secret-token-123";
        let err = parse_at(raw, &now()).unwrap_err();
        assert!(!err.to_string().contains("secret-token-123"));
    }

    #[test]
    fn test_parse_is_repeatable() {
        let first = parse_at(POWER_REPORT, &now()).unwrap();
        let second = parse_at(POWER_REPORT, &now()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_defaults_when_only_percent_found() {
        let usage = parse_at("░░░░ 3%", &now()).unwrap();
        assert_eq!(usage.plan_name, "Kiro");
        assert_eq!(usage.percent, 3);
        assert_eq!(usage.credits_used, 0.0);
        assert_eq!(usage.credits_total, 50.0);
        assert!(usage.resets_at.is_none());
    }

    #[test]
    fn test_strip_control_sequences() {
        assert_eq!(strip_control_sequences("\x1b[1;32mgreen\x1b[0m"), "green");
        assert_eq!(strip_control_sequences("\x1b[?25lhidden\x1b[?25h"), "hidden");
        assert_eq!(strip_control_sequences("\x1b]0;title\x07body"), "body");
        assert_eq!(strip_control_sequences("\x1b]8;;https://kiro.dev\x1b\\link"), "link");
        assert_eq!(strip_control_sequences("│ KIRO █░ 5% (1 of 2)"), "│ KIRO █░ 5% (1 of 2)");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let samples = [
            POWER_REPORT,
            "\x1b[32m│ KIRO POWER\x1b[0m\n██████ 25%",
            "\x1b\x1b[0m[31mnested",
            "plain text",
        ];
        for sample in samples {
            let once = strip_control_sequences(sample);
            assert_eq!(strip_control_sequences(&once), once);
            assert!(!once.contains("\x1b["));
        }
    }

    #[test]
    fn test_is_not_authenticated() {
        assert!(is_not_authenticated("You are NOT LOGGED IN"));
        assert!(is_not_authenticated("login required to continue"));
        assert!(!is_not_authenticated("logged in as someone"));
    }

    #[test]
    fn test_extract_plan_name_bordered() {
        assert_eq!(extract_plan_name("│ KIRO POWER   │").as_deref(), Some("KIRO POWER"));
        assert_eq!(extract_plan_name("┃KIRO FREE┃").as_deref(), Some("KIRO FREE"));
        assert_eq!(extract_plan_name("| KIRO PRO+ |").as_deref(), Some("KIRO PRO"));
    }

    #[test]
    fn test_extract_plan_name_label_fallback() {
        assert_eq!(
            extract_plan_name("Plan: Kiro Pro Plus\nCredits: 5").as_deref(),
            Some("Kiro Pro Plus")
        );
        assert_eq!(extract_plan_name("│ Plan:   Team   │").as_deref(), Some("Team"));
        assert!(extract_plan_name("Plan:\n").is_none());
        assert!(extract_plan_name("KIRO POWER without border").is_none());
    }

    #[test]
    fn test_extract_percent() {
        assert_eq!(extract_percent("██████░░░░ 14%"), Some(14));
        assert_eq!(extract_percent("▓▓▒▒ 60%"), Some(60));
        assert_eq!(extract_percent("██████████100%"), Some(100));
        assert_eq!(extract_percent("███ 250%"), Some(100));
        assert_eq!(extract_percent("used 14%"), None);
    }

    #[test]
    fn test_extract_credits() {
        assert_eq!(extract_credits("(1428.4 of 10000 covered in plan)"), Some((1428.4, 10000.0)));
        assert_eq!(extract_credits("(0.25 of 50.5)"), Some((0.25, 50.5)));
        assert_eq!(extract_credits("(1,250 of 10,000 covered)"), Some((1250.0, 10000.0)));
        assert_eq!(extract_credits("1428 of 10000"), None);
    }

    #[test]
    fn test_extract_reset_date() {
        assert_eq!(extract_reset_date("resets on 03/01)"), Some((3, 1)));
        assert_eq!(extract_reset_date("Resets on 12/31"), Some((12, 31)));
        assert_eq!(extract_reset_date("resets soon"), None);
    }

    #[test]
    fn test_resolve_reset_date_later_this_year() {
        let resolved = resolve_reset_date(4, 15, &now()).unwrap();
        assert_eq!(resolved, Utc.with_ymd_and_hms(2026, 4, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_resolve_reset_date_rolls_to_next_year() {
        let resolved = resolve_reset_date(1, 5, &now()).unwrap();
        assert_eq!(resolved, Utc.with_ymd_and_hms(2027, 1, 5, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_resolve_reset_date_today_is_past() {
        // Midnight today has already passed at noon.
        let resolved = resolve_reset_date(2, 10, &now()).unwrap();
        assert_eq!(resolved.year(), 2027);
    }

    #[test]
    fn test_resolve_reset_date_invalid() {
        assert!(resolve_reset_date(13, 1, &now()).is_none());
        assert!(resolve_reset_date(2, 30, &now()).is_none());
        assert!(resolve_reset_date(0, 10, &now()).is_none());
    }

    #[test]
    fn test_invalid_reset_date_is_not_fatal() {
        let report = "██ 14%\n(10 of 100 covered in plan, resets on 02/31)";
        let usage = parse_at(report, &now()).unwrap();
        assert_eq!(usage.percent, 14);
        assert!(usage.resets_at.is_none());
    }

    #[test]
    fn test_resolve_reset_date_respects_timezone() {
        let tz = chrono::FixedOffset::east_opt(9 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let resolved = resolve_reset_date(3, 1, &now).unwrap();
        // Local midnight at +09:00 is 15:00 UTC the previous day.
        assert_eq!(resolved, Utc.with_ymd_and_hms(2026, 2, 28, 15, 0, 0).unwrap());
    }
}
