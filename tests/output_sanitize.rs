use docraster::sanitize::{sanitize, LineCollapser};

#[test]
fn drops_blanks_and_collapses_repeats() {
    assert_eq!(sanitize("warn\n\nwarn\nwarn\nok\n"), "warn\nok");
}

#[test]
fn keeps_non_consecutive_repeats() {
    assert_eq!(sanitize("a\nb\na\n"), "a\nb\na");
}

#[test]
fn normalizes_line_endings() {
    assert_eq!(sanitize("one\r\n\r\n  \none\r\ntwo"), "one\ntwo");
}

#[test]
fn endless_warning_stays_one_line() {
    let mut c = LineCollapser::with_limit(10);
    for _ in 0..100_000 {
        c.push("**** Warning: invalid xref entry\n");
    }
    assert_eq!(c.len(), 1);
    assert_eq!(c.finish(), "**** Warning: invalid xref entry");
}

#[test]
fn limit_summarizes_overflow() {
    let mut c = LineCollapser::with_limit(2);
    for i in 0..5 {
        c.push(&format!("line {i}"));
    }
    assert_eq!(c.finish(), "line 0\nline 1\n... (3 further lines omitted)");
}
