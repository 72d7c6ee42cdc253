#![cfg(unix)]

use docraster::runner::MAX_LINE;
use docraster::{CommandLine, ProcessRunner, RasterError, SystemRunner};
use std::time::{Duration, Instant};

fn sh(script: &str) -> CommandLine {
    let mut cmd = CommandLine::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}

#[test]
fn success_returns_sanitized_combined_output() {
    let out = SystemRunner::default()
        .run(
            &sh("echo warn; echo; echo warn 1>&2; sleep 0.1; echo warn; echo ok"),
            Duration::from_secs(10),
        )
        .unwrap();
    assert_eq!(out, "warn\nok");
}

#[test]
fn nonzero_exit_is_extraction_failure() {
    let err = SystemRunner::default()
        .run(&sh("echo broken page 1>&2; exit 3"), Duration::from_secs(10))
        .unwrap_err();
    match err {
        RasterError::ExtractionFailed { output, .. } => assert_eq!(output, "broken page"),
        other => panic!("expected ExtractionFailed, got {other:?}"),
    }
}

#[test]
fn deadline_kills_and_reports_timeout() {
    let started = Instant::now();
    let err = SystemRunner::default()
        .run(&sh("echo starting; sleep 30"), Duration::from_secs(1))
        .unwrap_err();
    let elapsed = started.elapsed();
    assert!(err.is_timeout(), "{err:?}");
    assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");
    match err {
        RasterError::Timeout {
            output, timeout, ..
        } => {
            assert_eq!(timeout, Duration::from_secs(1));
            assert_eq!(output, "starting");
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[test]
fn runaway_warnings_are_collapsed_while_streaming() {
    let err = SystemRunner::new(50)
        .run(
            &sh("while :; do echo 'Warning: bad xref'; done"),
            Duration::from_secs(1),
        )
        .unwrap_err();
    match err {
        RasterError::Timeout { output, .. } => assert_eq!(output, "Warning: bad xref"),
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[test]
fn sub_second_timeout_is_reported_exactly() {
    let err = SystemRunner::default()
        .run(&sh("sleep 30"), Duration::from_millis(300))
        .unwrap_err();
    match &err {
        RasterError::Timeout { timeout, .. } => {
            assert_eq!(*timeout, Duration::from_millis(300))
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.starts_with("timed out after 300ms: "), "{message}");
}

#[test]
fn background_child_holding_pipes_does_not_stall_exit() {
    let started = Instant::now();
    let out = SystemRunner::default()
        .run(&sh("sleep 5 & echo done"), Duration::from_secs(10))
        .unwrap();
    let elapsed = started.elapsed();
    assert_eq!(out, "done");
    assert!(elapsed < Duration::from_secs(4), "took {elapsed:?}");
}

#[test]
fn background_child_does_not_mask_failure_status() {
    let err = SystemRunner::default()
        .run(&sh("sleep 5 & echo bad page 1>&2; exit 2"), Duration::from_secs(10))
        .unwrap_err();
    match err {
        RasterError::ExtractionFailed { output, .. } => assert_eq!(output, "bad page"),
        other => panic!("expected ExtractionFailed, got {other:?}"),
    }
}

#[test]
fn output_without_newlines_is_capped_per_line() {
    let err = SystemRunner::default()
        .run(&sh("yes | tr -d '\\n'"), Duration::from_secs(1))
        .unwrap_err();
    match err {
        RasterError::Timeout { output, .. } => {
            assert!(!output.is_empty());
            assert!(output.len() <= MAX_LINE, "kept {} bytes", output.len());
            assert!(output.bytes().all(|b| b == b'y'));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[test]
fn carriage_returns_end_lines() {
    let out = SystemRunner::default()
        .run(
            &sh("printf '10%%\\r20%%\\r20%%\\r\\ndone\\n'"),
            Duration::from_secs(10),
        )
        .unwrap();
    assert_eq!(out, "10%\n20%\ndone");
}

#[test]
fn extra_environment_reaches_child() {
    let mut cmd = sh("echo \"$DOCRASTER_TEST_VAR\"");
    cmd.env("DOCRASTER_TEST_VAR", "scratch-42");
    let out = SystemRunner::default()
        .run(&cmd, Duration::from_secs(10))
        .unwrap();
    assert_eq!(out, "scratch-42");
}

#[test]
fn missing_program_is_spawn_error() {
    let err = SystemRunner::default()
        .run(
            &CommandLine::new("docraster-no-such-binary"),
            Duration::from_secs(5),
        )
        .unwrap_err();
    assert!(matches!(err, RasterError::Spawn { .. }), "{err:?}");
}

#[test]
fn display_quotes_unsafe_arguments() {
    let mut cmd = CommandLine::new("convert");
    cmd.arg("-density").arg("150").arg("my file.pdf[0]").arg("it's.png");
    assert_eq!(
        cmd.display(),
        "convert -density 150 'my file.pdf[0]' 'it'\\''s.png'"
    );
}
