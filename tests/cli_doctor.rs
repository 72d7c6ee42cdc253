#![cfg(unix)]

use docraster::cli::{doctor, doctor_report};
use docraster::config::Config;
use docraster::SystemRunner;

fn config_with(convert: &str, pdfinfo: &str) -> Config {
    let mut cfg = Config::default();
    cfg.engine.convert = vec![convert.to_string()];
    cfg.engine.mogrify = vec!["true".to_string()];
    cfg.page_count.pdfinfo = pdfinfo.to_string();
    cfg
}

#[test]
fn doctor_succeeds_when_every_tool_runs() {
    let cfg = config_with("true", "true");
    let (report, ok) = doctor_report(&cfg, SystemRunner::default());
    assert!(ok);
    assert_eq!(report["ok"], true);
    assert_eq!(report["convert"]["command"], "true -version");
    assert!(doctor(&cfg).is_ok());
}

#[test]
fn doctor_fails_when_a_tool_is_missing() {
    let cfg = config_with("docraster-no-such-binary", "true");
    let (report, ok) = doctor_report(&cfg, SystemRunner::default());
    assert!(!ok);
    assert_eq!(report["ok"], false);
    assert_eq!(report["convert"]["ok"], false);
    assert_eq!(report["mogrify"]["ok"], true);

    let err = doctor(&cfg).unwrap_err();
    assert!(err.to_string().contains("unusable"), "{err}");
}

#[test]
fn doctor_fails_when_a_tool_exits_nonzero() {
    let cfg = config_with("true", "false");
    let (report, ok) = doctor_report(&cfg, SystemRunner::default());
    assert!(!ok);
    assert_eq!(report["pdfinfo"]["ok"], false);
    assert!(doctor(&cfg).is_err());
}
