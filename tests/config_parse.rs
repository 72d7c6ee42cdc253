use docraster::{config::Config, extractor::ExtractionRequest};

#[test]
fn parse_example_config() {
    let raw = include_str!("../docraster.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.output.density, "150");
    assert_eq!(cfg.engine.timeout_seconds, 300);
    assert_eq!(cfg.engine.convert, vec!["convert".to_string()]);
}

#[test]
fn partial_config_keeps_defaults() {
    let cfg: Config = toml::from_str("[engine]\ntimeout_seconds = 5\n").expect("parse TOML");
    assert_eq!(cfg.engine.timeout_seconds, 5);
    assert_eq!(cfg.engine.memory_limit, "256MiB");
    assert_eq!(cfg.output.formats, vec!["png".to_string()]);
    assert_eq!(cfg.quality.jpeg, 85);
}

#[test]
fn request_from_config() {
    let cfg: Config = toml::from_str(
        "[output]\nroot = \"out\"\nformats = [\"PNG\", \"jpg\"]\nsizes = [\"1000x\", \"300x\"]\nrolling = true\n",
    )
    .expect("parse TOML");
    let req = ExtractionRequest::from_config(&cfg.output, vec!["a.pdf".into()]).unwrap();
    assert_eq!(req.formats.len(), 2);
    assert_eq!(req.formats[0].as_str(), "png");
    assert_eq!(req.sizes.len(), 2);
    assert!(req.rolling);
    req.validate().unwrap();
}

#[test]
fn request_rejects_bad_size() {
    let cfg: Config = toml::from_str("[output]\nsizes = [\"../etc\"]\n").expect("parse TOML");
    assert!(ExtractionRequest::from_config(&cfg.output, vec![]).is_err());
}
