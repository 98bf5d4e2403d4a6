use sop_scout::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../sop-scout.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert!(cfg.prompt.ctx_size > cfg.prompt.predict_tokens);
    assert!(!cfg.paths.out_dir.is_empty());
    assert_eq!(cfg.resources.pack_root, "offline-pack");
    assert_eq!(cfg.extraction.min_total_chars, 500);
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let cfg: Config = toml::from_str("[logging]\nlevel = \"debug\"\n").expect("parse TOML");
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.download.max_redirects, 5);
    assert_eq!(cfg.inference.ramp_start_percent, 10);
    assert!(cfg.security.reject_url_inputs);
}
