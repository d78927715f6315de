#[cfg(test)]
mod tests {
    use super::super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_is_valid() {
        let config = Config::parse("", ConfigFormat::Toml).unwrap();
        assert_eq!(config.tasks.workers, 2);
        assert_eq!(config.data.dir, "./data");
        assert_eq!(config.llm.router.retries_per_backend, 2);
        assert_eq!(config.ranker.sector_leaders.leaders, 2);
        assert!(config.llm.priority.is_empty());
    }

    #[test]
    fn test_default_backends_are_remote_only() {
        let (candidates, explicit) = LlmConfig::default().backend_candidates();
        assert!(!explicit);
        let kinds: Vec<BackendKind> = candidates.iter().map(|b| b.kind).collect();
        assert!(!kinds.contains(&BackendKind::Ollama));
        assert_eq!(kinds.len(), BackendKind::ALL.len() - 1);
        assert!(candidates.iter().all(|b| b.api_key.is_none()));
    }

    #[test]
    fn test_toml_overrides() {
        let content = r#"
            [llm]
            priority = ["ollama", "qwen"]

            [llm.router]
            retries_per_backend = 0
            backoff_ms = 250

            [[llm.backends]]
            kind = "ollama"
            model = "qwen2.5:14b"

            [tasks]
            workers = 4

            [ranker.undervalued]
            pe_threshold = 12.0

            [overview]
            sectors = ["Banking", "Semiconductors"]
        "#;
        let config = Config::parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(config.llm.priority, vec![BackendKind::Ollama, BackendKind::Qwen]);
        assert_eq!(config.llm.router.backoff_ms, 250);
        assert_eq!(config.llm.router.min_response_chars, 10);
        let (candidates, explicit) = config.llm.backend_candidates();
        assert!(explicit);
        assert_eq!(candidates.len(), 1);
        assert_eq!(config.llm.backends[0].model.as_deref(), Some("qwen2.5:14b"));
        assert_eq!(config.tasks.workers, 4);
        assert_eq!(config.ranker.undervalued.pe_threshold, 12.0);
        assert_eq!(config.ranker.undervalued.pb_threshold, 1.5);
        assert_eq!(config.overview.sectors.len(), 2);
    }

    #[test]
    fn test_yaml_config() {
        let content = "
data:
  dir: /srv/market
  archive_path: /srv/market/results.jsonl
tasks:
  workers: 3
";
        let config = Config::parse(content, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.data.dir, "/srv/market");
        assert_eq!(config.data.archive_path.as_deref(), Some("/srv/market/results.jsonl"));
        assert_eq!(config.tasks.workers, 3);
    }

    #[test]
    fn test_unbalanced_weights_are_normalised() {
        let content = "[ranker.undervalued.weights]\npe = 3.0\npb = 1.0\n";
        let config = Config::parse(content, ConfigFormat::Toml).unwrap();
        assert!((config.ranker.undervalued.weights.pe - 0.75).abs() < 1e-12);
        assert!(config.ranker.invalid_weight_tables().is_empty());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("equirank.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("equirank.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("equirank")), ConfigFormat::Toml);
    }
}
