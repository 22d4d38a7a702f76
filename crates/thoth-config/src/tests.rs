#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn default_settings_are_internally_consistent() {
        let settings = Settings::default();
        assert_eq!(settings.storage.db_path, "./data/thoth.db");
        assert!(settings.search.hybrid_vector_weight > 0.0 && settings.search.hybrid_vector_weight < 1.0);
    }

    #[test]
    fn default_rag_chunking_matches_search_contract() {
        let search = SearchConfig::default();
        assert_eq!(search.chunk_size_tokens, 1000);
        assert_eq!(search.chunk_overlap_tokens, 200);
    }

    #[test]
    fn env_override_replaces_db_path() {
        std::env::set_var("THOTH_STORAGE__DB_PATH", "/tmp/override.db");
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings).unwrap();
        assert_eq!(settings.storage.db_path, "/tmp/override.db");
        std::env::remove_var("THOTH_STORAGE__DB_PATH");
    }

    #[test]
    fn secrets_never_come_from_toml_file() {
        let toml_src = r#"
            [llm.openai]
            model = "gpt-4o-mini"
            base_url = "https://api.openai.com/v1"
        "#;
        let settings: Settings = toml::from_str(toml_src).unwrap();
        assert!(settings.llm.openai.unwrap().api_key.is_none());
    }
}
