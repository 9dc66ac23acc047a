#[cfg(test)]
mod config_tests {
    use iaito::config::Config;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.plugins.enabled);
        assert!(config.decompiler.extra_args.is_empty());
    }

    #[test]
    fn test_config_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");

        let yaml = r#"
plugins:
  enabled: true
  extra_dirs: ["/opt/a", "/opt/b"]
decompiler:
  analyze: true
  extra_args: ["-e", "bin.cache=true"]
"#;
        std::fs::write(&config_path, yaml).unwrap();

        let loaded = Config::load_from_file(&config_path).unwrap();
        assert_eq!(
            loaded.plugins.extra_dirs,
            vec![PathBuf::from("/opt/a"), PathBuf::from("/opt/b")]
        );
        assert!(loaded.decompiler.analyze);
        assert_eq!(loaded.decompiler.extra_args.len(), 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(Config::load_from_file(dir.path().join("absent.yaml")).is_err());
    }
}

#[cfg(test)]
mod decompiler_tests {
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use iaito::decompiler::pdc::PARSE_WARNING;
    use iaito::decompiler::{CodeAnnotation, Decompiler, PdcDecompiler};
    use iaito::engine::AnalysisEngine;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Engine that answers from a fixed table and records every command
    #[derive(Default)]
    struct ScriptedEngine {
        answers: HashMap<String, String>,
        commands: Mutex<Vec<String>>,
    }

    impl ScriptedEngine {
        fn with(answers: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                answers: answers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                commands: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AnalysisEngine for ScriptedEngine {
        async fn cmd(&self, command: &str) -> Result<String> {
            self.commands.lock().unwrap().push(command.to_string());
            match self.answers.get(command) {
                Some(answer) => Ok(answer.clone()),
                None => bail!("unknown command {command}"),
            }
        }
    }

    #[tokio::test]
    async fn test_decompile_end_to_end() {
        let engine = ScriptedEngine::with(&[(
            "pdcj @ 4096",
            r#"{"code":"mov eax, 1","annotations":[{"type":"offset","start":0,"end":3,"offset":4096}],"errors":[]}"#,
        )]);
        let (decompiler, mut finished) = PdcDecompiler::new(engine.clone());

        assert!(decompiler.decompile_at(4096));
        let code = finished.recv().await.unwrap();

        assert_eq!(code.code, "mov eax, 1");
        assert_eq!(code.annotations, vec![CodeAnnotation::offset(0, 3, 4096)]);
        assert_eq!(*engine.commands.lock().unwrap(), vec!["pdcj @ 4096"]);
    }

    #[tokio::test]
    async fn test_engine_failure_gives_warning() {
        let engine = ScriptedEngine::with(&[]);
        let (decompiler, mut finished) = PdcDecompiler::new(engine);

        assert!(decompiler.decompile_at(1));
        let code = finished.recv().await.unwrap();
        assert_eq!(code.code, PARSE_WARNING);
        assert!(code.annotations.is_empty());
    }

    #[tokio::test]
    async fn test_availability() {
        let listed = ScriptedEngine::with(&[("e cmd.pdc=?", "pdc\npdg\n")]);
        let (decompiler, _rx) = PdcDecompiler::new(listed);
        assert!(decompiler.is_available().await);

        let missing = ScriptedEngine::with(&[("e cmd.pdc=?", "r2dec\n")]);
        let (decompiler, _rx) = PdcDecompiler::new(missing);
        assert!(!decompiler.is_available().await);

        let broken = ScriptedEngine::with(&[]);
        let (decompiler, _rx) = PdcDecompiler::new(broken);
        assert!(!decompiler.is_available().await);
    }
}
