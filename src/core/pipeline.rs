use crate::config::cli::STDIO_PATH;
use crate::core::builder::build_family_tree;
use crate::core::emitter::emit_dot;
use crate::core::encoding::decode_input;
use crate::core::parser::RecordTree;
use crate::core::selector::select_subgraph;
use crate::core::{ConfigProvider, ConversionResult, Pipeline, Storage};
use crate::domain::settings::ConversionSettings;
use crate::utils::error::Result;

/// Suffix of the sibling file each output is written to before it is moved into place.
pub const STAGING_SUFFIX: &str = ".tmp";

/// Builds, selects and emits. Pure over its inputs.
pub fn convert_records(records: &RecordTree, settings: &ConversionSettings) -> Result<ConversionResult> {
    let tree = build_family_tree(records)?;
    let graph = select_subgraph(&tree, &settings.selection)?;
    let output = emit_dot(&tree, &graph, &settings.style);

    Ok(ConversionResult {
        dot: output.dot,
        node_map: output.node_map,
        individual_count: graph.individual_count(),
        family_count: graph.family_count(),
        edge_count: output.edge_count,
    })
}

/// 純文字進、DOT 文字出；給外部宿主直接呼叫
pub fn convert_str(text: &str, settings: &ConversionSettings) -> Result<String> {
    let records = RecordTree::parse(text)?;
    convert_records(&records, settings).map(|result| result.dot)
}

pub fn convert_bytes(bytes: Vec<u8>, settings: &ConversionSettings) -> Result<String> {
    let text = decode_input(bytes, settings.encoding)?;
    convert_str(&text, settings)
}

pub struct GedcomPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    settings: ConversionSettings,
}

impl<S: Storage, C: ConfigProvider> GedcomPipeline<S, C> {
    /// 設定錯誤會在讀取輸入之前回報
    pub fn new(storage: S, config: C) -> Result<Self> {
        let settings = config.settings()?;
        Ok(Self {
            storage,
            config,
            settings,
        })
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for GedcomPipeline<S, C> {
    async fn extract(&self) -> Result<RecordTree> {
        let input_path = self.config.input_path();
        tracing::debug!("Reading GEDCOM input from: {}", input_path);

        let bytes = self.storage.read_file(input_path).await?;
        tracing::debug!("Read {} bytes", bytes.len());

        let text = decode_input(bytes, self.settings.encoding)?;
        RecordTree::parse(&text)
    }

    async fn transform(&self, records: RecordTree) -> Result<ConversionResult> {
        convert_records(&records, &self.settings)
    }

    async fn load(&self, result: ConversionResult) -> Result<String> {
        // 先序列化完成，確保寫出前不會再失敗
        let node_map = match self.config.node_map_path() {
            Some(path) => Some((path, serde_json::to_vec_pretty(&result.node_map)?)),
            None => None,
        };

        let output_path = self.config.output_path();
        let to_stdout = output_path == STDIO_PATH;

        let mut outputs: Vec<(&str, &[u8])> = Vec::new();
        if !to_stdout {
            outputs.push((output_path, result.dot.as_bytes()));
        }
        if let Some((path, data)) = &node_map {
            outputs.push((*path, data.as_slice()));
        }

        // 全部寫進暫存檔後才搬到正式路徑
        let mut staged: Vec<(String, &str)> = Vec::with_capacity(outputs.len());
        for (path, data) in outputs {
            let temp = format!("{}{}", path, STAGING_SUFFIX);
            let written = self.storage.write_file(&temp, data).await;
            staged.push((temp, path));
            if let Err(e) = written {
                self.discard(&staged).await;
                return Err(e);
            }
        }

        if to_stdout {
            if let Err(e) = self.storage.write_file(STDIO_PATH, result.dot.as_bytes()).await {
                self.discard(&staged).await;
                return Err(e);
            }
        }

        for (index, (temp, path)) in staged.iter().enumerate() {
            if let Err(e) = self.storage.rename_file(temp, path).await {
                self.discard(&staged[index..]).await;
                return Err(e);
            }
            tracing::debug!("Wrote {}", path);
        }

        Ok(output_path.to_string())
    }
}

impl<S: Storage, C: ConfigProvider> GedcomPipeline<S, C> {
    async fn discard(&self, staged: &[(String, &str)]) {
        for (temp, _) in staged {
            if let Err(e) = self.storage.remove_file(temp).await {
                tracing::warn!("Could not remove staging file {}: {}", temp, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{NodeMapEntry, XrefId};
    use crate::utils::error::Ged2DotError;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const SIMPLE: &str = "0 HEAD\n0 @I1@ INDI\n1 NAME John /Doe/\n1 SEX M\n1 FAMS @F1@\n0 @I2@ INDI\n1 NAME Ann /Doe/\n1 FAMC @F1@\n0 @F1@ FAM\n1 HUSB @I1@\n1 CHIL @I2@\n0 TRLR\n";

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        failing_path: Option<String>,
    }

    impl MockStorage {
        fn with_file(path: &str, data: &[u8]) -> Self {
            let mut files = HashMap::new();
            files.insert(path.to_string(), data.to_vec());
            Self {
                files: Arc::new(Mutex::new(files)),
                failing_path: None,
            }
        }

        fn failing_on(mut self, path: &str) -> Self {
            self.failing_path = Some(path.to_string());
            self
        }

        async fn paths(&self) -> Vec<String> {
            let files = self.files.lock().await;
            let mut paths: Vec<String> = files.keys().cloned().collect();
            paths.sort();
            paths
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                Ged2DotError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            if self.failing_path.as_deref() == Some(path) {
                return Err(Ged2DotError::IoError(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    format!("cannot write {}", path),
                )));
            }
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn rename_file(&self, from: &str, to: &str) -> Result<()> {
            let mut files = self.files.lock().await;
            let data = files.remove(from).ok_or_else(|| {
                Ged2DotError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", from),
                ))
            })?;
            files.insert(to.to_string(), data);
            Ok(())
        }

        async fn remove_file(&self, path: &str) -> Result<()> {
            let mut files = self.files.lock().await;
            files.remove(path);
            Ok(())
        }
    }

    struct MockConfig {
        settings: ConversionSettings,
        node_map: Option<String>,
    }

    impl MockConfig {
        fn new(root: &str) -> Self {
            let mut settings = ConversionSettings::new(XrefId::from_config(root).unwrap());
            settings.selection.max_generations_descendant = 1;
            Self {
                settings,
                node_map: None,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn input_path(&self) -> &str {
            "family.ged"
        }

        fn output_path(&self) -> &str {
            "family.dot"
        }

        fn node_map_path(&self) -> Option<&str> {
            self.node_map.as_deref()
        }

        fn settings(&self) -> Result<ConversionSettings> {
            Ok(self.settings.clone())
        }
    }

    #[test]
    fn test_convert_str() {
        let settings = MockConfig::new("@I1@").settings;
        let dot = convert_str(SIMPLE, &settings).unwrap();
        assert!(dot.contains("\"I1\" -> \"F1\""));
        assert!(dot.contains("\"F1\" -> \"I2\""));
    }

    #[test]
    fn test_convert_str_fails_on_parse_error() {
        let settings = MockConfig::new("@I1@").settings;
        let err = convert_str("0 HEAD\nfoo BAR\n", &settings).unwrap_err();
        assert!(matches!(err, Ged2DotError::ParseError { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_pipeline_extract_transform_load() {
        let storage = MockStorage::with_file("family.ged", SIMPLE.as_bytes());
        let mut config = MockConfig::new("@I1@");
        config.node_map = Some("nodes.json".to_string());
        let pipeline = GedcomPipeline::new(storage.clone(), config).unwrap();

        let records = pipeline.extract().await.unwrap();
        assert_eq!(records.roots().count(), 5);

        let result = pipeline.transform(records).await.unwrap();
        assert_eq!(result.individual_count, 2);
        assert_eq!(result.family_count, 1);
        assert_eq!(result.edge_count, 2);

        let output_path = pipeline.load(result).await.unwrap();
        assert_eq!(output_path, "family.dot");

        let dot = storage.get_file("family.dot").await.unwrap();
        assert!(String::from_utf8(dot).unwrap().starts_with("digraph"));

        let node_map = storage.get_file("nodes.json").await.unwrap();
        let entries: Vec<NodeMapEntry> = serde_json::from_slice(&node_map).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id, "I1");
        assert_eq!(entries[0].label, "John\nDoe\n");
    }

    #[tokio::test]
    async fn test_failed_node_map_write_leaves_no_output() {
        let storage =
            MockStorage::with_file("family.ged", SIMPLE.as_bytes()).failing_on("nodes.json.tmp");
        let mut config = MockConfig::new("@I1@");
        config.node_map = Some("nodes.json".to_string());
        let pipeline = GedcomPipeline::new(storage.clone(), config).unwrap();

        let records = pipeline.extract().await.unwrap();
        let result = pipeline.transform(records).await.unwrap();
        let err = pipeline.load(result).await.unwrap_err();

        assert!(matches!(err, Ged2DotError::IoError(_)));
        assert_eq!(storage.paths().await, vec!["family.ged".to_string()]);
    }

    #[tokio::test]
    async fn test_staging_files_are_moved_into_place() {
        let storage = MockStorage::with_file("family.ged", SIMPLE.as_bytes());
        let mut config = MockConfig::new("@I1@");
        config.node_map = Some("nodes.json".to_string());
        let pipeline = GedcomPipeline::new(storage.clone(), config).unwrap();

        let records = pipeline.extract().await.unwrap();
        let result = pipeline.transform(records).await.unwrap();
        pipeline.load(result).await.unwrap();

        assert_eq!(
            storage.paths().await,
            vec!["family.dot", "family.ged", "nodes.json"]
        );
    }

    #[tokio::test]
    async fn test_missing_input_is_io_error() {
        let storage = MockStorage::with_file("other.ged", b"0 HEAD\n");
        let pipeline = GedcomPipeline::new(storage, MockConfig::new("@I1@")).unwrap();
        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, Ged2DotError::IoError(_)));
    }
}
