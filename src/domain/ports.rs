use crate::core::parser::RecordTree;
use crate::domain::model::ConversionResult;
use crate::domain::settings::ConversionSettings;
use crate::utils::error::Result;
use async_trait::async_trait;

/// 輸入輸出的存取介面。路徑 `-` 代表 stdin/stdout。
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn rename_file(
        &self,
        from: &str,
        to: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn node_map_path(&self) -> Option<&str>;
    fn settings(&self) -> Result<ConversionSettings>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<RecordTree>;
    async fn transform(&self, records: RecordTree) -> Result<ConversionResult>;
    async fn load(&self, result: ConversionResult) -> Result<String>;
}
