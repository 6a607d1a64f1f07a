use crate::core::{ConversionResult, Pipeline};
use crate::utils::error::Result;
use crate::utils::monitor::ConversionMonitor;

pub struct ConversionEngine<P: Pipeline> {
    pipeline: P,
    monitor_enabled: bool,
}

impl<P: Pipeline> ConversionEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor_enabled,
        }
    }

    async fn extract_and_transform(&self, monitor: &mut ConversionMonitor) -> Result<ConversionResult> {
        tracing::info!("📖 Parsing GEDCOM input...");
        let records = self.pipeline.extract().await?;
        tracing::info!("Parsed {} records", records.len());
        monitor.log_phase("Parse");

        tracing::info!("🌳 Building and selecting the family tree...");
        let result = self.pipeline.transform(records).await?;
        tracing::info!(
            "Selected {} individuals, {} families, {} edges",
            result.individual_count,
            result.family_count,
            result.edge_count
        );
        monitor.log_phase("Transform");
        Ok(result)
    }

    /// 執行完整轉換；任何階段失敗都不會寫出輸出
    pub async fn run(&self) -> Result<String> {
        let mut monitor = ConversionMonitor::new(self.monitor_enabled);
        tracing::info!("🚀 Starting GEDCOM to DOT conversion");

        let result = self.extract_and_transform(&mut monitor).await?;

        tracing::info!("💾 Writing DOT output...");
        let output_path = self.pipeline.load(result).await?;
        monitor.log_phase("Load");
        monitor.log_final_stats();

        Ok(output_path)
    }

    /// Runs parse, build, select and emit without writing anything.
    pub async fn preview(&self) -> Result<ConversionResult> {
        let mut monitor = ConversionMonitor::new(self.monitor_enabled);
        let result = self.extract_and_transform(&mut monitor).await?;
        monitor.log_final_stats();
        Ok(result)
    }
}
