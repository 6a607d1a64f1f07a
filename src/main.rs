use clap::Parser;
use ged2dot::utils::error::{ErrorSeverity, Ged2DotError};
use ged2dot::utils::logger;
use ged2dot::{CliConfig, ConversionEngine, GedcomPipeline, LocalStorage, TomlConfig};

fn exit_with(e: &Ged2DotError) -> ! {
    tracing::error!(
        "❌ Conversion failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 依錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

fn display_config_summary(config: &TomlConfig) {
    tracing::info!("📋 Configuration Summary:");
    tracing::info!("  Input: {}", config.input_path());
    tracing::info!("  Output: {}", config.output_path());
    if let Some(root) = &config.tree.root_person_id {
        tracing::info!("  Root: {}", root);
    }
    tracing::info!(
        "  Generations: {} up, {} down ({})",
        config.tree.max_generations_ancestor.unwrap_or(5),
        config.tree.max_generations_descendant.unwrap_or(0),
        config.tree.direction.as_deref().unwrap_or("both")
    );
    if let Some(node_map) = &config.output.node_map {
        tracing::info!("  Node map: {}", node_map);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::debug!("CLI config: {:?}", cli);

    // 載入並驗證配置，在讀取 GEDCOM 之前
    let config = cli.resolve().unwrap_or_else(|e| exit_with(&e));
    display_config_summary(&config);

    // 相對路徑以配置檔所在目錄為基準
    let base_dir = cli
        .config
        .as_deref()
        .and_then(|path| std::path::Path::new(path).parent())
        .map(|dir| dir.to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    let storage = LocalStorage::new(base_dir);

    let pipeline = GedcomPipeline::new(storage, config).unwrap_or_else(|e| exit_with(&e));
    let engine = ConversionEngine::new_with_monitoring(pipeline, cli.monitor);

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be written");
        let result = engine.preview().await.unwrap_or_else(|e| exit_with(&e));
        tracing::info!(
            "✅ Would write {} bytes of DOT ({} nodes, {} edges)",
            result.dot.len(),
            result.node_map.len(),
            result.edge_count
        );
        return Ok(());
    }

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Conversion completed successfully!");
            tracing::info!("📁 Output saved to: {}", output_path);
        }
        Err(e) => exit_with(&e),
    }

    Ok(())
}
