pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::config::toml_config::TomlConfig;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "ged2dot")]
#[command(about = "Convert a GEDCOM family tree into a Graphviz DOT graph")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// GEDCOM input file ("-" for stdin), relative to the working directory
    #[arg(short, long)]
    pub input: Option<String>,

    /// DOT output file ("-" for stdout), relative to the working directory
    #[arg(short, long)]
    pub output: Option<String>,

    /// Cross-reference id of the root person, e.g. @I1@
    #[arg(long)]
    pub root: Option<String>,

    /// ancestors, descendants or both
    #[arg(long)]
    pub direction: Option<String>,

    /// Number of ancestor generations to include
    #[arg(long, allow_hyphen_values = true)]
    pub ancestors: Option<i64>,

    /// Number of descendant generations to include
    #[arg(long, allow_hyphen_values = true)]
    pub descendants: Option<i64>,

    /// Reference images in node labels
    #[arg(long)]
    pub images: bool,

    /// Hide names and dates of people presumed living
    #[arg(long)]
    pub living_privacy: bool,

    /// Also write a JSON node id → label map to this file
    #[arg(long)]
    pub node_map: Option<String>,

    #[arg(long, help = "Log time and memory per conversion phase")]
    pub monitor: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub json_logs: bool,

    /// Parse and select, but write nothing
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 載入 TOML（若有指定）並套用命令列覆蓋設定
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };
        self.apply_overrides(&mut config);

        // 配置檔內的路徑以配置檔目錄為基準；命令列給的路徑以目前目錄為基準
        if self.config.is_some() {
            let cwd = std::env::current_dir()?;
            for (flag, target) in [
                (&self.input, &mut config.input.path),
                (&self.output, &mut config.output.path),
                (&self.node_map, &mut config.output.node_map),
            ] {
                if let Some(path) = flag {
                    *target = Some(anchor_to(&cwd, path));
                }
            }
        }
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(input) = &self.input {
            config.input.path = Some(input.clone());
        }
        if let Some(output) = &self.output {
            config.output.path = Some(output.clone());
        }
        if let Some(node_map) = &self.node_map {
            config.output.node_map = Some(node_map.clone());
        }
        if let Some(root) = &self.root {
            config.tree.root_person_id = Some(root.clone());
        }
        if let Some(direction) = &self.direction {
            config.tree.direction = Some(direction.clone());
        }
        if let Some(ancestors) = self.ancestors {
            config.tree.max_generations_ancestor = Some(ancestors);
        }
        if let Some(descendants) = self.descendants {
            config.tree.max_generations_descendant = Some(descendants);
        }
        if self.images {
            config.style.include_images = Some(true);
        }
        if self.living_privacy {
            config.privacy.living_privacy = Some(true);
        }
    }
}

/// Makes a relative path absolute against `base`; `-` and absolute paths pass through.
#[cfg(feature = "cli")]
fn anchor_to(base: &std::path::Path, path: &str) -> String {
    if path == cli::STDIO_PATH || std::path::Path::new(path).is_absolute() {
        return path.to_string();
    }
    base.join(path).to_string_lossy().into_owned()
}
