use crate::config::cli::STDIO_PATH;
use crate::core::ConfigProvider;
use crate::domain::model::XrefId;
use crate::domain::settings::{
    ConversionSettings, Direction, InputEncoding, LivingPolicy, SelectionPolicy, StyleOptions,
};
use crate::utils::error::{Ged2DotError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const MAX_GENERATIONS: i64 = 255;
const MAX_AGE: i64 = 200;
const GRAPH_DIRECTIONS: [&str; 4] = ["TB", "BT", "LR", "RL"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub privacy: PrivacyConfig,
    #[serde(default)]
    pub style: StyleConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: Option<String>,
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: Option<String>,
    pub node_map: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeConfig {
    pub root_person_id: Option<String>,
    pub direction: Option<String>,
    pub max_generations_ancestor: Option<i64>,
    pub max_generations_descendant: Option<i64>,
    pub include_siblings: Option<bool>,
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivacyConfig {
    pub living_privacy: Option<bool>,
    pub exclude_living: Option<bool>,
    pub anonymous: Option<bool>,
    pub consider_age_dead: Option<i64>,
    pub living_label: Option<String>,
    pub reference_year: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleConfig {
    pub graph_name: Option<String>,
    pub graph_direction: Option<String>,
    pub splines: Option<String>,
    pub include_images: Option<bool>,
    pub image_format: Option<String>,
    pub rank_by_generation: Option<bool>,
    pub edge_directed: Option<bool>,
    pub male_color: Option<String>,
    pub female_color: Option<String>,
    pub unknown_color: Option<String>,
    pub family_node_color: Option<String>,
    pub graph_attributes: Option<BTreeMap<String, String>>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(Ged2DotError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| Ged2DotError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GEDCOM_ROOT})
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("input.path", self.input_path())?;
        validation::validate_path("output.path", self.output_path())?;
        if let Some(node_map) = &self.output.node_map {
            validation::validate_path("output.node_map", node_map)?;
        }
        self.encoding()?;

        let root = self.root_person_id()?;
        self.direction()?;
        validation::validate_range(
            "tree.max_generations_ancestor",
            self.tree.max_generations_ancestor.unwrap_or(5),
            0,
            MAX_GENERATIONS,
        )?;
        validation::validate_range(
            "tree.max_generations_descendant",
            self.tree.max_generations_descendant.unwrap_or(0),
            0,
            MAX_GENERATIONS,
        )?;

        let exclude = self.exclude()?;
        if exclude.contains(&root) {
            return Err(Ged2DotError::InvalidConfigValueError {
                field: "tree.exclude".to_string(),
                value: root.to_string(),
                reason: "The root person cannot be excluded".to_string(),
            });
        }

        validation::validate_range(
            "privacy.consider_age_dead",
            self.privacy.consider_age_dead.unwrap_or(120),
            0,
            MAX_AGE,
        )?;

        if let Some(direction) = &self.style.graph_direction {
            validation::validate_one_of("style.graph_direction", direction, &GRAPH_DIRECTIONS)?;
        }
        if let Some(format) = &self.style.image_format {
            validation::validate_non_empty_string("style.image_format", format)?;
        }
        if let Some(attributes) = &self.style.graph_attributes {
            for key in attributes.keys() {
                let valid = key.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                    && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                if !valid {
                    return Err(Ged2DotError::InvalidConfigValueError {
                        field: "style.graph_attributes".to_string(),
                        value: key.clone(),
                        reason: "Attribute names must be plain identifiers".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn input_path(&self) -> &str {
        self.input.path.as_deref().unwrap_or(STDIO_PATH)
    }

    pub fn output_path(&self) -> &str {
        self.output.path.as_deref().unwrap_or(STDIO_PATH)
    }

    pub fn root_person_id(&self) -> Result<XrefId> {
        let root = validation::validate_required_field(
            "tree.root_person_id",
            &self.tree.root_person_id,
        )?;
        validation::validate_xref("tree.root_person_id", root)
    }

    pub fn direction(&self) -> Result<Direction> {
        match &self.tree.direction {
            None => Ok(Direction::default()),
            Some(value) => value
                .parse()
                .map_err(|reason| Ged2DotError::InvalidConfigValueError {
                    field: "tree.direction".to_string(),
                    value: value.clone(),
                    reason,
                }),
        }
    }

    pub fn encoding(&self) -> Result<InputEncoding> {
        match &self.input.encoding {
            None => Ok(InputEncoding::default()),
            Some(value) => value
                .parse()
                .map_err(|reason| Ged2DotError::InvalidConfigValueError {
                    field: "input.encoding".to_string(),
                    value: value.clone(),
                    reason,
                }),
        }
    }

    pub fn exclude(&self) -> Result<HashSet<XrefId>> {
        self.tree
            .exclude
            .iter()
            .flatten()
            .map(|value| validation::validate_xref("tree.exclude", value))
            .collect()
    }

    fn living_policy(&self) -> LivingPolicy {
        let defaults = LivingPolicy::default();
        LivingPolicy {
            consider_age_dead: self
                .privacy
                .consider_age_dead
                .map_or(defaults.consider_age_dead, |age| age.clamp(0, MAX_AGE) as u32),
            reference_year: self.privacy.reference_year.unwrap_or(defaults.reference_year),
        }
    }

    /// 轉成一次轉換所需的設定；會先驗證
    pub fn conversion_settings(&self) -> Result<ConversionSettings> {
        self.validate_config()?;

        let living = self.living_policy();
        let generations = |value: Option<i64>, default: u32| {
            value.map_or(default, |v| v.clamp(0, MAX_GENERATIONS) as u32)
        };

        let selection = SelectionPolicy {
            root: self.root_person_id()?,
            direction: self.direction()?,
            max_generations_ancestor: generations(self.tree.max_generations_ancestor, 5),
            max_generations_descendant: generations(self.tree.max_generations_descendant, 0),
            include_siblings: self.tree.include_siblings.unwrap_or(false),
            exclude: self.exclude()?,
            exclude_living: self.privacy.exclude_living.unwrap_or(false),
            living,
        };

        let defaults = StyleOptions::default();
        let style = &self.style;
        let pick = |value: &Option<String>, default: String| value.clone().unwrap_or(default);
        let style = StyleOptions {
            graph_name: pick(&style.graph_name, defaults.graph_name),
            graph_direction: style
                .graph_direction
                .as_ref()
                .map_or(defaults.graph_direction, |d| d.to_ascii_uppercase()),
            splines: pick(&style.splines, defaults.splines),
            graph_attributes: style.graph_attributes.clone().unwrap_or_default(),
            include_images: style.include_images.unwrap_or(defaults.include_images),
            image_format: style.image_format.clone(),
            rank_by_generation: style.rank_by_generation.unwrap_or(defaults.rank_by_generation),
            edge_directed: style.edge_directed.unwrap_or(defaults.edge_directed),
            male_color: pick(&style.male_color, defaults.male_color),
            female_color: pick(&style.female_color, defaults.female_color),
            unknown_color: pick(&style.unknown_color, defaults.unknown_color),
            family_node_color: pick(&style.family_node_color, defaults.family_node_color),
            living_privacy: self.privacy.living_privacy.unwrap_or(false),
            anonymous: self.privacy.anonymous.unwrap_or(false),
            living_label: pick(&self.privacy.living_label, defaults.living_label),
            living,
        };

        Ok(ConversionSettings {
            encoding: self.encoding()?,
            selection,
            style,
        })
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> &str {
        self.input_path()
    }

    fn output_path(&self) -> &str {
        self.output_path()
    }

    fn node_map_path(&self) -> Option<&str> {
        self.output.node_map.as_deref()
    }

    fn settings(&self) -> Result<ConversionSettings> {
        self.conversion_settings()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
