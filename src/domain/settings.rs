use crate::domain::model::{Individual, XrefId};
use chrono::Datelike;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Ancestors,
    Descendants,
    #[default]
    Both,
}

impl Direction {
    pub fn includes_ancestors(self) -> bool {
        matches!(self, Self::Ancestors | Self::Both)
    }

    pub fn includes_descendants(self) -> bool {
        matches!(self, Self::Descendants | Self::Both)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ancestors" => Ok(Self::Ancestors),
            "descendants" => Ok(Self::Descendants),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown direction '{}', expected ancestors, descendants or both",
                other
            )),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ancestors => "ancestors",
            Self::Descendants => "descendants",
            Self::Both => "both",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputEncoding {
    #[default]
    Auto,
    Utf8,
    Latin1,
}

impl FromStr for InputEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "ansi" => Ok(Self::Latin1),
            other => Err(format!(
                "unknown encoding '{}', expected auto, utf-8 or latin-1",
                other
            )),
        }
    }
}

/// 「在世」推定規則：沒有死亡紀錄，且出生年距今未超過 `consider_age_dead`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivingPolicy {
    /// Age in years after which a person without a DEAT record counts as dead. 0 disables it.
    pub consider_age_dead: u32,
    pub reference_year: i32,
}

impl Default for LivingPolicy {
    fn default() -> Self {
        Self {
            consider_age_dead: 120,
            reference_year: chrono::Local::now().year(),
        }
    }
}

impl LivingPolicy {
    pub fn presumed_dead_by_age(&self, individual: &Individual) -> bool {
        if individual.deceased || self.consider_age_dead == 0 {
            return false;
        }
        individual
            .birth_year()
            .map(|year| i64::from(self.reference_year) - i64::from(year) > i64::from(self.consider_age_dead))
            .unwrap_or(false)
    }

    pub fn is_presumed_living(&self, individual: &Individual) -> bool {
        !individual.deceased && !self.presumed_dead_by_age(individual)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub root: XrefId,
    pub direction: Direction,
    pub max_generations_ancestor: u32,
    pub max_generations_descendant: u32,
    pub include_siblings: bool,
    pub exclude: HashSet<XrefId>,
    pub exclude_living: bool,
    pub living: LivingPolicy,
}

impl SelectionPolicy {
    pub fn new(root: XrefId) -> Self {
        Self {
            root,
            direction: Direction::Both,
            max_generations_ancestor: 5,
            max_generations_descendant: 0,
            include_siblings: false,
            exclude: HashSet::new(),
            exclude_living: false,
            living: LivingPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleOptions {
    pub graph_name: String,
    pub graph_direction: String,
    pub splines: String,
    pub graph_attributes: BTreeMap<String, String>,
    pub include_images: bool,
    pub image_format: Option<String>,
    pub rank_by_generation: bool,
    pub edge_directed: bool,
    pub male_color: String,
    pub female_color: String,
    pub unknown_color: String,
    pub family_node_color: String,
    pub living_privacy: bool,
    pub anonymous: bool,
    pub living_label: String,
    pub living: LivingPolicy,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            graph_name: "family_tree".to_string(),
            graph_direction: "TB".to_string(),
            splines: "ortho".to_string(),
            graph_attributes: BTreeMap::new(),
            include_images: false,
            image_format: None,
            rank_by_generation: true,
            edge_directed: false,
            male_color: "blue".to_string(),
            female_color: "pink".to_string(),
            unknown_color: "black".to_string(),
            family_node_color: "black".to_string(),
            living_privacy: false,
            anonymous: false,
            living_label: "Living".to_string(),
            living: LivingPolicy::default(),
        }
    }
}

/// Everything one conversion needs besides the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSettings {
    pub encoding: InputEncoding,
    pub selection: SelectionPolicy,
    pub style: StyleOptions,
}

impl ConversionSettings {
    pub fn new(root: XrefId) -> Self {
        Self {
            encoding: InputEncoding::Auto,
            selection: SelectionPolicy::new(root),
            style: StyleOptions::default(),
        }
    }
}
