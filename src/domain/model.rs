use crate::domain::date::GedDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// GEDCOM 交叉參照 id，儲存時去掉兩側的 `@`，顯示時補回
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct XrefId(String);

impl XrefId {
    /// Parses the bracketed form used inside GEDCOM (`@I1@`).
    pub fn parse(token: &str) -> Option<Self> {
        let inner = token.strip_prefix('@')?.strip_suffix('@')?;
        if inner.is_empty() || inner.contains('@') || inner.contains(char::is_whitespace) {
            return None;
        }
        Some(Self(inner.to_string()))
    }

    /// Accepts both `@I1@` and the bare `I1`.
    pub fn from_config(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.starts_with('@') || value.ends_with('@') {
            return Self::parse(value);
        }
        if value.is_empty() || value.contains(char::is_whitespace) {
            return None;
        }
        Some(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for XrefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}@", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    pub fn from_gedcom(value: &str) -> Self {
        match value.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('M') => Self::Male,
            Some('F') => Self::Female,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersonName {
    pub given: String,
    pub surname: String,
}

impl PersonName {
    /// `John Paul /Doe/ Jr.` → given "John Paul", surname "Doe"
    pub fn from_gedcom(value: &str) -> Self {
        let mut parts = value.split('/');
        let given = parts.next().unwrap_or("").trim().to_string();
        let surname = parts.next().unwrap_or("").trim().to_string();
        Self { given, surname }
    }

    pub fn full(&self) -> String {
        match (self.given.is_empty(), self.surname.is_empty()) {
            (false, false) => format!("{} {}", self.given, self.surname),
            (false, true) => self.given.clone(),
            (true, false) => self.surname.clone(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Individual {
    pub id: XrefId,
    pub name: PersonName,
    pub sex: Sex,
    pub birth: Option<GedDate>,
    pub death: Option<GedDate>,
    /// A DEAT record exists, with or without a date.
    pub deceased: bool,
    pub image: Option<String>,
    pub famc: Vec<XrefId>,
    pub fams: Vec<XrefId>,
    pub order: usize,
    pub line: usize,
}

impl Individual {
    pub fn new(id: XrefId, order: usize, line: usize) -> Self {
        Self {
            id,
            name: PersonName::default(),
            sex: Sex::Unknown,
            birth: None,
            death: None,
            deceased: false,
            image: None,
            famc: Vec::new(),
            fams: Vec::new(),
            order,
            line,
        }
    }

    pub fn birth_year(&self) -> Option<i32> {
        self.birth.as_ref().and_then(GedDate::year)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Family {
    pub id: XrefId,
    pub husband: Option<XrefId>,
    pub wife: Option<XrefId>,
    pub children: Vec<XrefId>,
    pub marriage: Option<GedDate>,
    pub order: usize,
    pub line: usize,
}

impl Family {
    pub fn new(id: XrefId, order: usize, line: usize) -> Self {
        Self {
            id,
            husband: None,
            wife: None,
            children: Vec::new(),
            marriage: None,
            order,
            line,
        }
    }

    pub fn spouses(&self) -> impl Iterator<Item = &XrefId> {
        self.husband.iter().chain(self.wife.iter())
    }

    pub fn members(&self) -> impl Iterator<Item = &XrefId> {
        self.spouses().chain(self.children.iter())
    }
}

/// 解析完成後唯讀的實體集合，依文件順序保存
#[derive(Debug, Clone, Default)]
pub struct FamilyTree {
    individuals: Vec<Individual>,
    families: Vec<Family>,
    individual_index: HashMap<XrefId, usize>,
    family_index: HashMap<XrefId, usize>,
}

impl FamilyTree {
    pub fn new(individuals: Vec<Individual>, families: Vec<Family>) -> Self {
        let individual_index = individuals
            .iter()
            .enumerate()
            .map(|(i, indi)| (indi.id.clone(), i))
            .collect();
        let family_index = families
            .iter()
            .enumerate()
            .map(|(i, fam)| (fam.id.clone(), i))
            .collect();
        Self {
            individuals,
            families,
            individual_index,
            family_index,
        }
    }

    pub fn individual(&self, id: &XrefId) -> Option<&Individual> {
        self.individual_index.get(id).map(|&i| &self.individuals[i])
    }

    pub fn family(&self, id: &XrefId) -> Option<&Family> {
        self.family_index.get(id).map(|&i| &self.families[i])
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }
}

/// Result of the transform phase, handed to `load`.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub dot: String,
    pub node_map: Vec<NodeMapEntry>,
    pub individual_count: usize,
    pub family_count: usize,
    pub edge_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Individual,
    Family,
}

/// 節點 id 與標籤的對照，供 SVG 後處理工具使用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMapEntry {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub generation: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xref_parse() {
        let id = XrefId::parse("@I1@").unwrap();
        assert_eq!(id.as_str(), "I1");
        assert_eq!(id.to_string(), "@I1@");
        assert!(XrefId::parse("I1").is_none());
        assert!(XrefId::parse("@@").is_none());
        assert!(XrefId::parse("@I 1@").is_none());
    }

    #[test]
    fn test_person_name_from_gedcom() {
        let name = PersonName::from_gedcom("John Paul /Doe/");
        assert_eq!(name.given, "John Paul");
        assert_eq!(name.surname, "Doe");
        assert_eq!(name.full(), "John Paul Doe");

        let partial = PersonName::from_gedcom("Mary");
        assert_eq!(partial.surname, "");
        assert_eq!(partial.full(), "Mary");
    }

    #[test]
    fn test_sex_from_gedcom() {
        assert_eq!(Sex::from_gedcom("M"), Sex::Male);
        assert_eq!(Sex::from_gedcom("f"), Sex::Female);
        assert_eq!(Sex::from_gedcom(""), Sex::Unknown);
        assert_eq!(Sex::from_gedcom("X"), Sex::Unknown);
    }
}
