use crate::core::parser::{Record, RecordTree};
use crate::domain::date::GedDate;
use crate::domain::model::{Family, FamilyTree, Individual, PersonName, Sex, XrefId};
use crate::utils::error::{Ged2DotError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityKind {
    Individual,
    Family,
    Object,
}

#[derive(Debug, Clone, Copy)]
struct Declaration {
    kind: EntityKind,
    index: usize,
    line: usize,
}

/// 兩階段建立人物與家庭：先建立所有空殼，再填入欄位與連結
pub struct ModelBuilder<'a> {
    records: &'a RecordTree,
    declarations: HashMap<XrefId, Declaration>,
    individuals: Vec<Individual>,
    families: Vec<Family>,
    objects: Vec<Option<String>>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(records: &'a RecordTree) -> Self {
        Self {
            records,
            declarations: HashMap::new(),
            individuals: Vec::new(),
            families: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn build(mut self) -> Result<FamilyTree> {
        self.declare_shells()?;
        self.populate()?;
        self.reconcile_links();

        tracing::debug!(
            "Built model with {} individuals and {} families",
            self.individuals.len(),
            self.families.len()
        );
        Ok(FamilyTree::new(self.individuals, self.families))
    }

    fn declare_shells(&mut self) -> Result<()> {
        let records = self.records;
        for (id, record) in records.roots() {
            let kind = match record.tag.as_str() {
                "INDI" => EntityKind::Individual,
                "FAM" => EntityKind::Family,
                "OBJE" => EntityKind::Object,
                _ => continue,
            };
            let xref = match &record.xref {
                Some(xref) => xref.clone(),
                None if kind == EntityKind::Object => continue,
                None => {
                    return Err(Ged2DotError::parse(
                        record.line,
                        format!("{} record without a cross-reference id", record.tag),
                    ))
                }
            };

            if let Some(existing) = self.declarations.get(&xref) {
                return Err(Ged2DotError::DuplicateIdError {
                    id: xref.to_string(),
                    first_line: existing.line,
                    line: record.line,
                });
            }

            let index = match kind {
                EntityKind::Individual => {
                    self.individuals
                        .push(Individual::new(xref.clone(), id.index(), record.line));
                    self.individuals.len() - 1
                }
                EntityKind::Family => {
                    self.families
                        .push(Family::new(xref.clone(), id.index(), record.line));
                    self.families.len() - 1
                }
                EntityKind::Object => {
                    let file = records
                        .find_child(record, "FILE")
                        .and_then(|file| file.value.clone());
                    self.objects.push(file);
                    self.objects.len() - 1
                }
            };
            self.declarations.insert(
                xref,
                Declaration {
                    kind,
                    index,
                    line: record.line,
                },
            );
        }
        Ok(())
    }

    fn populate(&mut self) -> Result<()> {
        let records = self.records;
        for (_, record) in records.roots() {
            let Some(xref) = &record.xref else { continue };
            let Some(declaration) = self.declarations.get(xref).copied() else {
                continue;
            };
            match declaration.kind {
                EntityKind::Individual => self.populate_individual(declaration.index, record)?,
                EntityKind::Family => self.populate_family(declaration.index, record)?,
                EntityKind::Object => {}
            }
        }
        Ok(())
    }

    fn populate_individual(&mut self, index: usize, record: &Record) -> Result<()> {
        let records = self.records;
        let mut name_seen = false;

        for child in records.children_of(record) {
            match child.tag.as_str() {
                "NAME" if !name_seen => {
                    name_seen = true;
                    let mut name = PersonName::from_gedcom(child.value_str());
                    if let Some(given) = records.find_child(child, "GIVN") {
                        name.given = given.value_str().trim().to_string();
                    }
                    if let Some(surname) = records.find_child(child, "SURN") {
                        name.surname = surname.value_str().trim().to_string();
                    }
                    self.individuals[index].name = name;
                }
                "SEX" => self.individuals[index].sex = Sex::from_gedcom(child.value_str()),
                "BIRT" => {
                    let birth = self.event_date(child);
                    let individual = &mut self.individuals[index];
                    if individual.birth.is_none() {
                        individual.birth = birth;
                    }
                }
                "DEAT" => {
                    let death = self.event_date(child);
                    let individual = &mut self.individuals[index];
                    individual.deceased = true;
                    if individual.death.is_none() {
                        individual.death = death;
                    }
                }
                "FAMC" => {
                    let family = self.resolve(child, record, EntityKind::Family)?;
                    push_unique(&mut self.individuals[index].famc, family);
                }
                "FAMS" => {
                    let family = self.resolve(child, record, EntityKind::Family)?;
                    push_unique(&mut self.individuals[index].fams, family);
                }
                "OBJE" => {
                    let image = self.object_file(child, record)?;
                    let individual = &mut self.individuals[index];
                    if individual.image.is_none() {
                        individual.image = image;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn populate_family(&mut self, index: usize, record: &Record) -> Result<()> {
        let records = self.records;
        for child in records.children_of(record) {
            match child.tag.as_str() {
                "HUSB" | "WIFE" => {
                    let spouse = self.resolve(child, record, EntityKind::Individual)?;
                    let family = &mut self.families[index];
                    let slot = if child.tag == "HUSB" {
                        &mut family.husband
                    } else {
                        &mut family.wife
                    };
                    match slot.clone() {
                        Some(existing) if existing != spouse => tracing::warn!(
                            "Family {} lists a second {} ({}), keeping {}",
                            family.id,
                            child.tag,
                            spouse,
                            existing
                        ),
                        _ => *slot = Some(spouse),
                    }
                }
                "CHIL" => {
                    let individual = self.resolve(child, record, EntityKind::Individual)?;
                    push_unique(&mut self.families[index].children, individual);
                }
                "MARR" => {
                    let marriage = self.event_date(child);
                    let family = &mut self.families[index];
                    if family.marriage.is_none() {
                        family.marriage = marriage;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn event_date(&self, event: &Record) -> Option<GedDate> {
        self.records
            .find_child(event, "DATE")
            .map(|date| GedDate::parse(date.value_str()))
            .filter(|date| !date.raw.is_empty())
    }

    fn object_file(&self, obje: &Record, owner: &Record) -> Result<Option<String>> {
        if let Some(file) = self.records.find_child(obje, "FILE") {
            return Ok(file.value.clone());
        }
        if obje.value.is_some() {
            let object = self.resolve(obje, owner, EntityKind::Object)?;
            let index = self.declarations[&object].index;
            return Ok(self.objects[index].clone());
        }
        Ok(None)
    }

    /// 解析指標值，必須指向已宣告且種類正確的紀錄
    fn resolve(&self, pointer: &Record, owner: &Record, expected: EntityKind) -> Result<XrefId> {
        let value = pointer.value_str().trim();
        let xref = XrefId::parse(value).ok_or_else(|| {
            Ged2DotError::parse(
                pointer.line,
                format!("{} value '{}' is not a cross-reference id", pointer.tag, value),
            )
        })?;

        match self.declarations.get(&xref) {
            Some(declaration) if declaration.kind == expected => Ok(xref),
            _ => Err(Ged2DotError::resolution(xref.to_string(), owner.describe())),
        }
    }

    /// 補齊雙向連結：CHIL ↔ FAMC、HUSB/WIFE ↔ FAMS
    fn reconcile_links(&mut self) {
        let index_of = |declarations: &HashMap<XrefId, Declaration>, id: &XrefId| {
            declarations.get(id).map(|d| d.index)
        };

        for family in &self.families {
            for spouse in family.spouses() {
                if let Some(i) = index_of(&self.declarations, spouse) {
                    push_unique(&mut self.individuals[i].fams, family.id.clone());
                }
            }
            for child in &family.children {
                if let Some(i) = index_of(&self.declarations, child) {
                    push_unique(&mut self.individuals[i].famc, family.id.clone());
                }
            }
        }

        let mut unconfirmed = Vec::new();
        for (index, individual) in self.individuals.iter().enumerate() {
            for family_id in &individual.famc {
                if let Some(f) = index_of(&self.declarations, family_id) {
                    push_unique(&mut self.families[f].children, individual.id.clone());
                }
            }
            for family_id in &individual.fams {
                let Some(f) = index_of(&self.declarations, family_id) else {
                    continue;
                };
                let family = &mut self.families[f];
                if family.spouses().any(|s| *s == individual.id) {
                    continue;
                }
                let husband_free = family.husband.is_none();
                let wife_free = family.wife.is_none();
                let slot = match (individual.sex, husband_free, wife_free) {
                    (Sex::Male, true, _) | (Sex::Unknown, true, _) => &mut family.husband,
                    (Sex::Female, _, true) | (Sex::Unknown, false, true) => &mut family.wife,
                    _ => {
                        tracing::warn!(
                            "{} claims FAMS {} but both spouse slots are taken, dropping the link",
                            individual.id,
                            family.id
                        );
                        unconfirmed.push((index, family.id.clone()));
                        continue;
                    }
                };
                *slot = Some(individual.id.clone());
            }
        }

        // 家庭不承認的 FAMS 連結移除，保持雙向一致
        for (index, family_id) in unconfirmed {
            self.individuals[index].fams.retain(|id| *id != family_id);
        }
    }
}

fn push_unique(list: &mut Vec<XrefId>, id: XrefId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

/// Builds the entity set from parsed records.
pub fn build_family_tree(records: &RecordTree) -> Result<FamilyTree> {
    ModelBuilder::new(records).build()
}
