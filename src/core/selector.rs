use crate::domain::model::{Family, FamilyTree, Individual, NodeKind, XrefId};
use crate::domain::settings::SelectionPolicy;
use crate::utils::error::{Ged2DotError, Result};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedNode {
    pub id: XrefId,
    pub kind: NodeKind,
    /// 0 for the root, negative for ancestors, positive for descendants.
    pub generation: i32,
    pub order: usize,
}

/// 這次要輸出的子圖，依世代再依文件順序排序
#[derive(Debug, Clone, Default)]
pub struct SelectedGraph {
    nodes: Vec<SelectedNode>,
    individuals: HashSet<XrefId>,
    families: HashSet<XrefId>,
}

impl SelectedGraph {
    pub fn nodes(&self) -> &[SelectedNode] {
        &self.nodes
    }

    pub fn contains_individual(&self, id: &XrefId) -> bool {
        self.individuals.contains(id)
    }

    pub fn contains_family(&self, id: &XrefId) -> bool {
        self.families.contains(id)
    }

    pub fn individual_count(&self) -> usize {
        self.individuals.len()
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }
}

struct Selector<'a> {
    tree: &'a FamilyTree,
    policy: &'a SelectionPolicy,
    individuals: HashMap<XrefId, i32>,
    families: HashMap<XrefId, i32>,
}

impl<'a> Selector<'a> {
    fn admits_individual(&self, individual: &Individual) -> bool {
        if individual.id == self.policy.root {
            return true;
        }
        if self.policy.exclude.contains(&individual.id) {
            return false;
        }
        !(self.policy.exclude_living && self.policy.living.is_presumed_living(individual))
    }

    fn admits_family(&self, family: &Family) -> bool {
        !self.families.contains_key(&family.id) && !self.policy.exclude.contains(&family.id)
    }

    /// 加入人物；已加入或被排除時回傳 false
    fn add_individual(&mut self, id: &XrefId, generation: i32) -> bool {
        if self.individuals.contains_key(id) {
            return false;
        }
        match self.tree.individual(id) {
            Some(individual) if self.admits_individual(individual) => {
                self.individuals.insert(id.clone(), generation);
                true
            }
            _ => false,
        }
    }

    fn open_family(&mut self, id: &XrefId, generation: i32) -> Option<&'a Family> {
        let family = self.tree.family(id)?;
        if !self.admits_family(family) {
            return None;
        }
        self.families.insert(id.clone(), generation);
        Some(family)
    }

    fn walk_ancestors(&mut self, root: &XrefId) {
        let mut frontier = vec![root.clone()];
        for distance in 0..self.policy.max_generations_ancestor {
            let generation = -(distance as i32);
            let mut next = Vec::new();
            for id in &frontier {
                let Some(individual) = self.tree.individual(id) else {
                    continue;
                };
                for family_id in &individual.famc {
                    let Some(family) = self.open_family(family_id, generation - 1) else {
                        continue;
                    };
                    for spouse in family.spouses() {
                        if self.add_individual(spouse, generation - 1) {
                            next.push(spouse.clone());
                        }
                    }
                    if self.policy.include_siblings {
                        for sibling in &family.children {
                            if self.add_individual(sibling, generation) {
                                self.add_partners(sibling, generation);
                            }
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
    }

    /// 兄弟姊妹的配偶與其家庭，不再往下走
    fn add_partners(&mut self, id: &XrefId, generation: i32) {
        let Some(individual) = self.tree.individual(id) else {
            return;
        };
        for family_id in &individual.fams {
            let Some(family) = self.open_family(family_id, generation) else {
                continue;
            };
            for spouse in family.spouses() {
                self.add_individual(spouse, generation);
            }
        }
    }

    fn walk_descendants(&mut self, root: &XrefId) {
        let mut frontier = vec![root.clone()];
        for distance in 0..self.policy.max_generations_descendant {
            let generation = distance as i32;
            let mut next = Vec::new();
            for id in &frontier {
                let Some(individual) = self.tree.individual(id) else {
                    continue;
                };
                for family_id in &individual.fams {
                    let Some(family) = self.open_family(family_id, generation) else {
                        continue;
                    };
                    for spouse in family.spouses() {
                        self.add_individual(spouse, generation);
                    }
                    for child in &family.children {
                        if self.add_individual(child, generation + 1) {
                            next.push(child.clone());
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
    }

    fn finish(self) -> SelectedGraph {
        let individuals = self.individuals;
        let mut nodes: Vec<SelectedNode> = individuals
            .iter()
            .filter_map(|(id, &generation)| {
                self.tree.individual(id).map(|indi| SelectedNode {
                    id: id.clone(),
                    kind: NodeKind::Individual,
                    generation,
                    order: indi.order,
                })
            })
            .collect();

        let mut families = HashSet::new();
        for (id, &generation) in &self.families {
            let Some(family) = self.tree.family(id) else {
                continue;
            };
            // 只連到一個已選人物的家庭不輸出
            let selected_members = family
                .members()
                .filter(|member| individuals.contains_key(*member))
                .count();
            if selected_members < 2 {
                continue;
            }
            families.insert(id.clone());
            nodes.push(SelectedNode {
                id: id.clone(),
                kind: NodeKind::Family,
                generation,
                order: family.order,
            });
        }

        nodes.sort_by_key(|node| (node.generation, node.order));
        SelectedGraph {
            nodes,
            individuals: individuals.into_keys().collect(),
            families,
        }
    }
}

/// Selects the subgraph around `policy.root`.
pub fn select_subgraph(tree: &FamilyTree, policy: &SelectionPolicy) -> Result<SelectedGraph> {
    if tree.individual(&policy.root).is_none() {
        return Err(Ged2DotError::RootNotFoundError {
            id: policy.root.to_string(),
        });
    }

    let mut selector = Selector {
        tree,
        policy,
        individuals: HashMap::new(),
        families: HashMap::new(),
    };
    selector.add_individual(&policy.root, 0);

    if policy.direction.includes_ancestors() {
        selector.walk_ancestors(&policy.root);
    }
    if policy.direction.includes_descendants() {
        selector.walk_descendants(&policy.root);
    }

    let graph = selector.finish();
    tracing::debug!(
        "Selected {} individuals and {} families around {}",
        graph.individual_count(),
        graph.family_count(),
        policy.root
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::build_family_tree;
    use crate::core::parser::RecordTree;
    use crate::domain::settings::{Direction, LivingPolicy};

    // 三代：I1+I2 -> I3；I3+I4 -> I5, I6；I5+I7 -> I8
    const THREE_GENERATIONS: &str = "\
0 @I1@ INDI\n1 NAME Grandpa /Doe/\n1 SEX M\n1 DEAT Y\n\
0 @I2@ INDI\n1 NAME Grandma /Doe/\n1 SEX F\n1 DEAT Y\n\
0 @I3@ INDI\n1 NAME Father /Doe/\n1 SEX M\n1 DEAT Y\n\
0 @I4@ INDI\n1 NAME Mother /Roe/\n1 SEX F\n1 DEAT Y\n\
0 @I5@ INDI\n1 NAME Son /Doe/\n1 SEX M\n\
0 @I6@ INDI\n1 NAME Daughter /Doe/\n1 SEX F\n\
0 @I7@ INDI\n1 NAME Wife /Poe/\n1 SEX F\n\
0 @I8@ INDI\n1 NAME Grandson /Doe/\n1 SEX M\n\
0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n\
0 @F2@ FAM\n1 HUSB @I3@\n1 WIFE @I4@\n1 CHIL @I5@\n1 CHIL @I6@\n\
0 @F3@ FAM\n1 HUSB @I5@\n1 WIFE @I7@\n1 CHIL @I8@\n";

    fn tree(text: &str) -> FamilyTree {
        build_family_tree(&RecordTree::parse(text).unwrap()).unwrap()
    }

    fn id(value: &str) -> XrefId {
        XrefId::from_config(value).unwrap()
    }

    fn policy(root: &str, direction: Direction, up: u32, down: u32) -> SelectionPolicy {
        let mut policy = SelectionPolicy::new(id(root));
        policy.direction = direction;
        policy.max_generations_ancestor = up;
        policy.max_generations_descendant = down;
        policy.living = LivingPolicy {
            consider_age_dead: 120,
            reference_year: 2024,
        };
        policy
    }

    fn ids(graph: &SelectedGraph) -> Vec<String> {
        graph.nodes().iter().map(|n| n.id.as_str().to_string()).collect()
    }

    #[test]
    fn test_depth_zero_is_root_only() {
        let tree = tree(THREE_GENERATIONS);
        let graph = select_subgraph(&tree, &policy("I3", Direction::Descendants, 0, 0)).unwrap();
        assert_eq!(ids(&graph), vec!["I3"]);
        assert_eq!(graph.family_count(), 0);
    }

    #[test]
    fn test_ancestors_are_limited_exactly() {
        let tree = tree(THREE_GENERATIONS);
        let graph = select_subgraph(&tree, &policy("I5", Direction::Ancestors, 1, 0)).unwrap();
        assert_eq!(ids(&graph), vec!["I3", "I4", "F2", "I5"]);

        let graph = select_subgraph(&tree, &policy("I5", Direction::Ancestors, 2, 0)).unwrap();
        assert_eq!(ids(&graph), vec!["I1", "I2", "F1", "I3", "I4", "F2", "I5"]);
        assert_eq!(graph.nodes()[0].generation, -2);
    }

    #[test]
    fn test_descendants_include_partners() {
        let tree = tree(THREE_GENERATIONS);
        let graph = select_subgraph(&tree, &policy("I3", Direction::Descendants, 0, 1)).unwrap();
        assert_eq!(ids(&graph), vec!["I3", "I4", "F2", "I5", "I6"]);

        let graph = select_subgraph(&tree, &policy("I3", Direction::Descendants, 0, 5)).unwrap();
        assert_eq!(
            ids(&graph),
            vec!["I3", "I4", "F2", "I5", "I6", "I7", "F3", "I8"]
        );
    }

    #[test]
    fn test_both_directions() {
        let tree = tree(THREE_GENERATIONS);
        let graph = select_subgraph(&tree, &policy("I3", Direction::Both, 1, 1)).unwrap();
        assert_eq!(
            ids(&graph),
            vec!["I1", "I2", "F1", "I3", "I4", "F2", "I5", "I6"]
        );
    }

    #[test]
    fn test_siblings_are_optional() {
        let tree = tree(THREE_GENERATIONS);
        let mut with_siblings = policy("I5", Direction::Ancestors, 1, 0);
        with_siblings.include_siblings = true;
        let graph = select_subgraph(&tree, &with_siblings).unwrap();
        assert!(graph.contains_individual(&id("I6")));

        let graph = select_subgraph(&tree, &policy("I5", Direction::Ancestors, 1, 0)).unwrap();
        assert!(!graph.contains_individual(&id("I6")));
    }

    #[test]
    fn test_siblings_bring_their_partners() {
        // I5 的妹妹 I6 與 I9 結婚，育有 I10
        let text = format!(
            "{}0 @I9@ INDI\n1 NAME Partner /Moe/\n0 @I10@ INDI\n\
             0 @F4@ FAM\n1 HUSB @I9@\n1 WIFE @I6@\n1 CHIL @I10@\n",
            THREE_GENERATIONS
        );
        let tree = tree(&text);
        let mut with_siblings = policy("I5", Direction::Ancestors, 1, 0);
        with_siblings.include_siblings = true;
        let graph = select_subgraph(&tree, &with_siblings).unwrap();

        assert!(graph.contains_individual(&id("I6")));
        assert!(graph.contains_individual(&id("I9")));
        assert!(graph.contains_family(&id("F4")));
        assert!(!graph.contains_individual(&id("I10")));
        let partner = graph.nodes().iter().find(|n| n.id == id("I9")).unwrap();
        assert_eq!(partner.generation, 0);
    }

    #[test]
    fn test_unconfirmed_spouse_family_is_not_followed() {
        let tree = tree(
            "0 @I1@ INDI\n1 SEX M\n1 FAMS @F1@\n\
             0 @I2@ INDI\n1 SEX M\n0 @I3@ INDI\n1 SEX F\n0 @I4@ INDI\n\
             0 @F1@ FAM\n1 HUSB @I2@\n1 WIFE @I3@\n1 CHIL @I4@\n",
        );
        let graph = select_subgraph(&tree, &policy("I1", Direction::Descendants, 0, 1)).unwrap();
        assert_eq!(ids(&graph), vec!["I1"]);
        assert_eq!(graph.family_count(), 0);
    }

    #[test]
    fn test_exclusion_truncates_branch() {
        let tree = tree(THREE_GENERATIONS);
        let mut excluded = policy("I5", Direction::Ancestors, 3, 0);
        excluded.exclude.insert(id("I3"));
        let graph = select_subgraph(&tree, &excluded).unwrap();
        assert_eq!(ids(&graph), vec!["I4", "F2", "I5"]);

        let mut excluded_family = policy("I5", Direction::Ancestors, 3, 0);
        excluded_family.exclude.insert(id("F2"));
        let graph = select_subgraph(&tree, &excluded_family).unwrap();
        assert_eq!(ids(&graph), vec!["I5"]);
    }

    #[test]
    fn test_exclude_living_prunes_but_keeps_root() {
        let tree = tree(THREE_GENERATIONS);
        let mut living = policy("I3", Direction::Descendants, 0, 5);
        living.exclude_living = true;
        let graph = select_subgraph(&tree, &living).unwrap();
        assert_eq!(ids(&graph), vec!["I3", "I4", "F2"]);

        let mut living_root = policy("I5", Direction::Both, 1, 1);
        living_root.exclude_living = true;
        let graph = select_subgraph(&tree, &living_root).unwrap();
        assert!(graph.contains_individual(&id("I5")));
        assert!(!graph.contains_individual(&id("I8")));
    }

    #[test]
    fn test_cycles_terminate() {
        // I1 是 F1 的丈夫，也是 F1 的孩子
        let tree = tree("0 @I1@ INDI\n0 @I2@ INDI\n0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I1@\n");
        let graph = select_subgraph(&tree, &policy("I1", Direction::Both, 50, 50)).unwrap();
        assert_eq!(ids(&graph), vec!["I2", "F1", "I1"]);
    }

    #[test]
    fn test_lone_family_is_dropped() {
        let tree = tree("0 @I1@ INDI\n1 NAME John /Doe/\n0 @F1@ FAM\n1 HUSB @I1@\n");
        let graph = select_subgraph(&tree, &policy("I1", Direction::Descendants, 0, 1)).unwrap();
        assert_eq!(ids(&graph), vec!["I1"]);
        assert!(!graph.contains_family(&id("F1")));
    }

    #[test]
    fn test_unknown_root_fails() {
        let tree = tree(THREE_GENERATIONS);
        let err = select_subgraph(&tree, &policy("I42", Direction::Both, 1, 1)).unwrap_err();
        assert!(matches!(err, Ged2DotError::RootNotFoundError { .. }));
    }
}
