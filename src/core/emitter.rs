use crate::core::selector::SelectedGraph;
use crate::domain::model::{FamilyTree, Individual, NodeKind, NodeMapEntry, Sex, XrefId};
use crate::domain::settings::StyleOptions;

const INDENT: &str = "  ";

/// Escapes text for use inside a DOT double-quoted string.
pub fn escape_dot(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            other => escaped.push(other),
        }
    }
    escaped
}

fn quote(text: &str) -> String {
    format!("\"{}\"", escape_dot(text))
}

fn node_id(id: &XrefId) -> String {
    quote(id.as_str())
}

#[derive(Debug, Clone)]
pub struct DotOutput {
    pub dot: String,
    pub node_map: Vec<NodeMapEntry>,
    pub edge_count: usize,
}

struct IndividualLabel {
    lines: Vec<String>,
    image: Option<String>,
}

/// 把選出的子圖輸出成 DOT 文字；輸入有效時不會失敗
pub struct DotEmitter<'a> {
    tree: &'a FamilyTree,
    style: &'a StyleOptions,
}

impl<'a> DotEmitter<'a> {
    pub fn new(tree: &'a FamilyTree, style: &'a StyleOptions) -> Self {
        Self { tree, style }
    }

    pub fn emit(&self, graph: &SelectedGraph) -> DotOutput {
        let mut out = String::new();
        let mut node_map = Vec::with_capacity(graph.nodes().len());

        out.push_str(&format!("digraph {} {{\n", quote(&self.style.graph_name)));
        self.write_graph_attributes(&mut out);

        for node in graph.nodes() {
            let entry = match node.kind {
                NodeKind::Individual => self
                    .tree
                    .individual(&node.id)
                    .map(|individual| self.write_individual(&mut out, individual, node.generation)),
                NodeKind::Family => Some(self.write_family(&mut out, &node.id, node.generation)),
            };
            node_map.extend(entry);
        }

        if self.style.rank_by_generation {
            self.write_rank_groups(&mut out, graph);
        }

        let edge_count = self.write_edges(&mut out, graph);
        out.push_str("}\n");

        DotOutput {
            dot: out,
            node_map,
            edge_count,
        }
    }

    fn write_graph_attributes(&self, out: &mut String) {
        let style = self.style;
        out.push_str(&format!("{INDENT}rankdir = {};\n", quote(&style.graph_direction)));
        out.push_str(&format!("{INDENT}splines = {};\n", quote(&style.splines)));
        for (key, value) in &style.graph_attributes {
            out.push_str(&format!("{INDENT}{} = {};\n", quote(key), quote(value)));
        }
        out.push_str(&format!("{INDENT}node [shape = box];\n"));
        if !style.edge_directed {
            out.push_str(&format!("{INDENT}edge [arrowhead = none];\n"));
        }
    }

    fn write_individual(
        &self,
        out: &mut String,
        individual: &Individual,
        generation: i32,
    ) -> NodeMapEntry {
        let label = self.individual_label(individual);
        let dot_label = label
            .lines
            .iter()
            .map(|line| escape_dot(line))
            .collect::<Vec<_>>()
            .join("\\n");

        let mut attributes = vec![
            format!("label = \"{}\"", dot_label),
            format!("color = {}", quote(self.color_for(individual.sex))),
        ];
        if let Some(image) = &label.image {
            attributes.push(format!("image = {}", quote(image)));
            attributes.push("imagescale = true".to_string());
            attributes.push("labelloc = \"b\"".to_string());
        }
        out.push_str(&format!(
            "{INDENT}{} [{}];\n",
            node_id(&individual.id),
            attributes.join(", ")
        ));

        NodeMapEntry {
            id: individual.id.as_str().to_string(),
            kind: NodeKind::Individual,
            label: label.lines.join("\n"),
            generation,
            image: label.image,
        }
    }

    fn write_family(&self, out: &mut String, id: &XrefId, generation: i32) -> NodeMapEntry {
        out.push_str(&format!(
            "{INDENT}{} [shape = point, width = 0.1, label = \"\", color = {}];\n",
            node_id(id),
            quote(&self.style.family_node_color)
        ));

        let label = self
            .tree
            .family(id)
            .map(|family| {
                family
                    .spouses()
                    .filter_map(|spouse| self.tree.individual(spouse))
                    .map(|spouse| self.display_name(spouse))
                    .collect::<Vec<_>>()
                    .join(" & ")
            })
            .unwrap_or_default();

        NodeMapEntry {
            id: id.as_str().to_string(),
            kind: NodeKind::Family,
            label,
            generation,
            image: None,
        }
    }

    fn write_rank_groups(&self, out: &mut String, graph: &SelectedGraph) {
        let nodes = graph.nodes();
        let mut start = 0;
        while start < nodes.len() {
            let generation = nodes[start].generation;
            let end = nodes[start..]
                .iter()
                .position(|node| node.generation != generation)
                .map_or(nodes.len(), |offset| start + offset);
            let members = nodes[start..end]
                .iter()
                .map(|node| format!("{}; ", node_id(&node.id)))
                .collect::<String>();
            out.push_str(&format!("{INDENT}{{ rank = same; {}}}\n", members));
            start = end;
        }
    }

    /// 配偶 -> 家庭、家庭 -> 子女；端點不在子圖內的邊略過
    fn write_edges(&self, out: &mut String, graph: &SelectedGraph) -> usize {
        let mut count = 0;
        for node in graph.nodes().iter().filter(|n| n.kind == NodeKind::Family) {
            let Some(family) = self.tree.family(&node.id) else {
                continue;
            };
            for spouse in family.spouses().filter(|s| graph.contains_individual(s)) {
                out.push_str(&format!(
                    "{INDENT}{} -> {};\n",
                    node_id(spouse),
                    node_id(&family.id)
                ));
                count += 1;
            }
            for child in family.children.iter().filter(|c| graph.contains_individual(c)) {
                out.push_str(&format!(
                    "{INDENT}{} -> {};\n",
                    node_id(&family.id),
                    node_id(child)
                ));
                count += 1;
            }
        }
        count
    }

    fn color_for(&self, sex: Sex) -> &str {
        match sex {
            Sex::Male => &self.style.male_color,
            Sex::Female => &self.style.female_color,
            Sex::Unknown => &self.style.unknown_color,
        }
    }

    fn is_redacted(&self, individual: &Individual) -> bool {
        self.style.living_privacy && self.style.living.is_presumed_living(individual)
    }

    fn display_name(&self, individual: &Individual) -> String {
        if self.style.anonymous {
            individual.id.as_str().to_string()
        } else if self.is_redacted(individual) {
            self.style.living_label.clone()
        } else {
            individual.name.full()
        }
    }

    fn individual_label(&self, individual: &Individual) -> IndividualLabel {
        if self.style.anonymous {
            let masked = |present: bool| if present { "YYYY" } else { "" };
            let death_known =
                individual.death.is_some() || self.style.living.presumed_dead_by_age(individual);
            return IndividualLabel {
                lines: vec![
                    individual.id.as_str().to_string(),
                    format!(
                        "{}-{}",
                        masked(individual.birth.is_some()),
                        masked(death_known)
                    ),
                ],
                image: None,
            };
        }

        if self.is_redacted(individual) {
            return IndividualLabel {
                lines: vec![self.style.living_label.clone()],
                image: None,
            };
        }

        let birth = individual
            .birth
            .as_ref()
            .map(|date| date.display_year())
            .unwrap_or_default();
        let death = match &individual.death {
            Some(date) => date.display_year(),
            None if self.style.living.presumed_dead_by_age(individual) => "?".to_string(),
            None => String::new(),
        };
        let life_span = if birth.is_empty() && death.is_empty() {
            String::new()
        } else {
            format!("{}-{}", birth, death)
        };

        IndividualLabel {
            lines: vec![
                individual.name.given.clone(),
                individual.name.surname.clone(),
                life_span,
            ],
            image: self.image_for(individual, &birth),
        }
    }

    fn image_for(&self, individual: &Individual, birth: &str) -> Option<String> {
        if !self.style.include_images {
            return None;
        }
        if let Some(image) = &individual.image {
            return Some(image.clone());
        }
        self.style.image_format.as_ref().map(|format| {
            format
                .replace("{forename}", &individual.name.given)
                .replace("{surname}", &individual.name.surname)
                .replace("{birth}", birth)
                .replace("{id}", individual.id.as_str())
        })
    }
}

/// Emits DOT for an already selected subgraph.
pub fn emit_dot(tree: &FamilyTree, graph: &SelectedGraph, style: &StyleOptions) -> DotOutput {
    DotEmitter::new(tree, style).emit(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::build_family_tree;
    use crate::core::parser::RecordTree;
    use crate::core::selector::select_subgraph;
    use crate::domain::settings::{Direction, LivingPolicy, SelectionPolicy};

    const FAMILY: &str = "\
0 @I1@ INDI\n1 NAME John /Doe/\n1 SEX M\n1 BIRT\n2 DATE 1 JAN 1900\n1 DEAT\n2 DATE 1970\n1 OBJE\n2 FILE img/john.jpg\n\
0 @I2@ INDI\n1 NAME Jane \"JJ\" /Roe/\n1 SEX F\n1 BIRT\n2 DATE ABT 1905\n1 DEAT Y\n\
0 @I3@ INDI\n1 NAME Jim /Doe/\n1 SEX M\n1 BIRT\n2 DATE 1990\n\
0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n";

    fn style() -> StyleOptions {
        StyleOptions {
            living: LivingPolicy {
                consider_age_dead: 120,
                reference_year: 2024,
            },
            ..StyleOptions::default()
        }
    }

    fn render(text: &str, root: &str, style: &StyleOptions) -> DotOutput {
        let tree = build_family_tree(&RecordTree::parse(text).unwrap()).unwrap();
        let mut policy = SelectionPolicy::new(XrefId::from_config(root).unwrap());
        policy.direction = Direction::Both;
        policy.max_generations_ancestor = 3;
        policy.max_generations_descendant = 3;
        let graph = select_subgraph(&tree, &policy).unwrap();
        emit_dot(&tree, &graph, style)
    }

    #[test]
    fn test_escape_dot() {
        assert_eq!(escape_dot(r#"a "b" \c"#), r#"a \"b\" \\c"#);
        assert_eq!(escape_dot("line1\r\nline2"), "line1\\nline2");
    }

    #[test]
    fn test_emits_nodes_and_edges() {
        let output = render(FAMILY, "@I3@", &style());
        let dot = &output.dot;

        assert!(dot.starts_with("digraph \"family_tree\" {\n"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("  \"I1\" [label = \"John\\nDoe\\n1900-1970\", color = \"blue\"];\n"));
        assert!(dot.contains("Jane \\\"JJ\\\"\\nRoe\\n1905-"));
        assert!(dot.contains("  \"I1\" -> \"F1\";\n"));
        assert!(dot.contains("  \"I2\" -> \"F1\";\n"));
        assert!(dot.contains("  \"F1\" -> \"I3\";\n"));
        assert!(dot.contains("edge [arrowhead = none];"));
        assert_eq!(output.edge_count, 3);
        assert_eq!(output.node_map.len(), 4);
    }

    #[test]
    fn test_rank_groups_follow_generations() {
        let output = render(FAMILY, "@I3@", &style());
        assert!(output
            .dot
            .contains("  { rank = same; \"I1\"; \"I2\"; \"F1\"; }\n"));
        assert!(output.dot.contains("  { rank = same; \"I3\"; }\n"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let first = render(FAMILY, "@I1@", &style());
        let second = render(FAMILY, "@I1@", &style());
        assert_eq!(first.dot, second.dot);
    }

    #[test]
    fn test_living_privacy_redacts_label() {
        let mut style = style();
        style.living_privacy = true;
        let output = render(FAMILY, "@I3@", &style);

        assert!(output.dot.contains("  \"I3\" [label = \"Living\", color = \"blue\"];\n"));
        assert!(!output.dot.contains("Jim"));
        assert!(!output.dot.contains("1990"));
        assert!(output.dot.contains("John\\nDoe"));
    }

    #[test]
    fn test_images_are_referenced_verbatim() {
        let mut style = style();
        style.include_images = true;
        style.image_format = Some("images/{forename} {surname} {birth}.jpg".to_string());
        let output = render(FAMILY, "@I3@", &style);

        assert!(output.dot.contains("image = \"img/john.jpg\", imagescale = true"));
        assert!(output.dot.contains("image = \"images/Jim Doe 1990.jpg\""));
        let jim = output.node_map.iter().find(|n| n.id == "I3").unwrap();
        assert_eq!(jim.image.as_deref(), Some("images/Jim Doe 1990.jpg"));
    }

    #[test]
    fn test_anonymous_mode_masks_details() {
        let mut style = style();
        style.anonymous = true;
        style.include_images = true;
        let output = render(FAMILY, "@I3@", &style);

        assert!(output.dot.contains("  \"I1\" [label = \"I1\\nYYYY-YYYY\""));
        assert!(!output.dot.contains("John"));
        assert!(!output.dot.contains("image ="));
    }

    #[test]
    fn test_missing_fields_render_empty_segments() {
        let output = render("0 @I1@ INDI\n", "@I1@", &style());
        assert!(output.dot.contains("  \"I1\" [label = \"\\n\\n\", color = \"black\"];\n"));
    }

    #[test]
    fn test_old_person_without_death_gets_question_mark() {
        let output = render("0 @I1@ INDI\n1 NAME Old /Timer/\n1 BIRT\n2 DATE 1800\n", "@I1@", &style());
        assert!(output.dot.contains("Old\\nTimer\\n1800-?"));
    }

    #[test]
    fn test_directed_edges_and_pass_through_attributes() {
        let mut style = style();
        style.edge_directed = true;
        style.graph_direction = "LR".to_string();
        style
            .graph_attributes
            .insert("nodesep".to_string(), "0.4".to_string());
        let output = render(FAMILY, "@I3@", &style);

        assert!(!output.dot.contains("arrowhead"));
        assert!(output.dot.contains("  rankdir = \"LR\";\n"));
        assert!(output.dot.contains("  \"nodesep\" = \"0.4\";\n"));
    }

    #[test]
    fn test_attribute_names_are_quoted() {
        let mut style = style();
        style
            .graph_attributes
            .insert("bad \"key\"".to_string(), "1".to_string());
        let output = render(FAMILY, "@I3@", &style);
        assert!(output.dot.contains("  \"bad \\\"key\\\"\" = \"1\";\n"));
    }
}
