use crate::domain::model::XrefId;
use crate::utils::error::{Ged2DotError, Result};

const MAX_LEVEL: u32 = 99;
const BOM: char = '\u{feff}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(usize);

impl RecordId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One GEDCOM line together with its nested lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub level: u32,
    pub xref: Option<XrefId>,
    pub tag: String,
    pub value: Option<String>,
    pub line: usize,
    children: Vec<RecordId>,
}

impl Record {
    pub fn children(&self) -> &[RecordId] {
        &self.children
    }

    pub fn value_str(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// Label used in error messages: the xref when present, the tag otherwise.
    pub fn describe(&self) -> String {
        match &self.xref {
            Some(xref) => format!("{} {}", xref, self.tag),
            None => format!("{} (line {})", self.tag, self.line),
        }
    }
}

/// 以解析順序編號的紀錄樹（arena），解析後不再變動
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTree {
    records: Vec<Record>,
    roots: Vec<RecordId>,
}

impl RecordTree {
    /// Accepts `\n`, `\r\n` and bare `\r` line endings.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_lines(split_lines(text))
    }

    pub fn parse_lines<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parser = RecordParser::new();
        for (index, line) in lines.into_iter().enumerate() {
            parser.feed(index + 1, line.as_ref())?;
        }
        Ok(parser.finish())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> &Record {
        &self.records[id.0]
    }

    /// Level-0 records in document order.
    pub fn roots(&self) -> impl Iterator<Item = (RecordId, &Record)> {
        self.roots.iter().map(move |&id| (id, self.get(id)))
    }

    pub fn children_of<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = &'a Record> {
        record.children.iter().map(move |&id| self.get(id))
    }

    pub fn find_child<'a>(&'a self, record: &'a Record, tag: &str) -> Option<&'a Record> {
        self.children_of(record).find(|child| child.tag == tag)
    }

    /// 重新序列化成帶層級的 GEDCOM 行
    pub fn to_gedcom_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.records.len());
        let mut stack: Vec<RecordId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let record = self.get(id);
            let mut line = record.level.to_string();
            if let Some(xref) = &record.xref {
                line.push(' ');
                line.push_str(&xref.to_string());
            }
            line.push(' ');
            line.push_str(&record.tag);
            if let Some(value) = &record.value {
                line.push(' ');
                line.push_str(value);
            }
            lines.push(line);
            stack.extend(record.children.iter().rev().copied());
        }
        lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    ExpectTopLevel,
    InRecordBody,
}

struct ParsedLine<'a> {
    level: u32,
    xref: Option<XrefId>,
    tag: &'a str,
    value: Option<&'a str>,
}

struct RecordParser {
    tree: RecordTree,
    /// 目前開啟的紀錄，stack[n] 的層級為 n
    stack: Vec<RecordId>,
    state: ParserState,
}

impl RecordParser {
    fn new() -> Self {
        Self {
            tree: RecordTree::default(),
            stack: Vec::new(),
            state: ParserState::ExpectTopLevel,
        }
    }

    fn feed(&mut self, line_no: usize, raw: &str) -> Result<()> {
        let line = raw.trim_start_matches(BOM).trim_start();
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        if line.trim().is_empty() {
            return Ok(());
        }

        let parsed = parse_line(line_no, line)?;
        let depth = self.stack.len();
        let level = parsed.level as usize;

        match self.state {
            ParserState::ExpectTopLevel if level != 0 => {
                return Err(Ged2DotError::parse(
                    line_no,
                    format!("expected a level 0 record, found level {}: {}", level, line),
                ));
            }
            ParserState::InRecordBody if level > depth => {
                return Err(Ged2DotError::parse(
                    line_no,
                    format!("level {} skips past open level {}: {}", level, depth - 1, line),
                ));
            }
            _ => {}
        }

        self.stack.truncate(level);
        let id = RecordId(self.tree.records.len());
        self.tree.records.push(Record {
            level: parsed.level,
            xref: parsed.xref,
            tag: parsed.tag.to_string(),
            value: parsed.value.map(str::to_string),
            line: line_no,
            children: Vec::new(),
        });

        match self.stack.last() {
            Some(&parent) => self.tree.records[parent.0].children.push(id),
            None => self.tree.roots.push(id),
        }
        self.stack.push(id);
        self.state = ParserState::InRecordBody;
        Ok(())
    }

    fn finish(self) -> RecordTree {
        // GEDCOM 沒有結束標記，仍開啟的紀錄在此隱式關閉
        self.tree
    }
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split('\r'))
}

fn parse_line(line_no: usize, line: &str) -> Result<ParsedLine<'_>> {
    let (level_token, rest) = match line.split_once(' ') {
        Some((level, rest)) => (level, rest.trim_start_matches(' ')),
        None => (line, ""),
    };

    if level_token.is_empty() || !level_token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Ged2DotError::parse(
            line_no,
            format!("level '{}' is not a non-negative integer: {}", level_token, line),
        ));
    }
    let level = level_token
        .parse::<u32>()
        .ok()
        .filter(|level| *level <= MAX_LEVEL)
        .ok_or_else(|| {
            Ged2DotError::parse(line_no, format!("level '{}' is out of range", level_token))
        })?;

    let (xref, rest) = if rest.starts_with('@') {
        let (token, after) = rest.split_once(' ').unwrap_or((rest, ""));
        let xref = XrefId::parse(token).ok_or_else(|| {
            Ged2DotError::parse(
                line_no,
                format!("malformed cross-reference id '{}': {}", token, line),
            )
        })?;
        (Some(xref), after.trim_start_matches(' '))
    } else {
        (None, rest)
    };

    let (tag, value) = match rest.split_once(' ') {
        Some((tag, value)) => (tag, Some(value).filter(|v| !v.is_empty())),
        None => (rest, None),
    };

    if tag.is_empty() {
        return Err(Ged2DotError::parse(line_no, format!("missing tag: {}", line)));
    }
    if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Ged2DotError::parse(
            line_no,
            format!("invalid tag '{}': {}", tag, line),
        ));
    }

    Ok(ParsedLine {
        level,
        xref,
        tag,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "0 HEAD\n1 CHAR UTF-8\n0 @I1@ INDI\n1 NAME John /Doe/\n1 BIRT\n2 DATE 1 JAN 1900\n1 FAMS @F1@\n0 @F1@ FAM\n1 HUSB @I1@\n0 TRLR";

    fn parse_err_line(text: &str) -> usize {
        match RecordTree::parse(text).unwrap_err() {
            Ged2DotError::ParseError { line, .. } => line,
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_records() {
        let tree = RecordTree::parse(SAMPLE).unwrap();
        let roots: Vec<_> = tree.roots().map(|(_, r)| r.tag.as_str()).collect();
        assert_eq!(roots, vec!["HEAD", "INDI", "FAM", "TRLR"]);

        let (_, indi) = tree.roots().nth(1).unwrap();
        assert_eq!(indi.xref.as_ref().unwrap().as_str(), "I1");
        let birt = tree.find_child(indi, "BIRT").unwrap();
        assert_eq!(birt.value, None);
        let date = tree.find_child(birt, "DATE").unwrap();
        assert_eq!(date.value.as_deref(), Some("1 JAN 1900"));
        assert_eq!(date.level, 2);
        assert_eq!(date.line, 6);
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let tree = RecordTree::parse(SAMPLE).unwrap();
        let lines = tree.to_gedcom_lines();
        assert_eq!(lines.join("\n"), SAMPLE);

        let reparsed = RecordTree::parse_lines(&lines).unwrap();
        assert_eq!(reparsed, tree);
    }

    #[test]
    fn test_bom_crlf_and_blank_lines() {
        let text = "\u{feff}0 HEAD\r\n\r\n1 CHAR UTF-8\r\n0 TRLR\r\n";
        let tree = RecordTree::parse(text).unwrap();
        assert_eq!(tree.len(), 3);
        let (_, head) = tree.roots().next().unwrap();
        assert_eq!(head.tag, "HEAD");
        assert_eq!(tree.find_child(head, "CHAR").unwrap().value_str(), "UTF-8");
    }

    #[test]
    fn test_cr_only_line_endings() {
        let tree = RecordTree::parse("0 HEAD\r0 @I1@ INDI\r1 NAME John /Doe/\r0 TRLR\r").unwrap();
        let roots: Vec<_> = tree.roots().map(|(_, r)| r.tag.as_str()).collect();
        assert_eq!(roots, vec!["HEAD", "INDI", "TRLR"]);

        let (_, indi) = tree.roots().nth(1).unwrap();
        let name = tree.find_child(indi, "NAME").unwrap();
        assert_eq!(name.value_str(), "John /Doe/");
        assert_eq!(name.line, 3);
    }

    #[test]
    fn test_mixed_line_endings_keep_line_numbers() {
        assert_eq!(parse_err_line("0 HEAD\r\n1 CHAR UTF-8\r0 @I1@ INDI\nx NAME"), 4);
    }

    #[test]
    fn test_value_is_kept_verbatim() {
        let tree = RecordTree::parse("0 @N1@ NOTE\n1 CONT  two  spaces ").unwrap();
        let (_, note) = tree.roots().next().unwrap();
        let cont = tree.find_child(note, "CONT").unwrap();
        assert_eq!(cont.value.as_deref(), Some(" two  spaces "));
    }

    #[test]
    fn test_non_numeric_level_fails_with_line_number() {
        assert_eq!(parse_err_line("0 HEAD\nx NAME foo"), 2);
        assert_eq!(parse_err_line("0 HEAD\n-1 NAME foo"), 2);
    }

    #[test]
    fn test_missing_tag_fails() {
        assert_eq!(parse_err_line("0 HEAD\n1"), 2);
        assert_eq!(parse_err_line("0 HEAD\n0 @I1@"), 2);
    }

    #[test]
    fn test_level_skip_fails() {
        assert_eq!(parse_err_line("0 @I1@ INDI\n2 DATE 1900"), 2);
        assert_eq!(parse_err_line("1 NAME orphan"), 1);
    }

    #[test]
    fn test_malformed_xref_fails() {
        assert_eq!(parse_err_line("0 @I1 INDI"), 1);
    }

    #[test]
    fn test_open_records_close_at_end_of_input() {
        let tree = RecordTree::parse("0 @I1@ INDI\n1 BIRT\n2 DATE 1900\n3 TIME 12:00").unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.roots().count(), 1);
    }

    #[test]
    fn test_dedent_pops_to_level() {
        let tree = RecordTree::parse("0 @I1@ INDI\n1 BIRT\n2 DATE 1900\n1 DEAT\n0 TRLR").unwrap();
        let (_, indi) = tree.roots().next().unwrap();
        let tags: Vec<_> = tree.children_of(indi).map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["BIRT", "DEAT"]);
    }
}
