use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DateQualifier {
    Before,
    About,
    Calculated,
    Estimated,
    After,
}

impl DateQualifier {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "BEF" => Some(Self::Before),
            "ABT" => Some(Self::About),
            "CAL" => Some(Self::Calculated),
            "EST" => Some(Self::Estimated),
            "AFT" => Some(Self::After),
            _ => None,
        }
    }
}

/// 可比較的日期：年、可選的月與日
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateValue {
    pub qualifier: Option<DateQualifier>,
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl PartialOrd for DateValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DateValue {
    fn cmp(&self, other: &Self) -> Ordering {
        // 缺少的月/日視為該期間的開頭
        (self.year, self.month.unwrap_or(0), self.day.unwrap_or(0), self.qualifier).cmp(&(
            other.year,
            other.month.unwrap_or(0),
            other.day.unwrap_or(0),
            other.qualifier,
        ))
    }
}

/// A GEDCOM date as written, plus its normalized value when recognizable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GedDate {
    pub raw: String,
    pub value: Option<DateValue>,
}

impl GedDate {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let value = parse_date_value(&raw);
        if value.is_none() && !raw.is_empty() {
            tracing::debug!("Keeping unrecognized date as display text: {:?}", raw);
        }
        Self { raw, value }
    }

    pub fn year(&self) -> Option<i32> {
        self.value.map(|v| v.year)
    }

    /// 標籤用的文字：可辨識時只顯示年份，否則顯示原文
    pub fn display_year(&self) -> String {
        match self.value {
            Some(value) => value.year.to_string(),
            None => self.raw.clone(),
        }
    }
}

impl fmt::Display for GedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:(ABT|BEF|AFT|CAL|EST)\s+)?(?:(?:(\d{1,2})\s+)?(JAN|FEB|MAR|APR|MAY|JUN|JUL|AUG|SEP|OCT|NOV|DEC)\s+)?(\d{1,4})$",
        )
        .expect("date pattern is valid")
    })
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
    ];
    MONTHS
        .iter()
        .position(|m| *m == name)
        .map(|index| index as u32 + 1)
}

fn parse_date_value(raw: &str) -> Option<DateValue> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
    let caps = date_pattern().captures(&normalized)?;

    let qualifier = caps.get(1).and_then(|m| DateQualifier::from_keyword(m.as_str()));
    let day = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
    let month = caps.get(3).and_then(|m| month_number(m.as_str()));
    let year = caps.get(4)?.as_str().parse::<i32>().ok()?;

    if let (Some(day), Some(month)) = (day, month) {
        // 31 FEB 1900 之類的日期不算可辨識
        NaiveDate::from_ymd_opt(year, month, day)?;
    }

    Some(DateValue {
        qualifier,
        year,
        month,
        day,
    })
}
