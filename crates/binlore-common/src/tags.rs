use std::collections::BTreeMap;

/// A tag value after the read-time int-coercion pass : a
/// template tag that happens to parse as an integer is promoted to `Int`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Int(i64),
    Str(String),
}

impl TagValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

/// Per-line tag state accumulated while walking a signature.
///
/// Known tags get dedicated fields so the interpreter never has to probe a
/// map by string key for the hot ones (`jump`, `strlen`, `adjust`); anything
/// else lands in `user`.
#[derive(Debug, Clone, Default)]
pub struct Tags {
    pub id: u32,
    pub offset: i64,
    pub invalid: bool,
    pub once: bool,
    pub many: bool,
    pub overlap: bool,
    pub end: bool,
    pub jump: Option<i64>,
    pub adjust: Option<i64>,
    pub strlen: Option<i64>,
    pub confidence: Option<i64>,
    pub valid: Option<bool>,
    pub display: Option<bool>,
    pub extract: Option<bool>,
    pub plot: Option<bool>,
    pub name: Option<String>,
    pub size: Option<i64>,
    pub description: Option<String>,
    pub user: BTreeMap<String, TagValue>,
}

impl Tags {
    pub fn new(id: u32, offset: i64) -> Self {
        Self {
            id,
            offset,
            ..Default::default()
        }
    }

    /// Apply one `{tag}` / `{tag:value}` marker once its template has been
    /// formatted against the matched datum and (if it parses as an
    /// integer) coerced. `raw` is the post-format, pre-coercion string.
    pub fn set(&mut self, key: &str, raw: String) {
        let value = match raw.parse::<i64>() {
            Ok(n) => TagValue::Int(n),
            Err(_) => TagValue::Str(raw),
        };
        match key {
            "jump" => self.jump = value.as_int().or(self.jump),
            "adjust" => self.adjust = value.as_int().or(self.adjust),
            "strlen" => self.strlen = value.as_int().or(self.strlen),
            "confidence" => self.confidence = value.as_int().or(self.confidence),
            "size" => self.size = value.as_int().or(self.size),
            "offset" => self.offset = value.as_int().unwrap_or(self.offset),
            "many" => self.many = true,
            "overlap" => self.overlap = true,
            "end" => self.end = true,
            "once" => self.once = true,
            "invalid" => self.invalid = matches!(value, TagValue::Int(n) if n != 0) || matches!(value, TagValue::Str(_)),
            "valid" => self.valid = Some(matches!(&value, TagValue::Int(n) if *n != 0) || matches!(&value, TagValue::Str(s) if s != "false" && s != "0")),
            "display" => self.display = Some(matches!(&value, TagValue::Int(n) if *n != 0) || matches!(&value, TagValue::Str(s) if s != "false" && s != "0")),
            "extract" => self.extract = Some(matches!(&value, TagValue::Int(n) if *n != 0) || matches!(&value, TagValue::Str(s) if s != "false" && s != "0")),
            "plot" => self.plot = Some(matches!(&value, TagValue::Int(n) if *n != 0) || matches!(&value, TagValue::Str(s) if s != "false" && s != "0")),
            "name" => self.name = Some(raw_string(value)),
            "description" => self.description = Some(raw_string(value)),
            _ => {
                self.user.insert(key.to_string(), value);
            }
        }
    }
}

fn raw_string(v: TagValue) -> String {
    match v {
        TagValue::Str(s) => s,
        TagValue::Int(n) => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_tag_coerces_to_int() {
        let mut tags = Tags::new(0, 0);
        tags.set("jump", "110".to_string());
        assert_eq!(tags.jump, Some(110));
    }

    #[test]
    fn unknown_tag_lands_in_user_map() {
        let mut tags = Tags::new(0, 0);
        tags.set("dtype", "elf".to_string());
        assert_eq!(
            tags.user.get("dtype"),
            Some(&TagValue::Str("elf".to_string()))
        );
    }

    #[test]
    fn once_and_overlap_are_flags_not_values() {
        let mut tags = Tags::new(0, 0);
        tags.set("once", "1".to_string());
        tags.set("overlap", "1".to_string());
        assert!(tags.once);
        assert!(tags.overlap);
    }
}
