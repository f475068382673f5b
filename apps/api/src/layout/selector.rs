//! Break selectors for the preferred/avoided break lists.
//!
//! Forms:
//! - `#id`   : exact node id
//! - `.class`: node carries the class
//! - a section type name (`experience`): first node of a section of that type
//! - anything else: tag name (`h2`, `table`)

use crate::layout::classifier::SectionType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Id(String),
    Class(String),
    Section(SectionType),
    Tag(String),
}

/// Marker view of a node that selectors can match against.
pub struct SelectorTarget<'a> {
    pub id: &'a str,
    pub tag: Option<&'a str>,
    pub classes: &'a [String],
    pub section_type: SectionType,
    pub section_start: bool,
}

impl Selector {
    pub fn parse(raw: &str) -> Option<Selector> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let selector = if let Some(id) = raw.strip_prefix('#') {
            Selector::Id(id.to_string())
        } else if let Some(class) = raw.strip_prefix('.') {
            Selector::Class(class.to_ascii_lowercase())
        } else if let Some(section) = SectionType::from_name(raw) {
            Selector::Section(section)
        } else {
            Selector::Tag(raw.to_ascii_lowercase())
        };
        Some(selector)
    }

    /// Parses a selector list, silently skipping blank entries.
    pub fn parse_list(raw: &[String]) -> Vec<Selector> {
        raw.iter().filter_map(|s| Selector::parse(s)).collect()
    }

    pub fn matches(&self, target: &SelectorTarget<'_>) -> bool {
        match self {
            Selector::Id(id) => target.id == id,
            Selector::Class(class) => target
                .classes
                .iter()
                .any(|c| c.eq_ignore_ascii_case(class)),
            Selector::Section(section) => {
                target.section_start && target.section_type == *section
            }
            Selector::Tag(tag) => target.tag.is_some_and(|t| t.eq_ignore_ascii_case(tag)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target<'a>(classes: &'a [String], section_start: bool) -> SelectorTarget<'a> {
        SelectorTarget {
            id: "job-1",
            tag: Some("DIV"),
            classes,
            section_type: SectionType::Experience,
            section_start,
        }
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(Selector::parse("#job-1"), Some(Selector::Id("job-1".into())));
        assert_eq!(Selector::parse(".Entry"), Some(Selector::Class("entry".into())));
        assert_eq!(
            Selector::parse("education"),
            Some(Selector::Section(SectionType::Education))
        );
        assert_eq!(Selector::parse("H2"), Some(Selector::Tag("h2".into())));
        assert_eq!(Selector::parse("  "), None);
    }

    #[test]
    fn test_section_selector_only_matches_section_start() {
        let classes = vec![];
        let sel = Selector::Section(SectionType::Experience);
        assert!(sel.matches(&target(&classes, true)));
        assert!(!sel.matches(&target(&classes, false)));
    }

    #[test]
    fn test_class_and_tag_match_case_insensitively() {
        let classes = vec!["Entry".to_string()];
        assert!(Selector::Class("entry".into()).matches(&target(&classes, false)));
        assert!(Selector::Tag("div".into()).matches(&target(&classes, false)));
        assert!(Selector::Id("job-1".into()).matches(&target(&classes, false)));
        assert!(!Selector::Id("job-2".into()).matches(&target(&classes, false)));
    }
}
