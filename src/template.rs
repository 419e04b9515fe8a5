use std::fmt;
use std::str::FromStr;

use crate::domain::{StoryRecord, sanitize_filename};
use crate::error::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Id,
    Title,
    SafeTitle,
    Author,
    SafeAuthor,
    ChapterAmt,
    Words,
    LastUpdateTimestamp,
    CompletionStatus,
}

impl Placeholder {
    pub const ALL: [Placeholder; 9] = [
        Placeholder::Id,
        Placeholder::Title,
        Placeholder::SafeTitle,
        Placeholder::Author,
        Placeholder::SafeAuthor,
        Placeholder::ChapterAmt,
        Placeholder::Words,
        Placeholder::LastUpdateTimestamp,
        Placeholder::CompletionStatus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Placeholder::Id => "id",
            Placeholder::Title => "title",
            Placeholder::SafeTitle => "safe_title",
            Placeholder::Author => "author",
            Placeholder::SafeAuthor => "safe_author",
            Placeholder::ChapterAmt => "chapter_amt",
            Placeholder::Words => "words",
            Placeholder::LastUpdateTimestamp => "last_update_timestamp",
            Placeholder::CompletionStatus => "completion_status",
        }
    }

    fn value(self, record: &StoryRecord) -> String {
        match self {
            Placeholder::Id => record.id.clone(),
            Placeholder::Title => record.title.clone(),
            Placeholder::SafeTitle => record.safe_title(),
            Placeholder::Author => record.author.clone(),
            Placeholder::SafeAuthor => sanitize_filename(&record.author),
            Placeholder::ChapterAmt => record.chapter_count.to_string(),
            Placeholder::Words => record.words.map(|w| w.to_string()).unwrap_or_default(),
            Placeholder::LastUpdateTimestamp => record.last_update_timestamp.to_string(),
            Placeholder::CompletionStatus => record.completion_status.to_string(),
        }
    }

    fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|p| format!("${}", p.name()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.name())
    }
}

impl FromStr for Placeholder {
    type Err = TrackerError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| TrackerError::UnknownPlaceholder {
                name: name.to_string(),
                valid: Self::valid_names(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value(Placeholder),
}

/// External download command, one entry per argument. `$name` and `${name}`
/// are substituted per story, `$$` is a literal dollar sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    args: Vec<Vec<Segment>>,
}

impl CommandTemplate {
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, TrackerError> {
        if args.is_empty() {
            return Err(TrackerError::InvalidTemplate(
                "the command needs at least a program name".to_string(),
            ));
        }
        let args = args
            .iter()
            .map(|arg| parse_arg(arg.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { args })
    }

    pub fn render(&self, record: &StoryRecord) -> Vec<String> {
        self.args
            .iter()
            .map(|segments| {
                segments
                    .iter()
                    .map(|segment| match segment {
                        Segment::Literal(text) => text.clone(),
                        Segment::Value(placeholder) => placeholder.value(record),
                    })
                    .collect::<String>()
            })
            .collect()
    }
}

fn parse_arg(arg: &str) -> Result<Vec<Segment>, TrackerError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = arg.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            literal.push(ch);
            continue;
        }
        let name = match chars.peek().copied() {
            Some('$') => {
                chars.next();
                literal.push('$');
                continue;
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => {
                            return Err(TrackerError::InvalidTemplate(format!(
                                "unclosed \"${{\" in \"{arg}\""
                            )));
                        }
                    }
                }
                name
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                name
            }
            _ => {
                return Err(TrackerError::InvalidTemplate(format!(
                    "stray \"$\" in \"{arg}\" (use \"$$\" for a literal dollar sign)"
                )));
            }
        };
        let placeholder = name.parse::<Placeholder>()?;
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Value(placeholder));
    }

    if !literal.is_empty() || segments.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::CompletionStatus;

    fn record() -> StoryRecord {
        StoryRecord {
            id: "42".to_string(),
            title: "Foo: Bar?".to_string(),
            author: "Some/One".to_string(),
            url: "https://www.fimfiction.net/story/42".to_string(),
            chapter_count: 3,
            words: Some(12000),
            last_update_timestamp: 100,
            completion_status: CompletionStatus::OnHiatus,
            download_url: None,
        }
    }

    #[test]
    fn renders_all_placeholders() {
        let template = CommandTemplate::parse(&[
            "fanficfare",
            "--out=${safe_title}.epub",
            "$id",
            "$title|$author|$safe_author",
            "$chapter_amt/$words/$last_update_timestamp",
            "$completion_status",
        ])
        .unwrap();

        assert_eq!(
            template.render(&record()),
            vec![
                "fanficfare",
                "--out=Foo_ Bar_.epub",
                "42",
                "Foo: Bar?|Some/One|Some_One",
                "3/12000/100",
                "On Hiatus",
            ]
        );
    }

    #[test]
    fn double_dollar_is_literal() {
        let template = CommandTemplate::parse(&["echo", "$$id costs $$5"]).unwrap();
        assert_eq!(template.render(&record()), vec!["echo", "$id costs $5"]);
    }

    #[test]
    fn empty_argument_survives() {
        let template = CommandTemplate::parse(&["prog", ""]).unwrap();
        assert_eq!(template.render(&record()), vec!["prog", ""]);
    }

    #[test]
    fn unknown_placeholder_lists_valid_names() {
        let err = CommandTemplate::parse(&["echo", "$chapters"]).unwrap_err();
        assert_matches!(&err, TrackerError::UnknownPlaceholder { name, valid }
            if name == "chapters" && valid.contains("$chapter_amt"));
    }

    #[test]
    fn rejects_malformed_templates() {
        assert_matches!(
            CommandTemplate::parse::<&str>(&[]).unwrap_err(),
            TrackerError::InvalidTemplate(_)
        );
        assert_matches!(
            CommandTemplate::parse(&["echo", "${id"]).unwrap_err(),
            TrackerError::InvalidTemplate(_)
        );
        assert_matches!(
            CommandTemplate::parse(&["echo", "costs $5"]).unwrap_err(),
            TrackerError::InvalidTemplate(_)
        );
    }
}
