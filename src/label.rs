//! The label grammar.
//!
//! A label is one or more segments joined by `.` or `-`. Each segment is a run
//! of word characters (alphanumeric or `_`), optionally closed by exactly one
//! group written either as `[word]` or `(word)`:
//!
//! ```text
//! user.retrieve
//! batch.item[42].parse
//! http-client.call(get)
//! ```
//!
//! Reporters and scopes validate their name with [`validate`] when they are
//! built, so a malformed label never makes it into a failure source.
//!
//! # Examples
//!
//! ```
//! use failures::label::{self, Group};
//!
//! let segments = label::validate("scope.iteration[5].func").unwrap();
//! assert_eq!(segments.len(), 3);
//! assert_eq!(segments[1].stem(), "iteration");
//! assert_eq!(segments[1].group(), Some(Group::Index("5")));
//!
//! assert!(label::validate("name..sub").is_err());
//! ```

use alloc::{string::String, vec::Vec};

/// Error returned when a label does not follow the label grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid label: {label:?} ({kind})")]
pub struct InvalidLabelError {
    label: String,
    kind: LabelErrorKind,
}

impl InvalidLabelError {
    pub(crate) fn new(label: &str, kind: LabelErrorKind) -> Self {
        Self {
            label: label.into(),
            kind,
        }
    }

    /// The rejected label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// What was wrong with it.
    pub fn kind(&self) -> LabelErrorKind {
        self.kind
    }
}

/// The reason a label was rejected.
///
/// Positions are byte offsets into the rejected label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LabelErrorKind {
    /// The label is the empty string.
    #[error("label is empty")]
    Empty,
    /// A separator is leading, trailing or doubled.
    #[error("empty segment at byte {at}")]
    EmptySegment {
        /// Offset of the empty segment.
        at: usize,
    },
    /// A character that is neither a word character, a separator nor part of
    /// a group.
    #[error("unexpected character {ch:?} at byte {at}")]
    UnexpectedCharacter {
        /// The offending character.
        ch: char,
        /// Its offset.
        at: usize,
    },
    /// A `[` or `(` without its closing bracket.
    #[error("group opened at byte {at} is never closed")]
    UnclosedGroup {
        /// Offset of the opening bracket.
        at: usize,
    },
    /// A group with nothing inside, such as `item[]`.
    #[error("empty group at byte {at}")]
    EmptyGroup {
        /// Offset of the opening bracket.
        at: usize,
    },
    /// A group closed with the wrong bracket, such as `item[0)`.
    #[error("expected {expected:?} but found {found:?} at byte {at}")]
    MismatchedGroup {
        /// The bracket that would close the group.
        expected: char,
        /// The bracket that was found.
        found: char,
        /// Its offset.
        at: usize,
    },
    /// Anything following a group inside the same segment.
    #[error("unexpected {ch:?} after group at byte {at}")]
    TrailingAfterGroup {
        /// The offending character.
        ch: char,
        /// Its offset.
        at: usize,
    },
}

/// The character that joined a segment to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Separator {
    /// `.`
    Dot,
    /// `-`
    Dash,
}

/// The bracketed suffix of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group<'a> {
    /// `stem[value]`
    Index(&'a str),
    /// `stem(value)`
    Call(&'a str),
}

impl<'a> Group<'a> {
    /// The text between the brackets.
    pub fn value(&self) -> &'a str {
        match *self {
            Group::Index(value) | Group::Call(value) => value,
        }
    }
}

/// One parsed segment of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment<'a> {
    text: &'a str,
    stem: &'a str,
    group: Option<Group<'a>>,
    separator: Option<Separator>,
}

impl<'a> Segment<'a> {
    /// The full segment, group included.
    pub fn as_str(&self) -> &'a str {
        self.text
    }

    /// The segment without its group.
    pub fn stem(&self) -> &'a str {
        self.stem
    }

    /// The group closing this segment, if any.
    pub fn group(&self) -> Option<Group<'a>> {
        self.group
    }

    /// The separator before this segment; `None` for the first one.
    pub fn separator(&self) -> Option<Separator> {
        self.separator
    }
}

/// Parses `label` into its segments, or explains why it is not a label.
pub fn validate(label: &str) -> Result<Vec<Segment<'_>>, InvalidLabelError> {
    if label.is_empty() {
        return Err(InvalidLabelError::new(label, LabelErrorKind::Empty));
    }

    let mut segments = Vec::new();
    let mut separator = None;
    let mut start = 0;

    for (at, ch) in label.char_indices() {
        let next = match ch {
            '.' => Separator::Dot,
            '-' => Separator::Dash,
            _ => continue,
        };
        segments.push(
            parse_segment(&label[start..at], start, separator)
                .map_err(|kind| InvalidLabelError::new(label, kind))?,
        );
        separator = Some(next);
        start = at + ch.len_utf8();
    }
    segments.push(
        parse_segment(&label[start..], start, separator)
            .map_err(|kind| InvalidLabelError::new(label, kind))?,
    );

    Ok(segments)
}

/// Returns `true` when `label` follows the grammar.
pub fn is_valid(label: &str) -> bool {
    validate(label).is_ok()
}

/// Joins a parent label and a child name into the child's label.
pub(crate) fn join(parent: &str, name: &str) -> String {
    let mut label = String::with_capacity(parent.len() + 1 + name.len());
    label.push_str(parent);
    label.push('.');
    label.push_str(name);
    label
}

/// Returns `true` when `source` is `label` itself or a label below it.
pub(crate) fn is_within(source: &str, label: &str) -> bool {
    match source.strip_prefix(label) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

fn is_word(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn parse_segment(
    text: &str,
    offset: usize,
    separator: Option<Separator>,
) -> Result<Segment<'_>, LabelErrorKind> {
    if text.is_empty() {
        return Err(LabelErrorKind::EmptySegment { at: offset });
    }

    let mut chars = text.char_indices();
    let mut stem = text;
    let mut group = None;

    while let Some((open_at, ch)) = chars.next() {
        if is_word(ch) {
            continue;
        }
        let close = match ch {
            '[' if open_at > 0 => ']',
            '(' if open_at > 0 => ')',
            _ => {
                return Err(LabelErrorKind::UnexpectedCharacter {
                    ch,
                    at: offset + open_at,
                });
            }
        };

        let body_start = open_at + ch.len_utf8();
        let mut close_at = None;
        for (at, inner) in chars.by_ref() {
            if is_word(inner) {
                continue;
            }
            if inner == close {
                close_at = Some(at);
                break;
            }
            return Err(if matches!(inner, ']' | ')') {
                LabelErrorKind::MismatchedGroup {
                    expected: close,
                    found: inner,
                    at: offset + at,
                }
            } else {
                LabelErrorKind::UnexpectedCharacter {
                    ch: inner,
                    at: offset + at,
                }
            });
        }

        let Some(close_at) = close_at else {
            return Err(LabelErrorKind::UnclosedGroup {
                at: offset + open_at,
            });
        };
        if close_at == body_start {
            return Err(LabelErrorKind::EmptyGroup {
                at: offset + open_at,
            });
        }
        if let Some((at, trailing)) = chars.next() {
            return Err(LabelErrorKind::TrailingAfterGroup {
                ch: trailing,
                at: offset + at,
            });
        }

        let value = &text[body_start..close_at];
        stem = &text[..open_at];
        group = Some(if close == ']' {
            Group::Index(value)
        } else {
            Group::Call(value)
        });
        break;
    }

    Ok(Segment {
        text,
        stem,
        group,
        separator,
    })
}
