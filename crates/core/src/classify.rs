//! Classification of slide text shapes by their visual content.
//!
//! Source CVs follow a loose visual convention rather than a schema: one
//! shape holds "Name, Role, Location", another holds the experience bullets.
//! The predicates here decide which is which and pull typed fields out of
//! them. They are pure functions over [`TextBlock`] so each rule can be
//! tested on its own.

use crate::matcher::fold_key;
use crate::TextBlock;
use regex::Regex;
use std::sync::LazyLock;

/// Template instructions that are never real content.
static INSTRUCTIONAL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^\s*(
            click\s+(to|here)\b
          | (insert|enter|type|add)\s+(your|a|an|the|text|name|role|photo|picture|image|bullet|here)\b
          | lorem\s+ipsum
          | placeholder\b
          | x{3,}
          | <[^>]*>\s*$
          | \[[^\]]*\]\s*$
        )",
    )
    .unwrap()
});

/// Section headings that introduce an experience list.
static HEADING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^\s*(
            ((selected|key|relevant|recent|professional|project)\s+)?
            (experience|projects?|engagements?|highlights|expertise|qualifications|credentials|background|track\s+record|references)
          | .{1,40}:
        )\s*:?\s*$",
    )
    .unwrap()
});

/// Job titles that mark a line as the role.
static ROLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(consultant|manager|director|analyst|partner|associate|principal|advisor|adviser|specialist|officer|head\s+of|vice\s+president|engineer|architect)\b",
    )
    .unwrap()
});

/// Office cities that mark a line as the location.
static LOCATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(london|new\s+york|paris|berlin|z(u|ü)rich|geneva|munich|m(u|ü)nchen|vienna|wien|frankfurt|hamburg|amsterdam|brussels|madrid|milan|stockholm|copenhagen|dubai|singapore|hong\s+kong|tokyo|sydney|boston|chicago)\b",
    )
    .unwrap()
});

/// Longest line still taken as a role.
const MAX_ROLE_CHARS: usize = 100;

/// Longest line still taken as a location.
const MAX_LOCATION_CHARS: usize = 50;

/// Characters used as hand-typed bullets.
const BULLET_GLYPHS: &[char] = &['•', '-', '–', '▪', '◦', '→', '‣', '●', '*'];

/// Longest comma-separated token still considered part of a name line.
const MAX_NAME_TOKEN_CHARS: usize = 48;

/// Most tokens a "Name, Role, Location" line may have.
const MAX_NAME_TOKENS: usize = 4;

/// Content lines from which a block counts as a list even without bullets.
const MIN_UNMARKED_BULLET_LINES: usize = 3;

/// What a slide element represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// A picture, treated as the headshot candidate.
    Image,
    /// The "Name, Role, Location" block.
    NameBlock,
    /// The experience list.
    BulletBlock,
    /// Anything else (headings, footers, logos' alt text).
    Unknown,
}

/// Slide-level facts the text predicates need.
#[derive(Debug, Clone, Default)]
pub struct SlideContext {
    /// Name the caller asked for, if known.
    pub name_hint: Option<String>,

    /// Blocks whose offset is at or above this are "near the top".
    pub top_threshold: i64,
}

impl SlideContext {
    /// Build the context for a slide.
    ///
    /// The top region is the upper third of the slide when its height is
    /// known, otherwise only the topmost text block qualifies.
    pub fn new(blocks: &[TextBlock], slide_height: Option<i64>, name_hint: Option<&str>) -> Self {
        let top_threshold = match slide_height {
            Some(height) if height > 0 => height / 3,
            _ => blocks
                .iter()
                .filter(|b| !b.is_blank())
                .map(|b| b.y)
                .min()
                .unwrap_or(0),
        };

        Self {
            name_hint: name_hint
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from),
            top_threshold,
        }
    }

    fn is_near_top(&self, block: &TextBlock) -> bool {
        block.y <= self.top_threshold
    }
}

/// Classify a text block.
pub fn classify_text(block: &TextBlock, ctx: &SlideContext) -> ElementKind {
    if is_name_block(block, ctx) {
        ElementKind::NameBlock
    } else if is_bullet_block(block) {
        ElementKind::BulletBlock
    } else {
        ElementKind::Unknown
    }
}

/// Whether a line is template boilerplate such as "Click to add text".
pub fn is_instructional(line: &str) -> bool {
    INSTRUCTIONAL_REGEX.is_match(line)
}

/// Whether a line starts with a typed bullet glyph.
pub fn has_bullet_glyph(line: &str) -> bool {
    line.trim_start().starts_with(BULLET_GLYPHS)
}

/// Remove leading bullet glyphs and surrounding whitespace.
pub fn strip_bullet_glyph(line: &str) -> &str {
    line.trim()
        .trim_start_matches(|c: char| BULLET_GLYPHS.contains(&c) || c.is_whitespace())
        .trim_end()
}

/// Non-empty lines of a block that are not template instructions.
pub fn content_lines(block: &TextBlock) -> Vec<&str> {
    block
        .lines()
        .into_iter()
        .filter(|line| !is_instructional(line))
        .collect()
}

/// Whether `text` contains every part of `name`, ignoring case and accents.
pub fn mentions_name(text: &str, name: &str) -> bool {
    let haystack: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(fold_key)
        .collect();
    let mut parts = name.split_whitespace().map(fold_key).peekable();
    if parts.peek().is_none() {
        return false;
    }
    parts.all(|part| haystack.iter().any(|w| *w == part))
}

/// Whether a line is a section heading such as "Selected experience".
pub fn is_heading(line: &str) -> bool {
    HEADING_REGEX.is_match(line)
}

/// Whether a line reads as a job title.
pub fn is_role_line(line: &str) -> bool {
    line.chars().count() < MAX_ROLE_CHARS && ROLE_REGEX.is_match(line)
}

/// Whether a line reads as an office location.
pub fn is_location_line(line: &str) -> bool {
    line.chars().count() < MAX_LOCATION_CHARS && LOCATION_REGEX.is_match(line)
}

/// Whether a line looks like "Name, Role, Location".
///
/// A line that starts with a job title ("Senior Consultant, Vienna") is a
/// role line, not a name line.
fn is_comma_separated_tokens(line: &str) -> bool {
    let tokens: Vec<&str> = line.split(',').map(str::trim).collect();
    (2..=MAX_NAME_TOKENS).contains(&tokens.len())
        && tokens
            .iter()
            .all(|t| !t.is_empty() && t.chars().count() <= MAX_NAME_TOKEN_CHARS)
        && !is_role_line(tokens[0])
}

/// Whether any paragraph of the block is marked as a list item.
fn has_marked_items(block: &TextBlock) -> bool {
    block
        .paragraphs
        .iter()
        .any(|p| !p.text.trim().is_empty() && (p.bulleted || has_bullet_glyph(&p.text)))
}

/// Whether the block is the name/role/location block.
pub fn is_name_block(block: &TextBlock, ctx: &SlideContext) -> bool {
    if has_marked_items(block) {
        return false;
    }
    let lines = content_lines(block);
    let Some(first) = lines.first() else {
        return false;
    };

    let is_own_header = match &ctx.name_hint {
        Some(name) => ctx.is_near_top(block) && mentions_name(&lines.join(" "), name),
        None => false,
    };

    // Longer blocks are lists, even when the first entry has commas
    if lines.len() >= MIN_UNMARKED_BULLET_LINES {
        return is_own_header;
    }
    is_comma_separated_tokens(first) || is_own_header
}

/// Whether the block is the experience list.
pub fn is_bullet_block(block: &TextBlock) -> bool {
    let lines = content_lines(block);
    if lines.is_empty() {
        return false;
    }
    has_marked_items(block) || lines.len() >= MIN_UNMARKED_BULLET_LINES
}

/// Experience lines of a bullet block, in document order.
///
/// When a block mixes marked list items with plain lines (usually a heading
/// like "Selected experience"), only the marked items count. In a block
/// without marks a leading heading line is skipped.
pub fn bullet_lines(block: &TextBlock) -> Vec<String> {
    let marked_only = has_marked_items(block);

    let mut lines: Vec<String> = block
        .paragraphs
        .iter()
        .filter(|p| !marked_only || p.bulleted || has_bullet_glyph(&p.text))
        .map(|p| p.text.trim())
        .filter(|line| !line.is_empty() && !is_instructional(line))
        .map(strip_bullet_glyph)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if !marked_only && lines.first().is_some_and(|line| is_heading(line)) {
        lines.remove(0);
    }
    lines
}

/// Role and location from blocks that are neither name nor list, joined
/// as "Role, Location". Empty when neither is found.
pub fn role_and_location<'a>(blocks: impl IntoIterator<Item = &'a TextBlock>) -> String {
    let mut role = None;
    let mut location = None;

    for block in blocks {
        for line in content_lines(block) {
            if role.is_none() && is_role_line(line) {
                role = Some(line);
            } else if location.is_none() && is_location_line(line) {
                location = Some(line);
            }
        }
    }

    role.into_iter().chain(location).collect::<Vec<_>>().join(", ")
}

/// Split a name block into display name and role line.
///
/// "Name, Role, Location" splits on commas; a multi-line block takes the
/// first line as the name and joins the rest. Anything else becomes the name
/// with an empty role.
pub fn parse_name_block(block: &TextBlock) -> (String, String) {
    let lines = content_lines(block);
    let Some((first, rest)) = lines.split_first() else {
        return (String::new(), String::new());
    };

    if first.contains(',') {
        let mut tokens = first.split(',').map(str::trim).filter(|t| !t.is_empty());
        if let Some(name) = tokens.next() {
            let role: Vec<&str> = tokens.chain(rest.iter().copied()).collect();
            return (name.to_string(), role.join(", "));
        }
    }

    if !rest.is_empty() {
        return (first.to_string(), rest.join(", "));
    }

    (first.to_string(), String::new())
}
