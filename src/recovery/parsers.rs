/// Ordered parse strategies for raw test-result text
///
/// Strategies run from strict to lossy until one yields a JSON value:
/// 1. Direct parse
/// 2. Syntax repair, then parse
/// 3. Extract the first `{...}` / `[...]` block from surrounding log output
/// 4. Rebuild an object from `"key": value` fragments
/// 5. Collect every line that is a standalone JSON object or array
use super::repair::repair_json;
use super::RecoveryError;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    Direct,
    SyntaxRepair,
    Extraction,
    FragmentReconstruction,
    LineByLine,
}

impl ParseStrategy {
    pub const ALL: [ParseStrategy; 5] = [
        ParseStrategy::Direct,
        ParseStrategy::SyntaxRepair,
        ParseStrategy::Extraction,
        ParseStrategy::FragmentReconstruction,
        ParseStrategy::LineByLine,
    ];

    /// Strategies that may drop part of the input
    pub fn is_lossy(&self) -> bool {
        matches!(
            self,
            ParseStrategy::Extraction | ParseStrategy::FragmentReconstruction | ParseStrategy::LineByLine
        )
    }

    fn apply(&self, text: &str) -> Option<Value> {
        match self {
            ParseStrategy::Direct => parse_direct(text),
            ParseStrategy::SyntaxRepair => parse_repaired(text),
            ParseStrategy::Extraction => {
                let block = extract_json_block(text)?;
                parse_direct(block).or_else(|| parse_repaired(block))
            }
            ParseStrategy::FragmentReconstruction => reconstruct_from_fragments(text),
            ParseStrategy::LineByLine => parse_lines(text),
        }
    }
}

impl fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseStrategy::Direct => "direct JSON parse",
            ParseStrategy::SyntaxRepair => "syntax repair",
            ParseStrategy::Extraction => "JSON block extraction",
            ParseStrategy::FragmentReconstruction => "fragment reconstruction",
            ParseStrategy::LineByLine => "line-by-line parse",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Allow the lossy strategies
    pub allow_lossy: bool,

    /// Upper bound on strategies tried
    pub max_attempts: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allow_lossy: true,
            max_attempts: ParseStrategy::ALL.len(),
        }
    }
}

/// Try each enabled strategy in order; failed and successful fallbacks are noted in `warnings`
pub fn parse_with_strategies(
    text: &str,
    options: ParseOptions,
    warnings: &mut Vec<String>,
) -> Result<(Value, ParseStrategy), RecoveryError> {
    let strategies = ParseStrategy::ALL
        .iter()
        .filter(|s| options.allow_lossy || !s.is_lossy())
        .take(options.max_attempts.max(1));

    let mut attempted = 0;
    for strategy in strategies {
        attempted += 1;
        if let Some(value) = strategy.apply(text) {
            if *strategy != ParseStrategy::Direct {
                warnings.push(format!("Recovered test data using {}", strategy));
            }
            tracing::debug!(strategy = %strategy, "Parse strategy succeeded");
            return Ok((value, *strategy));
        }
        if *strategy != ParseStrategy::Direct {
            warnings.push(format!("{} failed", capitalize(&strategy.to_string())));
        }
    }

    Err(RecoveryError::Unparseable { attempted })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn parse_direct(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

fn parse_repaired(text: &str) -> Option<Value> {
    serde_json::from_str(repair_json(text).trim()).ok()
}

/// First balanced `{...}` or `[...]` block, string-aware
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c == '{' || c == '[')?;
    let mut depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                in_string = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => in_string = Some(c),
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start + offset + c.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    // Unbalanced, take everything up to the last closing bracket
    let end = text.rfind(|c: char| c == '}' || c == ']')?;
    (end > start).then(|| &text[start..=end])
}

lazy_static::lazy_static! {
    static ref FRAGMENT_PATTERN: Option<Regex> = Regex::new(
        r#""([^"\\]+)"\s*:\s*("(?:[^"\\]|\\.)*"|-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?|true|false|null)"#,
    )
    .ok();
}

/// Object built from every `"key": scalar` pair in the text; first occurrence wins
pub fn reconstruct_from_fragments(text: &str) -> Option<Value> {
    let pattern = FRAGMENT_PATTERN.as_ref()?;

    let mut object = Map::new();
    for captures in pattern.captures_iter(text) {
        let key = captures[1].to_string();
        if object.contains_key(&key) {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(&captures[2]) {
            object.insert(key, value);
        }
    }

    (!object.is_empty()).then_some(Value::Object(object))
}

/// Lines that parse on their own; one value is unwrapped, several become an array
pub fn parse_lines(text: &str) -> Option<Value> {
    let mut values: Vec<Value> = text
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{') || line.starts_with('['))
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    match values.len() {
        0 => None,
        1 => values.pop(),
        _ => Some(Value::Array(values)),
    }
}
