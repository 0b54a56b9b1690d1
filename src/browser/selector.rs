//! Element selectors
//!
//! Selectors are a small CSS subset (type, `#id`, `.class`, `[attr]`,
//! `[attr=value]`, descendant combinator) plus an optional exact-text
//! filter on the element's own text. Backends either evaluate the parsed
//! form directly (fixture DOM) or translate it to XPath (WebDriver).

use std::fmt;
use std::str::FromStr;

use crate::common::{normalize_text, Error, Result};

/// Attribute condition inside a compound selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrMatch {
    pub name: String,
    /// `None` means presence only
    pub value: Option<String>,
}

/// One compound selector, e.g. `button.primary[type="submit"]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    /// Element type; `None` matches any element
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrMatch>,
}

impl Compound {
    /// Test an element given its tag name and an attribute accessor
    pub fn matches<'a, F>(&self, tag: &str, attr: F) -> bool
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        if let Some(expected) = &self.tag {
            if !expected.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = attr("class").unwrap_or("");
            let present: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| present.contains(&c.as_str())) {
                return false;
            }
        }
        self.attrs.iter().all(|a| match (&a.value, attr(&a.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected == actual,
        })
    }

    fn to_xpath_step(&self) -> String {
        let mut step = self.tag.clone().unwrap_or_else(|| "*".to_string());
        if let Some(id) = &self.id {
            step.push_str(&format!("[@id={}]", xpath_literal(id)));
        }
        for class in &self.classes {
            step.push_str(&format!(
                "[contains(concat(' ', normalize-space(@class), ' '), {})]",
                xpath_literal(&format!(" {} ", class))
            ));
        }
        for attr in &self.attrs {
            match &attr.value {
                Some(value) => {
                    step.push_str(&format!("[@{}={}]", attr.name, xpath_literal(value)))
                }
                None => step.push_str(&format!("[@{}]", attr.name)),
            }
        }
        step
    }
}

/// Parsed CSS subset selector: compounds joined by descendant combinators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssSelector {
    raw: String,
    steps: Vec<Compound>,
}

impl CssSelector {
    /// Matches every element
    pub fn any() -> Self {
        Self {
            raw: "*".to_string(),
            steps: vec![Compound::default()],
        }
    }

    /// Source text of the selector
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Compounds from outermost to innermost
    pub fn steps(&self) -> &[Compound] {
        &self.steps
    }
}

impl FromStr for CssSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(Error::Config("Empty selector".to_string()));
        }

        let steps = split_compounds(raw)?
            .iter()
            .map(|token| parse_compound(token).map_err(|e| invalid(raw, &e)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            steps,
        })
    }
}

impl fmt::Display for CssSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A CSS subset selector with an optional own-text filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub css: CssSelector,
    /// Normalized text the element's own text must equal
    pub text: Option<String>,
}

impl Selector {
    /// Parse a plain CSS selector
    pub fn css(css: &str) -> Result<Self> {
        Ok(Self {
            css: css.parse()?,
            text: None,
        })
    }

    /// CSS selector restricted to elements whose own text equals `text`
    pub fn with_text(css: &str, text: &str) -> Result<Self> {
        Ok(Self {
            css: css.parse()?,
            text: Some(normalize_text(text)),
        })
    }

    /// Any element whose own text equals `text`
    pub fn text(text: &str) -> Self {
        Self {
            css: CssSelector::any(),
            text: Some(normalize_text(text)),
        }
    }

    /// Whether an element's own text satisfies the text filter
    pub fn text_matches(&self, own_text: &str) -> bool {
        match &self.text {
            Some(expected) => normalize_text(own_text) == *expected,
            None => true,
        }
    }

    /// Translate to an XPath expression.
    ///
    /// Relative expressions (`.//`) search below a context element.
    pub fn to_xpath(&self, relative: bool) -> String {
        let prefix = if relative { ".//" } else { "//" };
        let mut xpath = format!(
            "{}{}",
            prefix,
            self.css
                .steps()
                .iter()
                .map(Compound::to_xpath_step)
                .collect::<Vec<_>>()
                .join("//")
        );
        if let Some(text) = &self.text {
            xpath.push_str(&format!(
                "[text()[normalize-space(.)={}]]",
                xpath_literal(text)
            ));
        }
        xpath
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{}:text(\"{}\")", self.css, text),
            None => write!(f, "{}", self.css),
        }
    }
}

/// Quote a string as an XPath 1.0 literal, falling back to `concat()` when
/// it contains both quote characters.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{}'", s)
    } else if !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

fn invalid(raw: &str, reason: &str) -> Error {
    Error::Config(format!("Invalid selector '{}': {}", raw, reason))
}

/// Split on whitespace that is outside brackets and quotes
fn split_compounds(raw: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for c in raw.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"') | (None, '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (None, '[') => {
                depth += 1;
                current.push(c);
            }
            (None, ']') => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            (None, c) if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            (None, '>') | (None, '+') | (None, '~') | (None, ',') if depth == 0 => {
                return Err(invalid(raw, &format!("combinator '{}' is not supported", c)));
            }
            (None, c) => current.push(c),
        }
    }

    if quote.is_some() || depth != 0 {
        return Err(invalid(raw, "unterminated quote or bracket"));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn parse_compound(token: &str) -> std::result::Result<Compound, String> {
    let chars: Vec<char> = token.chars().collect();
    let mut pos = 0;
    let mut compound = Compound::default();

    if chars.first() == Some(&'*') {
        pos = 1;
    } else {
        let tag = take_ident(&chars, &mut pos);
        if !tag.is_empty() {
            compound.tag = Some(tag.to_ascii_lowercase());
        }
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                let id = take_ident(&chars, &mut pos);
                if id.is_empty() {
                    return Err("empty id".to_string());
                }
                compound.id = Some(id);
            }
            '.' => {
                pos += 1;
                let class = take_ident(&chars, &mut pos);
                if class.is_empty() {
                    return Err("empty class name".to_string());
                }
                compound.classes.push(class);
            }
            '[' => {
                pos += 1;
                let name = take_ident(&chars, &mut pos);
                if name.is_empty() {
                    return Err("empty attribute name".to_string());
                }
                let value = match chars.get(pos) {
                    Some(']') => None,
                    Some('=') => {
                        pos += 1;
                        Some(parse_attr_value(&chars, &mut pos)?)
                    }
                    _ => return Err(format!("unexpected character in [{}", name)),
                };
                if chars.get(pos) != Some(&']') {
                    return Err("expected ']'".to_string());
                }
                pos += 1;
                compound.attrs.push(AttrMatch { name, value });
            }
            c => return Err(format!("unexpected character '{}'", c)),
        }
    }

    Ok(compound)
}

fn parse_attr_value(chars: &[char], pos: &mut usize) -> std::result::Result<String, String> {
    match chars.get(*pos) {
        Some(&q) if q == '"' || q == '\'' => {
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != q {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err("unterminated attribute value".to_string());
            }
            let value = chars[start..*pos].iter().collect();
            *pos += 1;
            Ok(value)
        }
        _ => {
            let value = take_ident(chars, pos);
            if value.is_empty() {
                Err("empty attribute value".to_string())
            } else {
                Ok(value)
            }
        }
    }
}
