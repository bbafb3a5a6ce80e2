//! CSS selector subset: compound steps, combinators, groups and a few
//! structural pseudo-classes.

use crate::error::DomError;
use crate::tree::{LiveDocument, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SelectorAttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
    Includes { key: String, value: String },
    DashMatch { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SelectorPseudoClass {
    FirstChild,
    LastChild,
    OnlyChild,
    Empty,
    Not(Vec<Vec<SelectorPart>>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SelectorStep {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<SelectorAttrCondition>,
    pseudo_classes: Vec<SelectorPseudoClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectorCombinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectorPart {
    step: SelectorStep,
    // Relation to previous (left) selector part.
    combinator: Option<SelectorCombinator>,
}

/// Parsed selector list (`a, b > c`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    groups: Vec<Vec<SelectorPart>>,
}

impl Selector {
    /// Parse a selector list.
    pub fn parse(selector: &str) -> Result<Self, DomError> {
        Ok(Self {
            groups: parse_selector_groups(selector)?,
        })
    }
}

impl LiveDocument {
    /// Elements below `scope` matching `selector`, in tree order.
    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let selector = Selector::parse(selector)?;
        Ok(self.select_all(scope, &selector))
    }

    /// First element below `scope` matching `selector`.
    pub fn query_selector(&self, scope: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        Ok(self.query_selector_all(scope, selector)?.into_iter().next())
    }

    /// [`query_selector_all`](Self::query_selector_all) with a pre-parsed selector.
    #[must_use]
    pub fn select_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let mut candidates = Vec::new();
        self.descendant_elements(scope, &mut candidates);
        candidates
            .into_iter()
            .filter(|&node| self.matches(node, selector))
            .collect()
    }

    /// Whether an element matches a selector.
    #[must_use]
    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        selector
            .groups
            .iter()
            .any(|steps| self.matches_selector_chain(node, steps))
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        let selector = Selector::parse(selector)?;
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.is_element(current) && self.matches(current, &selector) {
                return Ok(Some(current));
            }
            cursor = self.parent(current);
        }
        Ok(None)
    }

    fn matches_selector_chain(&self, node_id: NodeId, steps: &[SelectorPart]) -> bool {
        let Some(last) = steps.last() else {
            return false;
        };
        if !self.matches_step(node_id, &last.step) {
            return false;
        }

        let mut current = node_id;
        for idx in (1..steps.len()).rev() {
            let prev_step = &steps[idx - 1].step;
            let combinator = steps[idx]
                .combinator
                .unwrap_or(SelectorCombinator::Descendant);

            let matched = match combinator {
                SelectorCombinator::Child => self
                    .parent(current)
                    .filter(|&parent| self.matches_step(parent, prev_step)),
                SelectorCombinator::Descendant => {
                    let mut cursor = self.parent(current);
                    let mut found = None;
                    while let Some(parent) = cursor {
                        if self.matches_step(parent, prev_step) {
                            found = Some(parent);
                            break;
                        }
                        cursor = self.parent(parent);
                    }
                    found
                }
                SelectorCombinator::AdjacentSibling => self
                    .previous_element_sibling(current)
                    .filter(|&sibling| self.matches_step(sibling, prev_step)),
                SelectorCombinator::GeneralSibling => {
                    let mut cursor = self.previous_element_sibling(current);
                    let mut found = None;
                    while let Some(sibling) = cursor {
                        if self.matches_step(sibling, prev_step) {
                            found = Some(sibling);
                            break;
                        }
                        cursor = self.previous_element_sibling(sibling);
                    }
                    found
                }
            };

            let Some(matched) = matched else {
                return false;
            };
            current = matched;
        }

        true
    }

    fn matches_step(&self, node_id: NodeId, step: &SelectorStep) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };

        if let Some(tag) = &step.tag {
            if !element.tag_name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if let Some(id) = &step.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }

        if !step.classes.is_empty() {
            let classes = element.attr("class").unwrap_or_default();
            if !step
                .classes
                .iter()
                .all(|class| classes.split_ascii_whitespace().any(|c| c == class))
            {
                return false;
            }
        }

        let attrs_match = step.attrs.iter().all(|condition| match condition {
            SelectorAttrCondition::Exists { key } => element.attr(key).is_some(),
            SelectorAttrCondition::Eq { key, value } => element.attr(key) == Some(value.as_str()),
            SelectorAttrCondition::StartsWith { key, value } => element
                .attr(key)
                .is_some_and(|v| !value.is_empty() && v.starts_with(value.as_str())),
            SelectorAttrCondition::EndsWith { key, value } => element
                .attr(key)
                .is_some_and(|v| !value.is_empty() && v.ends_with(value.as_str())),
            SelectorAttrCondition::Contains { key, value } => element
                .attr(key)
                .is_some_and(|v| !value.is_empty() && v.contains(value.as_str())),
            SelectorAttrCondition::Includes { key, value } => element
                .attr(key)
                .is_some_and(|v| v.split_ascii_whitespace().any(|part| part == value)),
            SelectorAttrCondition::DashMatch { key, value } => element.attr(key).is_some_and(|v| {
                v == value || v.strip_prefix(value.as_str()).is_some_and(|rest| rest.starts_with('-'))
            }),
        });
        if !attrs_match {
            return false;
        }

        step.pseudo_classes.iter().all(|pseudo| match pseudo {
            SelectorPseudoClass::FirstChild => self.previous_element_sibling(node_id).is_none(),
            SelectorPseudoClass::LastChild => self.next_element_sibling(node_id).is_none(),
            SelectorPseudoClass::OnlyChild => {
                self.previous_element_sibling(node_id).is_none()
                    && self.next_element_sibling(node_id).is_none()
            }
            SelectorPseudoClass::Empty => self.children(node_id).is_empty(),
            SelectorPseudoClass::Not(groups) => !groups
                .iter()
                .any(|steps| self.matches_selector_chain(node_id, steps)),
        })
    }
}

fn unsupported(selector: &str) -> DomError {
    DomError::UnsupportedSelector(selector.to_owned())
}

/// Split on `separator` characters outside brackets, parentheses and quotes.
fn split_top_level(selector: &str, is_separator: impl Fn(char) -> bool) -> Result<Vec<(String, Option<char>)>, DomError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;
    let mut paren_depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in selector.chars() {
        if let Some(open) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                bracket_depth = bracket_depth.checked_sub(1).ok_or_else(|| unsupported(selector))?;
                current.push(ch);
            }
            '(' => {
                paren_depth += 1;
                current.push(ch);
            }
            ')' => {
                paren_depth = paren_depth.checked_sub(1).ok_or_else(|| unsupported(selector))?;
                current.push(ch);
            }
            ch if bracket_depth == 0 && paren_depth == 0 && is_separator(ch) => {
                parts.push((std::mem::take(&mut current), Some(ch)));
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 || paren_depth != 0 || quote.is_some() {
        return Err(unsupported(selector));
    }
    parts.push((current, None));
    Ok(parts)
}

fn parse_selector_groups(selector: &str) -> Result<Vec<Vec<SelectorPart>>, DomError> {
    split_top_level(selector, |ch| ch == ',')?
        .into_iter()
        .map(|(group, _)| parse_selector_chain(&group))
        .collect()
}

fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>, DomError> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(unsupported(selector));
    }

    let tokens = split_top_level(selector, |ch| matches!(ch, '>' | '+' | '~') || ch.is_ascii_whitespace())?;
    let mut steps = Vec::new();
    let mut pending_combinator: Option<SelectorCombinator> = None;

    for (token, separator) in tokens {
        let token = token.trim();
        if !token.is_empty() {
            let step = parse_selector_step(token)?;
            let combinator = if steps.is_empty() {
                None
            } else {
                Some(
                    pending_combinator
                        .take()
                        .unwrap_or(SelectorCombinator::Descendant),
                )
            };
            steps.push(SelectorPart { step, combinator });
        }

        let explicit = match separator {
            Some('>') => Some(SelectorCombinator::Child),
            Some('+') => Some(SelectorCombinator::AdjacentSibling),
            Some('~') => Some(SelectorCombinator::GeneralSibling),
            _ => None,
        };
        if let Some(combinator) = explicit {
            if pending_combinator.is_some() || steps.is_empty() {
                return Err(unsupported(selector));
            }
            pending_combinator = Some(combinator);
        }
    }

    if steps.is_empty() || pending_combinator.is_some() {
        return Err(unsupported(selector));
    }
    Ok(steps)
}

fn parse_selector_step(part: &str) -> Result<SelectorStep, DomError> {
    let bytes = part.as_bytes();
    let mut i = 0usize;
    let mut step = SelectorStep::default();

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if step.universal || step.tag.is_some() {
                    return Err(unsupported(part));
                }
                step.universal = true;
                i += 1;
            }
            b'#' => {
                let (id, next) = parse_selector_ident(part, i + 1).ok_or_else(|| unsupported(part))?;
                if step.id.replace(id).is_some() {
                    return Err(unsupported(part));
                }
                i = next;
            }
            b'.' => {
                let (class_name, next) =
                    parse_selector_ident(part, i + 1).ok_or_else(|| unsupported(part))?;
                step.classes.push(class_name);
                i = next;
            }
            b'[' => {
                let (attr, next) = parse_selector_attr_condition(part, i)?;
                step.attrs.push(attr);
                i = next;
            }
            b':' => {
                let (pseudo, next) = parse_selector_pseudo(part, i)?;
                step.pseudo_classes.push(pseudo);
                i = next;
            }
            _ => {
                if step.tag.is_some() || step.universal || i != 0 {
                    return Err(unsupported(part));
                }
                let (tag, next) = parse_selector_ident(part, i).ok_or_else(|| unsupported(part))?;
                step.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
        }
    }

    Ok(step)
}

fn parse_selector_pseudo(part: &str, start: usize) -> Result<(SelectorPseudoClass, usize), DomError> {
    let (name, mut next) = parse_selector_ident(part, start + 1).ok_or_else(|| unsupported(part))?;
    let pseudo = match name.as_str() {
        "first-child" => SelectorPseudoClass::FirstChild,
        "last-child" => SelectorPseudoClass::LastChild,
        "only-child" => SelectorPseudoClass::OnlyChild,
        "empty" => SelectorPseudoClass::Empty,
        "not" => {
            if part.as_bytes().get(next) != Some(&b'(') {
                return Err(unsupported(part));
            }
            let close = matching_paren(part, next).ok_or_else(|| unsupported(part))?;
            let inner = &part[next + 1..close];
            next = close + 1;
            SelectorPseudoClass::Not(parse_selector_groups(inner)?)
        }
        _ => return Err(unsupported(part)),
    };
    Ok((pseudo, next))
}

fn matching_paren(src: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, ch) in src[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_selector_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    if start >= bytes.len() || !is_selector_ident_char(bytes[start]) {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && is_selector_ident_char(bytes[end]) {
        end += 1;
    }
    Some((src.get(start..end)?.to_owned(), end))
}

fn is_selector_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || !b.is_ascii()
}

fn is_selector_attr_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b':'
}

fn parse_selector_attr_condition(
    src: &str,
    open_bracket: usize,
) -> Result<(SelectorAttrCondition, usize), DomError> {
    let bytes = src.as_bytes();
    let mut i = open_bracket + 1;
    let skip_ws = |i: &mut usize| {
        while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
            *i += 1;
        }
    };

    skip_ws(&mut i);
    let key_start = i;
    while i < bytes.len() && is_selector_attr_name_char(bytes[i]) {
        i += 1;
    }
    if key_start == i {
        return Err(unsupported(src));
    }
    let key = src[key_start..i].to_ascii_lowercase();

    skip_ws(&mut i);
    if bytes.get(i) == Some(&b']') {
        return Ok((SelectorAttrCondition::Exists { key }, i + 1));
    }

    let (op, next) = match bytes.get(i) {
        Some(b'=') => (b'=', i + 1),
        Some(&op @ (b'^' | b'$' | b'*' | b'~' | b'|')) if bytes.get(i + 1) == Some(&b'=') => (op, i + 2),
        _ => return Err(unsupported(src)),
    };
    i = next;
    skip_ws(&mut i);

    let (value, after_value) = parse_selector_attr_value(src, i)?;
    i = after_value;
    skip_ws(&mut i);
    if bytes.get(i) != Some(&b']') {
        return Err(unsupported(src));
    }

    let condition = match op {
        b'^' => SelectorAttrCondition::StartsWith { key, value },
        b'$' => SelectorAttrCondition::EndsWith { key, value },
        b'*' => SelectorAttrCondition::Contains { key, value },
        b'~' => SelectorAttrCondition::Includes { key, value },
        b'|' => SelectorAttrCondition::DashMatch { key, value },
        _ => SelectorAttrCondition::Eq { key, value },
    };
    Ok((condition, i + 1))
}

fn parse_selector_attr_value(src: &str, start: usize) -> Result<(String, usize), DomError> {
    let bytes = src.as_bytes();
    match bytes.get(start) {
        Some(&quote @ (b'"' | b'\'')) => {
            let mut i = start + 1;
            while i < bytes.len() {
                if bytes[i] == b'\\' {
                    i = (i + 2).min(bytes.len());
                    continue;
                }
                if bytes[i] == quote {
                    return Ok((unescape_string(&src[start + 1..i]), i + 1));
                }
                i += 1;
            }
            Err(unsupported(src))
        }
        Some(_) => {
            let mut i = start;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b']' {
                if bytes[i] == b'\\' {
                    i = (i + 2).min(bytes.len());
                    continue;
                }
                i += 1;
            }
            Ok((unescape_string(&src[start..i]), i))
        }
        None => Err(unsupported(src)),
    }
}

/// Drop CSS backslash escapes, keeping the escaped character.
fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const PAGE: &str = concat!(
        r#"<div id="main-header"><div id="navigation" class="nav bar">nav</div></div>"#,
        r#"<div id="main-content" class="wiki-content">"#,
        r#"<p><a href="/display/ENG/Query+Table">Query Table</a> and "#,
        r#"<a href="https://dng.example.com/rm/resources/A1" class="external-link">A1</a></p>"#,
        r#"<ul><li>1</li><li lang="en-US">2</li><li>3</li></ul>"#,
        r#"</div>"#,
    );

    fn texts(dom: &LiveDocument, nodes: &[NodeId]) -> Vec<String> {
        nodes.iter().map(|&n| dom.text_content(n)).collect()
    }

    fn select(dom: &LiveDocument, selector: &str) -> Vec<String> {
        texts(dom, &dom.query_selector_all(dom.document_node(), selector).unwrap())
    }

    #[test]
    fn test_attribute_selectors() {
        let dom = LiveDocument::parse(PAGE).unwrap();
        assert_eq!(select(&dom, r#"a[href="/display/ENG/Query+Table"]"#), vec!["Query Table"]);
        assert_eq!(select(&dom, r#"a[href^="https://dng.example.com/rm/"]"#), vec!["A1"]);
        assert_eq!(select(&dom, "a[href$='A1']"), vec!["A1"]);
        assert_eq!(select(&dom, "a[href*=display]"), vec!["Query Table"]);
        assert_eq!(select(&dom, "div[class~=bar]"), vec!["nav"]);
        assert_eq!(select(&dom, "li[lang|=en]"), vec!["2"]);
        assert_eq!(select(&dom, "a[class]"), vec!["A1"]);
    }

    #[test]
    fn test_id_class_and_combinators() {
        let dom = LiveDocument::parse(PAGE).unwrap();
        assert_eq!(select(&dom, "#main-header > #navigation"), vec!["nav"]);
        assert_eq!(select(&dom, ".wiki-content a.external-link"), vec!["A1"]);
        assert_eq!(select(&dom, "li + li"), vec!["2", "3"]);
        assert_eq!(select(&dom, "li:first-child ~ li"), vec!["2", "3"]);
        assert_eq!(select(&dom, "li:last-child, li:first-child"), vec!["1", "3"]);
        assert_eq!(select(&dom, "li:not([lang])"), vec!["1", "3"]);
        assert!(select(&dom, "#main-content > a").is_empty());
    }

    #[test]
    fn test_scoped_query_excludes_scope() {
        let dom = LiveDocument::parse(PAGE).unwrap();
        let content = dom
            .query_selector(dom.document_node(), "#main-content")
            .unwrap()
            .unwrap();
        let divs = dom.query_selector_all(content, "div").unwrap();
        assert!(divs.is_empty());
        let links = dom.query_selector_all(content, "a").unwrap();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_closest() {
        let dom = LiveDocument::parse(PAGE).unwrap();
        let link = dom
            .query_selector(dom.document_node(), "a.external-link")
            .unwrap()
            .unwrap();
        let content = dom.closest(link, "#main-content").unwrap().unwrap();
        assert_eq!(dom.get_attribute(content, "class"), Some("wiki-content"));
    }

    #[test]
    fn test_quoted_values_may_contain_separators() {
        let dom = LiveDocument::parse(r#"<a title="a, b > c">x</a><a title='say "hi", ok'>y</a>"#).unwrap();
        assert_eq!(select(&dom, r#"a[title="a, b > c"]"#), vec!["x"]);
        assert_eq!(select(&dom, r#"a[title="say \"hi\", ok"]"#), vec!["y"]);
    }

    #[test]
    fn test_unsupported_selectors() {
        let dom = LiveDocument::parse(PAGE).unwrap();
        let root = dom.document_node();
        for selector in ["", "a >", "> a", "a[", "a:hover", "a,,b", "a:not(", "div*"] {
            assert!(
                matches!(
                    dom.query_selector_all(root, selector),
                    Err(DomError::UnsupportedSelector(_))
                ),
                "{selector} should be rejected"
            );
        }
    }
}
