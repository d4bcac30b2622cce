use super::document::Document;
use super::ElementId;
use crate::error::PageError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
    Includes { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PseudoClass {
    FirstChild,
    LastChild,
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
    pseudo: Vec<PseudoClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    compound: Compound,
    // Relation to the part on the left.
    combinator: Option<Combinator>,
}

/// A parsed selector list (`a, b > c`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Selector {
    groups: Vec<Vec<Part>>,
}

impl Selector {
    pub(crate) fn parse(selector: &str) -> Result<Self, PageError> {
        let unsupported = || PageError::Selector(selector.to_string());
        let mut groups = Vec::new();
        for group in split_groups(selector).ok_or_else(unsupported)? {
            groups.push(parse_chain(&group).ok_or_else(unsupported)?);
        }
        Ok(Self { groups })
    }

    pub(crate) fn matches(&self, document: &Document, id: usize) -> bool {
        self.groups
            .iter()
            .any(|parts| matches_chain(document, parts, parts.len() - 1, id))
    }
}

/// Match `parts[..=idx]` with `parts[idx]` anchored on `id`, backtracking
/// through ancestors and siblings.
fn matches_chain(document: &Document, parts: &[Part], idx: usize, id: usize) -> bool {
    if !matches_compound(document, &parts[idx].compound, id) {
        return false;
    }
    if idx == 0 {
        return true;
    }
    match parts[idx].combinator.unwrap_or(Combinator::Descendant) {
        Combinator::Child => document
            .parent_element(id)
            .is_some_and(|parent| matches_chain(document, parts, idx - 1, parent)),
        Combinator::Descendant => {
            let mut cursor = document.parent_element(id);
            while let Some(ancestor) = cursor {
                if matches_chain(document, parts, idx - 1, ancestor) {
                    return true;
                }
                cursor = document.parent_element(ancestor);
            }
            false
        }
        Combinator::AdjacentSibling => previous_sibling(document, id)
            .is_some_and(|sibling| matches_chain(document, parts, idx - 1, sibling)),
        Combinator::GeneralSibling => {
            let mut cursor = previous_sibling(document, id);
            while let Some(sibling) = cursor {
                if matches_chain(document, parts, idx - 1, sibling) {
                    return true;
                }
                cursor = previous_sibling(document, sibling);
            }
            false
        }
    }
}

fn siblings(document: &Document, id: usize) -> &[usize] {
    document
        .node(id)
        .and_then(|node| node.parent)
        .and_then(|parent| {
            if parent == Document::root() {
                None
            } else {
                document.node(parent)
            }
        })
        .map(|parent| parent.children.as_slice())
        .unwrap_or_default()
}

fn previous_sibling(document: &Document, id: usize) -> Option<usize> {
    let siblings = siblings(document, id);
    let pos = siblings.iter().position(|sibling| *sibling == id)?;
    pos.checked_sub(1).map(|prev| siblings[prev])
}

fn matches_compound(document: &Document, compound: &Compound, id: usize) -> bool {
    let Some(node) = document.node(id) else {
        return false;
    };
    let element = ElementId(id);

    if let Some(tag) = &compound.tag {
        if !node.tag.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(expected) = &compound.id {
        if document.attr(element, "id") != Some(expected.as_str()) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let classes: Vec<&str> = document
            .attr(element, "class")
            .unwrap_or_default()
            .split_whitespace()
            .collect();
        if compound
            .classes
            .iter()
            .any(|class| !classes.contains(&class.as_str()))
        {
            return false;
        }
    }

    let attrs_match = compound.attrs.iter().all(|condition| match condition {
        AttrCondition::Exists { key } => document.has_attr(element, key),
        AttrCondition::Eq { key, value } => document.attr(element, key) == Some(value.as_str()),
        AttrCondition::StartsWith { key, value } => document
            .attr(element, key)
            .is_some_and(|actual| !value.is_empty() && actual.starts_with(value.as_str())),
        AttrCondition::EndsWith { key, value } => document
            .attr(element, key)
            .is_some_and(|actual| !value.is_empty() && actual.ends_with(value.as_str())),
        AttrCondition::Contains { key, value } => document
            .attr(element, key)
            .is_some_and(|actual| !value.is_empty() && actual.contains(value.as_str())),
        AttrCondition::Includes { key, value } => document
            .attr(element, key)
            .is_some_and(|actual| actual.split_whitespace().any(|word| word == value)),
    });
    if !attrs_match {
        return false;
    }

    compound.pseudo.iter().all(|pseudo| match pseudo {
        PseudoClass::FirstChild => siblings(document, id).first() == Some(&id),
        PseudoClass::LastChild => siblings(document, id).last() == Some(&id),
        PseudoClass::Disabled => document.has_attr(element, "disabled"),
    })
}

fn split_groups(selector: &str) -> Option<Vec<String>> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                bracket_depth = bracket_depth.checked_sub(1)?;
                current.push(ch);
            }
            ',' if bracket_depth == 0 => {
                let trimmed = current.trim();
                if trimmed.is_empty() {
                    return None;
                }
                groups.push(trimmed.to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let trimmed = current.trim();
    if bracket_depth != 0 || trimmed.is_empty() {
        return None;
    }
    groups.push(trimmed.to_string());
    Some(groups)
}

fn tokenize(selector: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.trim().is_empty() {
            tokens.push(current.trim().to_string());
        }
        current.clear();
    };

    for ch in selector.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                bracket_depth = bracket_depth.checked_sub(1)?;
                current.push(ch);
            }
            '>' | '+' | '~' if bracket_depth == 0 => {
                flush(&mut current, &mut tokens);
                tokens.push(ch.to_string());
            }
            ch if ch.is_ascii_whitespace() && bracket_depth == 0 => {
                flush(&mut current, &mut tokens);
            }
            _ => current.push(ch),
        }
    }
    if bracket_depth != 0 {
        return None;
    }
    flush(&mut current, &mut tokens);
    Some(tokens)
}

fn parse_chain(selector: &str) -> Option<Vec<Part>> {
    let mut parts: Vec<Part> = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokenize(selector)? {
        let combinator = match token.as_str() {
            ">" => Some(Combinator::Child),
            "+" => Some(Combinator::AdjacentSibling),
            "~" => Some(Combinator::GeneralSibling),
            _ => None,
        };
        if let Some(combinator) = combinator {
            if pending.is_some() || parts.is_empty() {
                return None;
            }
            pending = Some(combinator);
            continue;
        }

        let compound = parse_compound(&token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(Part {
            compound,
            combinator,
        });
    }

    if parts.is_empty() || pending.is_some() {
        return None;
    }
    Some(parts)
}

fn parse_compound(part: &str) -> Option<Compound> {
    let bytes = part.as_bytes();
    let mut i = 0usize;
    let mut compound = Compound::default();

    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if compound.universal || compound.tag.is_some() {
                    return None;
                }
                compound.universal = true;
                i += 1;
            }
            b'#' => {
                let (id, next) = parse_ident(part, i + 1)?;
                if compound.id.replace(id).is_some() {
                    return None;
                }
                i = next;
            }
            b'.' => {
                let (class, next) = parse_ident(part, i + 1)?;
                compound.classes.push(class);
                i = next;
            }
            b'[' => {
                let end = i + part[i..].find(']')?;
                compound.attrs.push(parse_attr(&part[i + 1..end])?);
                i = end + 1;
            }
            b':' => {
                let (name, next) = parse_ident(part, i + 1)?;
                let pseudo = match name.as_str() {
                    "first-child" => PseudoClass::FirstChild,
                    "last-child" => PseudoClass::LastChild,
                    "disabled" => PseudoClass::Disabled,
                    _ => return None,
                };
                compound.pseudo.push(pseudo);
                i = next;
            }
            _ => {
                if i != 0 {
                    return None;
                }
                let (tag, next) = parse_ident(part, i)?;
                compound.tag = Some(tag);
                i = next;
            }
        }
    }

    Some(compound)
}

fn parse_ident(part: &str, start: usize) -> Option<(String, usize)> {
    let tail = part.get(start..)?;
    let len = tail
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(tail.len());
    if len == 0 {
        return None;
    }
    Some((tail[..len].to_string(), start + len))
}

fn parse_attr(body: &str) -> Option<AttrCondition> {
    let body = body.trim();
    let Some(eq) = body.find('=') else {
        let key = body.to_string();
        return valid_key(&key).then_some(AttrCondition::Exists { key });
    };

    let (raw_key, op) = match body[..eq].chars().last() {
        Some(c @ ('^' | '$' | '*' | '~')) => (&body[..eq - 1], Some(c)),
        _ => (&body[..eq], None),
    };
    let key = raw_key.trim().to_string();
    if !valid_key(&key) {
        return None;
    }
    let raw_value = body[eq + 1..].trim();
    let value = raw_value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| {
            raw_value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
        })
        .unwrap_or(raw_value)
        .to_string();

    Some(match op {
        None => AttrCondition::Eq { key, value },
        Some('^') => AttrCondition::StartsWith { key, value },
        Some('$') => AttrCondition::EndsWith { key, value },
        Some('*') => AttrCondition::Contains { key, value },
        Some(_) => AttrCondition::Includes { key, value },
    })
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}
