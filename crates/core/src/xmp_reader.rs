use std::collections::HashMap;

/// Looks up the first property `(namespace_uri, local_name)` in an XMP packet.
///
/// Both the element form (`<xmp:CreateDate>...</xmp:CreateDate>`) and the RDF
/// attribute shorthand (`xmp:CreateDate="..."`) are recognized. Prefixes are
/// resolved through the `xmlns:` declarations in scope, so any prefix bound
/// to `namespace_uri` matches.
pub fn find_property(xml: &str, namespace_uri: &str, local_name: &str) -> Option<String> {
    let mut scopes: Vec<HashMap<String, String>> = Vec::new();
    let mut cursor = 0usize;

    while let Some(start) = xml[cursor..].find('<') {
        let start = cursor + start;

        if xml[start..].starts_with("<!--") {
            cursor = match xml[start..].find("-->") {
                Some(end) => start + end + 3,
                None => break,
            };
            continue;
        }
        if xml[start..].starts_with("<![CDATA[") {
            cursor = match xml[start..].find("]]>") {
                Some(end) => start + end + 3,
                None => break,
            };
            continue;
        }

        let Some(end) = find_tag_end(xml, start + 1) else {
            break;
        };
        let raw_tag = &xml[start + 1..end];
        cursor = end + 1;

        if raw_tag.starts_with('?') || raw_tag.starts_with('!') {
            continue;
        }
        if raw_tag.starts_with('/') {
            scopes.pop();
            continue;
        }

        let self_closing = raw_tag.ends_with('/');
        let raw_tag = raw_tag.trim_end_matches('/');
        let (tag_name, raw_attributes) = raw_tag
            .split_once(|c: char| c.is_ascii_whitespace())
            .unwrap_or((raw_tag, ""));
        let attributes = parse_attributes(raw_attributes);

        let declared = attributes
            .iter()
            .filter_map(|(name, value)| {
                if name == "xmlns" {
                    Some((String::new(), value.clone()))
                } else {
                    name.strip_prefix("xmlns:")
                        .map(|prefix| (prefix.to_string(), value.clone()))
                }
            })
            .collect::<HashMap<_, _>>();
        scopes.push(declared);

        if matches_name(tag_name, &scopes, namespace_uri, local_name, true) && !self_closing {
            if let Some(text) = element_text(xml, end + 1, tag_name) {
                return Some(text);
            }
        }

        for (name, value) in &attributes {
            if name == "xmlns" || name.starts_with("xmlns:") {
                continue;
            }
            if matches_name(name, &scopes, namespace_uri, local_name, false) {
                let value = unescape(value.trim());
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }

        if self_closing {
            scopes.pop();
        }
    }

    None
}

fn find_tag_end(xml: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, ch) in xml[from..].char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '>') => return Some(from + offset),
            (None, _) => {}
        }
    }
    None
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    let bytes = raw.as_bytes();
    let mut out = Vec::new();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            break;
        }

        let name_start = cursor;
        while cursor < bytes.len()
            && !bytes[cursor].is_ascii_whitespace()
            && bytes[cursor] != b'='
        {
            cursor += 1;
        }
        let name = &raw[name_start..cursor];

        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() || bytes[cursor] != b'=' {
            continue;
        }
        cursor += 1;
        while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            break;
        }

        let quote = bytes[cursor];
        if quote != b'"' && quote != b'\'' {
            // unquoted values are not XML; skip the token
            while cursor < bytes.len() && !bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            continue;
        }
        cursor += 1;
        let value_start = cursor;
        while cursor < bytes.len() && bytes[cursor] != quote {
            cursor += 1;
        }
        if cursor >= bytes.len() {
            break;
        }
        out.push((name.to_string(), raw[value_start..cursor].to_string()));
        cursor += 1;
    }

    out
}

fn matches_name(
    qualified: &str,
    scopes: &[HashMap<String, String>],
    namespace_uri: &str,
    local_name: &str,
    is_element: bool,
) -> bool {
    let (prefix, local) = match qualified.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        // unprefixed attributes carry no namespace
        None if !is_element => return false,
        None => ("", qualified),
    };
    if local != local_name {
        return false;
    }
    resolve_prefix(scopes, prefix) == Some(namespace_uri)
}

fn resolve_prefix<'a>(scopes: &'a [HashMap<String, String>], prefix: &str) -> Option<&'a str> {
    scopes
        .iter()
        .rev()
        .find_map(|scope| scope.get(prefix))
        .map(String::as_str)
}

/// Text up to the first child or the closing tag, like an element's `.text`.
fn element_text(xml: &str, from: usize, tag_name: &str) -> Option<String> {
    let close_tag = format!("</{}>", tag_name);
    let close_pos = from + xml[from..].find(&close_tag)?;
    let content = &xml[from..close_pos];
    let text = match content.find('<') {
        Some(child) => &content[..child],
        None => content,
    };
    let text = unescape(text.trim());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn unescape(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
