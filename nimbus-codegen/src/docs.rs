// BBCode documentation to XML doc comments. Known tags map to their XML
// counterparts; unknown tags pass through verbatim so nothing is silently
// dropped from the docs.

use crate::naming::to_pascal_case;

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

// Paired tags with a direct XML equivalent.
const PAIRED: &[(&str, &str, &str)] = &[
    ("b", "<b>", "</b>"),
    ("i", "<i>", "</i>"),
    ("u", "<u>", "</u>"),
    ("code", "<c>", "</c>"),
    ("codeblock", "<code>", "</code>"),
];

fn emit_tag(token: &str, out: &mut String) {
    if let Some(stripped) = token.strip_prefix('/') {
        if let Some((_, _, close)) = PAIRED.iter().find(|(name, _, _)| *name == stripped) {
            out.push_str(close);
            return;
        }
        out.push('[');
        escape_text(token, out);
        out.push(']');
        return;
    }

    if let Some((_, open, _)) = PAIRED.iter().find(|(name, _, _)| *name == token) {
        out.push_str(open);
        return;
    }

    // Reference tags: [method x], [member x], [signal x], [constant x],
    // [enum x].
    if let Some((kind, target)) = token.split_once(' ') {
        if matches!(kind, "method" | "member" | "signal" | "constant" | "enum") {
            out.push_str(&format!("<see cref=\"{}\"/>", to_pascal_case(target)));
            return;
        }
    }

    // A lone capitalized word is a class reference.
    if token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase())
        && token.chars().all(|c| c.is_ascii_alphanumeric())
    {
        out.push_str(&format!("<see cref=\"{token}\"/>"));
        return;
    }

    // Unknown tag passes through verbatim.
    out.push('[');
    escape_text(token, out);
    out.push(']');
}

pub fn bbcode_to_xml(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 16);
    let mut rest = source;
    while let Some(open) = rest.find('[') {
        escape_text(&rest[..open], &mut out);
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) => {
                emit_tag(&after[..close], &mut out);
                rest = &after[close + 1..];
            }
            None => {
                // Unbalanced bracket; keep the raw text.
                out.push('[');
                escape_text(after, &mut out);
                return out;
            }
        }
    }
    escape_text(rest, &mut out);
    out
}

/// Wrap converted doc text into `/// <summary>` lines.
pub fn xml_doc_block(bbcode: &str, indent: &str) -> String {
    if bbcode.is_empty() {
        return String::new();
    }
    let mut out = format!("{indent}/// <summary>\n");
    for line in bbcode_to_xml(bbcode).lines() {
        out.push_str(indent);
        out.push_str("/// ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(indent);
    out.push_str("/// </summary>\n");
    out
}

// ---------------------------------------------------------------------------
// External documentation data
// ---------------------------------------------------------------------------

/// BBCode documentation keyed by "Class" or "Class.member", loaded from a
/// JSON sidecar. Classes without an entry generate without docs.
#[derive(Default, serde::Deserialize)]
pub struct DocData {
    entries: std::collections::HashMap<String, String>,
}

impl DocData {
    pub fn load(path: &std::path::Path) -> Result<DocData, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let entries = serde_json::from_str(&text)
            .map_err(|e| format!("cannot parse {}: {e}", path.display()))?;
        Ok(DocData { entries })
    }

    pub fn class_doc(&self, class: &str) -> Option<&str> {
        self.entries.get(class).map(String::as_str)
    }

    pub fn member_doc(&self, class: &str, member: &str) -> Option<&str> {
        self.entries.get(&format!("{class}.{member}")).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paired_tags_map_to_xml() {
        assert_eq!(
            bbcode_to_xml("Use [code]free[/code] with [b]care[/b]."),
            "Use <c>free</c> with <b>care</b>."
        );
    }

    #[test]
    fn reference_tags_become_see_cref() {
        assert_eq!(
            bbcode_to_xml("See [method queue_delete] on [Object]."),
            "See <see cref=\"QueueDelete\"/> on <see cref=\"Object\"/>."
        );
    }

    #[test]
    fn unknown_tags_pass_through_verbatim() {
        assert_eq!(
            bbcode_to_xml("[gdscript]var x = 1[/gdscript]"),
            "[gdscript]var x = 1[/gdscript]"
        );
    }

    #[test]
    fn text_is_xml_escaped() {
        assert_eq!(bbcode_to_xml("a < b && c"), "a &lt; b &amp;&amp; c");
    }
}
