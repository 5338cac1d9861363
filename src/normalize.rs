//! Turns raw model output into a loadable component module.
//!
//! The pipeline is: strip Markdown fence lines, trim, drop conversational
//! preamble before the first code token, trim again, then make sure exactly
//! one default export exists. Every step is a fixed point on its own output,
//! so [`normalize`] is idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::EmptyOutputError;

/// Identifier used when no capitalized component name can be inferred.
pub const DEFAULT_COMPONENT_NAME: &str = "App";

/// Shown whenever there is no usable component text.
pub const PLACEHOLDER_COMPONENT: &str = r#"export default function App() {
  return (
    <div style={{display:'flex',alignItems:'center',justifyContent:'center',height:'100vh',fontFamily:'Inter, sans-serif',color:'#64748b'}}>
      <div style={{textAlign:'center'}}>
        <div style={{fontSize:'48px',marginBottom:'16px',opacity:.3}}>⚡</div>
        <div style={{fontSize:'14px'}}>Generate a component to see live preview</div>
      </div>
    </div>
  );
}"#;

static FENCE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*```[A-Za-z0-9_+.#-]*\s*$").expect("fence regex must compile")
});

static CODE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"\bimport[ \t]+[\w$]|\bimport[ \t]*[{*'"]"#,
        r"|\bexport[ \t]+(?:default[ \t]+)?(?:async[ \t]+)?(?:function|class|const|let|var|interface|type|enum)\b",
        r"|\bexport[ \t]*[{*]",
        r"|\b(?:async[ \t]+)?function[ \t]*\*?[ \t]*[A-Za-z_$][\w$]*[ \t]*[(<]",
        r"|\b(?:const|let|var)[ \t]+(?:[A-Za-z_$][\w$]*|\{[^}\n]*\}|\[[^\]\n]*\])[ \t]*(?::[^=\n]*)?=",
        r"|\bclass[ \t]+[A-Z][\w$]*",
        r"|\binterface[ \t]+[A-Z][\w$]*",
        r"|\btype[ \t]+[A-Za-z_$][\w$]*[ \t]*(?:<[^>\n]*>)?[ \t]*=",
        r"|\benum[ \t]+[A-Z][\w$]*",
    ))
    .expect("code token regex must compile")
});

static LEADING_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*(//|/\*|['"]use (?:client|strict)['"])"#)
        .expect("leading comment regex must compile")
});

static DEFAULT_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*export\s+default\b|export\s*\{[^}]*\bas\s+default\b")
        .expect("default export regex must compile")
});

static COMPONENT_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:export\s+)?(?:async\s+)?function\s+([A-Z][A-Za-z0-9_$]*)\s*[(<]")
        .expect("component function regex must compile")
});

static COMPONENT_CONST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:export\s+)?(?:const|let|var)\s+([A-Z][A-Za-z0-9_$]*)\s*(?::[^=\n]+)?=")
        .expect("component const regex must compile")
});

/// Normalizes `raw`, returning [`PLACEHOLDER_COMPONENT`] when nothing usable
/// remains.
pub fn normalize(raw: &str) -> String {
    normalize_strict(raw).unwrap_or_else(|_| PLACEHOLDER_COMPONENT.to_string())
}

/// Normalizes `raw`, failing only when nothing but whitespace and fence lines
/// remains.
pub fn normalize_strict(raw: &str) -> Result<String, EmptyOutputError> {
    let unfenced = strip_fences(raw);
    let fences_removed = unfenced.len() != raw.len();
    let trimmed = unfenced.trim();
    if trimmed.is_empty() {
        tracing::debug!(raw_len = raw.len(), "normalization left no component code");
        return Err(EmptyOutputError);
    }

    let code = strip_preamble(trimmed).trim();
    let preamble_bytes = trimmed.len() - code.len();
    let normalized = ensure_default_export(code);
    tracing::debug!(
        fences_removed,
        preamble_bytes,
        export_appended = normalized.len() != code.len(),
        "normalized generated component"
    );
    Ok(normalized)
}

/// Display-safety variant used on partial text: fence stripping and export
/// repair only. Never fails.
pub fn normalize_for_display(raw: &str) -> String {
    let unfenced = strip_fences(raw);
    let trimmed = unfenced.trim();
    if trimmed.is_empty() {
        return PLACEHOLDER_COMPONENT.to_string();
    }
    ensure_default_export(trimmed)
}

/// Removes Markdown fence-only lines.
///
/// With two or more fence lines only the text between the first and the last
/// fence is kept; any fence line inside that range is dropped too. A single
/// fence line (an unclosed block mid-stream, or a stray closer) is removed
/// on its own.
pub fn strip_fences(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let fences: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| is_fence_line(line))
        .map(|(index, _)| index)
        .collect();

    let (start, end) = match fences.as_slice() {
        [] => return text.to_string(),
        [first, .., last] => (*first + 1, *last),
        [_] => (0, lines.len()),
    };

    lines[start..end]
        .iter()
        .filter(|line| !is_fence_line(line))
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_fence_line(line: &str) -> bool {
    FENCE_LINE.is_match(line)
}

/// Drops conversational text before the first import or declaration token.
///
/// Tokens are found anywhere in the text, so `Sure! import React ...` keeps
/// its import. Comments and directives only count at the start of a line.
/// Text without any token is returned unchanged.
pub fn strip_preamble(text: &str) -> &str {
    let token = CODE_TOKEN.find(text).map(|found| found.start());
    let comment = LEADING_COMMENT
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|found| found.start());

    match token.into_iter().chain(comment).min() {
        Some(offset) => &text[offset..],
        None => text,
    }
}

pub fn has_default_export(text: &str) -> bool {
    DEFAULT_EXPORT.is_match(text)
}

/// Picks the component identifier a default export should reference: the
/// last top-level capitalized function, else the last top-level capitalized
/// constant, else [`DEFAULT_COMPONENT_NAME`]. All-caps names are treated as
/// constants, not components.
pub fn infer_component_name(text: &str) -> &str {
    last_component_capture(&COMPONENT_FUNCTION, text)
        .or_else(|| last_component_capture(&COMPONENT_CONST, text))
        .unwrap_or(DEFAULT_COMPONENT_NAME)
}

fn last_component_capture<'a>(pattern: &Regex, text: &'a str) -> Option<&'a str> {
    pattern
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str())
        .filter(|name| name.chars().any(|ch| ch.is_ascii_lowercase()))
        .last()
}

/// Appends `export default <Name>;` unless a default export already exists.
pub fn ensure_default_export(text: &str) -> String {
    if has_default_export(text) {
        return text.to_string();
    }
    let name = infer_component_name(text);
    format!("{text}\n\nexport default {name};")
}
