//! Cheap structural check used to decide whether partial component text is
//! worth handing to the sandbox.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Paren,
    Bracket,
    Brace,
    Template,
    TemplateExpr,
}

/// Keywords after which a quote starts a string literal.
const QUOTE_KEYWORDS: &[&str] = &[
    "return", "case", "typeof", "in", "of", "yield", "await", "import", "from", "else", "void",
    "delete", "throw", "export",
];

/// True when every bracket is closed and no string, template literal or
/// block comment is left open.
///
/// A quote only opens a string where an expression can start: at the
/// beginning, after an operator or opening delimiter, or after a keyword such
/// as `return`. A quote that follows a word or a closer is JSX text, so
/// `<p>Don't</p>` scans as markup. Quoted strings also end at a newline.
/// Regex literals are not recognized.
pub fn delimiters_balanced(code: &str) -> bool {
    let mut stack: Vec<Frame> = Vec::new();
    let mut chars = code.chars().peekable();
    let mut prev: Option<char> = None;
    let mut word = String::new();
    let mut gap = false;

    while let Some(ch) = chars.next() {
        if stack.last() == Some(&Frame::Template) {
            match ch {
                '\\' => {
                    chars.next();
                }
                '`' => {
                    stack.pop();
                    prev = Some('`');
                    word.clear();
                }
                '$' if chars.peek() == Some(&'{') => {
                    chars.next();
                    stack.push(Frame::TemplateExpr);
                }
                _ => {}
            }
            continue;
        }

        if ch.is_whitespace() {
            gap = true;
            continue;
        }

        match ch {
            '\'' | '"' if opens_string(prev, &word) => {
                if !skip_quoted(&mut chars, ch) {
                    return false;
                }
            }
            '`' => stack.push(Frame::Template),
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
                gap = true;
                continue;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                if !skip_block_comment(&mut chars) {
                    return false;
                }
                gap = true;
                continue;
            }
            '(' => stack.push(Frame::Paren),
            '[' => stack.push(Frame::Bracket),
            '{' => stack.push(Frame::Brace),
            ')' => {
                if stack.pop() != Some(Frame::Paren) {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some(Frame::Bracket) {
                    return false;
                }
            }
            '}' => {
                if !matches!(stack.pop(), Some(Frame::Brace | Frame::TemplateExpr)) {
                    return false;
                }
            }
            _ => {}
        }

        if is_word_char(ch) {
            if gap || !prev.is_some_and(is_word_char) {
                word.clear();
            }
            word.push(ch);
        } else {
            word.clear();
        }
        prev = Some(ch);
        gap = false;
    }

    stack.is_empty()
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

fn opens_string(prev: Option<char>, word: &str) -> bool {
    match prev {
        None => true,
        Some(')' | ']' | '}') => false,
        Some(ch) if is_word_char(ch) => QUOTE_KEYWORDS.contains(&word),
        Some(_) => true,
    }
}

/// Consumes a quoted string body. Returns false only when input ends inside it.
fn skip_quoted(chars: &mut Peekable<Chars<'_>>, quote: char) -> bool {
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '\n' => return true,
            _ if ch == quote => return true,
            _ => {}
        }
    }
    false
}

fn skip_block_comment(chars: &mut Peekable<Chars<'_>>) -> bool {
    while let Some(ch) = chars.next() {
        if ch == '*' && chars.peek() == Some(&'/') {
            chars.next();
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::delimiters_balanced;

    #[test]
    fn complete_component_is_balanced() {
        let code = "import React from 'react';\n\nexport default function App() {\n  const items = [1, 2];\n  return <div className={`p-${items.length}`}>{items.map((i) => <span key={i}>{i}</span>)}</div>;\n}";
        assert!(delimiters_balanced(code));
    }

    #[test]
    fn partial_text_is_not_balanced() {
        assert!(!delimiters_balanced("export default function App() {\n  return ("));
        assert!(!delimiters_balanced("const s = 'unterminated"));
        assert!(!delimiters_balanced("const t = `open ${x"));
        assert!(!delimiters_balanced("/* still writing"));
    }

    #[test]
    fn delimiters_inside_strings_and_comments_are_ignored() {
        assert!(delimiters_balanced("const a = '(';\n// )\n/* ] */ const b = \"{\";"));
    }

    #[test]
    fn jsx_apostrophes_do_not_break_the_scan() {
        assert!(delimiters_balanced("function A() {\n  return <p>Don't panic</p>;\n}"));
    }

    #[test]
    fn apostrophe_before_closers_on_the_same_line_is_text() {
        let code = "export default function Note() {\n  const [open, setOpen] = useState(true);\n  return (\n    <div>\n      {open && <p>Don't forget to save</p>}\n      <button onClick={() => setOpen(false)}>Close</button>\n    </div>\n  );\n}";
        assert!(delimiters_balanced(code));
        assert!(!delimiters_balanced(&code[..code.len() - 1]));
    }

    #[test]
    fn quotes_after_keywords_and_operators_open_strings() {
        assert!(delimiters_balanced("import x from 'a)';\nconst y = cond ? '(' : \"[\";"));
        assert!(delimiters_balanced("function f(k) {\n  switch (k) { case '}': return '{'; }\n}"));
        assert!(!delimiters_balanced("return '"));
        assert!(delimiters_balanced("<p>{name}'s page</p>"));
    }

    #[test]
    fn mismatched_closers_are_rejected() {
        assert!(!delimiters_balanced("(]"));
        assert!(!delimiters_balanced("}"));
    }
}
