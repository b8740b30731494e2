//! HTML tokenizer
//!
//! A lenient, tag-level lexer. Anything that does not form a complete
//! construct comes back from the lexer as an error span, which the tree
//! builder keeps as literal text.

use logos::{Lexer, Logos};

#[derive(Logos, Debug, Clone, PartialEq)]
pub enum HtmlToken<'src> {
    /// Comment body, without the delimiters
    #[token("<!--", lex_comment)]
    Comment(&'src str),

    #[regex(r"<![dD][oO][cC][tT][yY][pP][eE][^>]*>", |lex| lex.slice())]
    Doctype(&'src str),

    /// Whole start tag, `<` through `>`
    #[regex(r"<[a-zA-Z][a-zA-Z0-9:_.-]*", lex_start_tag)]
    StartTag(&'src str),

    #[regex(r"</[a-zA-Z][^>]*>", |lex| lex.slice())]
    EndTag(&'src str),

    #[regex(r"[^<]+", |lex| lex.slice())]
    Text(&'src str),
}

fn lex_comment<'s>(lex: &mut Lexer<'s, HtmlToken<'s>>) -> &'s str {
    let rest = lex.remainder();
    match rest.find("-->") {
        Some(end) => {
            lex.bump(end + 3);
            &rest[..end]
        }
        None => {
            // Unterminated comments run to the end of input
            lex.bump(rest.len());
            rest
        }
    }
}

fn lex_start_tag<'s>(lex: &mut Lexer<'s, HtmlToken<'s>>) -> Option<&'s str> {
    let end = find_tag_end(lex.remainder())?;
    lex.bump(end + 1);
    Some(lex.slice())
}

/// Byte offset of the `>` closing a start tag whose name was already consumed.
///
/// Quotes only open a value directly after `=` (whitespace allowed between).
fn find_tag_end(rest: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut after_eq = false;

    for (i, c) in rest.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '>' => return Some(i),
            '=' => after_eq = true,
            '"' | '\'' if after_eq => {
                quote = Some(c);
                after_eq = false;
            }
            c if c.is_ascii_whitespace() => {}
            _ => after_eq = false,
        }
    }
    None
}

/// Start tag split into its parts
#[derive(Debug, Clone, PartialEq)]
pub struct StartTag {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub self_closing: bool,
}

/// Split a start tag slice as produced by [`HtmlToken::StartTag`].
///
/// Attribute names are lowercased, values entity-decoded, and the first
/// occurrence of a duplicated attribute wins.
pub fn parse_start_tag(slice: &str) -> StartTag {
    let inner = slice
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(slice);

    let name_end = inner
        .find(|c: char| c.is_ascii_whitespace() || c == '/')
        .unwrap_or(inner.len());
    let name = inner[..name_end].to_ascii_lowercase();

    let chars: Vec<char> = inner[name_end..].chars().collect();
    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c == '/' {
            self_closing = i + 1 == chars.len();
            i += 1;
            continue;
        }
        self_closing = false;

        let start = i;
        while i < chars.len() {
            let c = chars[i];
            if c.is_ascii_whitespace() || c == '/' || (c == '=' && i > start) {
                break;
            }
            i += 1;
        }
        let attr_name: String = chars[start..i].iter().collect::<String>().to_ascii_lowercase();

        let mut j = i;
        while j < chars.len() && chars[j].is_ascii_whitespace() {
            j += 1;
        }

        let value = if j < chars.len() && chars[j] == '=' {
            j += 1;
            while j < chars.len() && chars[j].is_ascii_whitespace() {
                j += 1;
            }
            match chars.get(j) {
                Some(&q) if q == '"' || q == '\'' => {
                    let value_start = j + 1;
                    let mut k = value_start;
                    while k < chars.len() && chars[k] != q {
                        k += 1;
                    }
                    let raw: String = chars[value_start..k].iter().collect();
                    i = (k + 1).min(chars.len());
                    raw
                }
                _ => {
                    let value_start = j;
                    let mut k = value_start;
                    while k < chars.len() && !chars[k].is_ascii_whitespace() {
                        k += 1;
                    }
                    i = k;
                    chars[value_start..k].iter().collect()
                }
            }
        } else {
            String::new()
        };

        if !attr_name.is_empty() && !attributes.iter().any(|(n, _)| *n == attr_name) {
            attributes.push((attr_name, decode_entities(&value)));
        }
    }

    StartTag {
        name,
        attributes,
        self_closing,
    }
}

/// Lowercase tag name of an end tag slice such as `</DIV >`
pub fn end_tag_name(slice: &str) -> String {
    slice
        .trim_start_matches("</")
        .trim_end_matches('>')
        .split(|c: char| c.is_ascii_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Decode the character references the serializer produces, plus numeric ones.
///
/// Unknown or unterminated references are kept verbatim.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate
            .find(';')
            .filter(|&semi| semi > 1 && semi <= 10)
            .and_then(|semi| decode_reference(&candidate[1..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(numeric) = name.strip_prefix('#') {
        let hex = numeric
            .strip_prefix('x')
            .or_else(|| numeric.strip_prefix('X'));
        let code = match hex {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code).filter(|c| *c != '\0');
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Tokenize into `(token, span)` pairs; lexer errors surface as `Err(span)`.
pub fn tokenize(source: &str) -> Vec<Result<HtmlToken<'_>, std::ops::Range<usize>>> {
    let mut lexer = HtmlToken::lexer(source);
    let mut out = Vec::new();
    while let Some(token) = lexer.next() {
        out.push(token.map_err(|_| lexer.span()));
    }
    out
}
