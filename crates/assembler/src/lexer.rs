//! Tokenizer for lazyflow assembly text.

use crate::error::AsmError;

/// A single token from an assembly line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// A bare word: an opcode mnemonic, `true` or `false`.
    Word(String),
    /// A numeric literal.
    Number(f64),
    /// A double-quoted string, unescaped.
    Str(String),
    /// A chunk label reference, `@label`.
    Label(String),
    /// An aggregate placeholder, `[...]` or `{...}`.
    Placeholder(String),
}

/// Tokenize a single line of assembly text.
///
/// Returns an empty Vec for blank lines and comment-only lines.
/// Comments start with `;` outside a string and extend to end of line.
pub(crate) fn tokenize_line(line: &str, line_num: usize) -> Result<Vec<Token>, AsmError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == ';' {
            break;
        }
        if c == '"' {
            chars.next();
            tokens.push(Token::Str(read_string(&mut chars, line_num)?));
            continue;
        }

        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || c == ';' {
                break;
            }
            word.push(c);
            chars.next();
        }
        tokens.push(classify(word, line_num)?);
    }

    Ok(tokens)
}

fn read_string(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    line_num: usize,
) -> Result<String, AsmError> {
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(AsmError::UnterminatedString { line: line_num }),
            Some('"') => return Ok(out),
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    return Err(AsmError::InvalidEscape {
                        line: line_num,
                        escape: other,
                    })
                }
                None => return Err(AsmError::UnterminatedString { line: line_num }),
            },
            Some(c) => out.push(c),
        }
    }
}

fn classify(word: String, line_num: usize) -> Result<Token, AsmError> {
    if let Some(label) = word.strip_prefix('@') {
        if label.is_empty() {
            return Err(AsmError::UnexpectedToken {
                line: line_num,
                token: word,
            });
        }
        return Ok(Token::Label(label.to_string()));
    }
    if word == "[...]" || word == "{...}" {
        return Ok(Token::Placeholder(word));
    }
    let numeric = word
        .as_bytes()
        .first()
        .is_some_and(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.'))
        || word == "NaN"
        || word == "inf";
    if numeric {
        return word
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| AsmError::InvalidNumber {
                line: line_num,
                token: word,
            });
    }
    Ok(Token::Word(word))
}
