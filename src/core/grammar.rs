//! Grammar-rule parser: pulls rule identifiers out of the `grammarRules` blob
//!
//! The blob starts with a literal list of `[rule, explanation]` pairs, e.g.
//! `[['rule-a', 'why a'], ['rule-b', 'why b']]`, followed by free text.
//! Accepted literal forms: list/tuple brackets, commas, quoted strings (with
//! `u`/`r` prefixes and adjacent-string concatenation), `None`, `True`,
//! `False` and numbers. Anything else, or nesting deeper than
//! `GRAMMAR_MAX_NESTING`, is a malformed literal and yields an empty rule list.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::types::{GrammarReason, GrammarRules};
use crate::{GRAMMAR_CLOSING_MARKER, GRAMMAR_MAX_NESTING};

lazy_static! {
    // One token at the head of the input, leading whitespace skipped
    static ref RE_TOKEN: Regex = Regex::new(
        r#"^\s*(?:(?P<open>[\[(])|(?P<close>[\])])|(?P<comma>,)|(?P<prefix>[uUrR]?)(?:'(?P<single>(?:[^'\\\n]|\\.)*)'|"(?P<double>(?:[^"\\\n]|\\.)*)")|(?P<scalar>(?:None|True|False)\b|[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?))"#
    ).unwrap();
}

/// Parsed literal value
#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Str(String),
    Seq(Vec<Literal>),
    /// `None`, booleans and numbers; never a rule identifier
    Scalar,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open(char),
    Close(char),
    Comma,
    Str(String),
    Scalar,
}

/// Grammar-rule parser
#[derive(Debug, Default)]
pub struct GrammarRuleParser;

impl GrammarRuleParser {
    /// Create new parser
    pub fn new() -> Self {
        Self
    }

    /// Extract rule identifiers; never fails, the reason says what happened
    pub fn parse(&self, raw: &str) -> GrammarRules {
        let (candidate, terminated) = match raw.find(GRAMMAR_CLOSING_MARKER) {
            Some(pos) => (&raw[..pos + GRAMMAR_CLOSING_MARKER.len()], true),
            None => (raw, false),
        };

        let result = match parse_literal(candidate) {
            Some(Literal::Seq(items)) => extract_rules(&items),
            Some(_) => GrammarRules::failed(GrammarReason::G003_MALFORMED_LITERAL),
            None if terminated => GrammarRules::failed(GrammarReason::G003_MALFORMED_LITERAL),
            None => GrammarRules::failed(GrammarReason::G004_UNTERMINATED_LITERAL),
        };

        if result.is_failure() {
            warn!(
                reason = result.reason.code(),
                len = candidate.len(),
                head = candidate.chars().take(80).collect::<String>().as_str(),
                "could not parse grammar rules"
            );
        } else {
            debug!(rules = result.rules.len(), "parsed grammar rules");
        }
        result
    }

    /// Quick parse - just the identifiers
    pub fn rules(&self, raw: &str) -> Vec<String> {
        self.parse(raw).into_rules()
    }
}

/// First element of every pair, in order
fn extract_rules(items: &[Literal]) -> GrammarRules {
    let mut rules = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Literal::Seq(pair) => match pair.first() {
                Some(Literal::Str(rule)) => rules.push(rule.clone()),
                _ => return GrammarRules::failed(GrammarReason::G005_NOT_A_PAIR),
            },
            Literal::Str(_) | Literal::Scalar => {
                return GrammarRules::failed(GrammarReason::G005_NOT_A_PAIR)
            }
        }
    }
    GrammarRules::parsed(rules)
}

/// Parse a complete literal; `None` when malformed or followed by extra tokens
fn parse_literal(text: &str) -> Option<Literal> {
    let tokens = tokenize(text)?;
    let mut pos = 0;
    let value = parse_value(&tokens, &mut pos, 0)?;
    (pos == tokens.len()).then_some(value)
}

fn tokenize(text: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = text;

    loop {
        if rest.trim_start().is_empty() {
            return Some(tokens);
        }
        let caps = RE_TOKEN.captures(rest)?;
        let token = if let Some(m) = caps.name("open") {
            Token::Open(m.as_str().chars().next()?)
        } else if let Some(m) = caps.name("close") {
            Token::Close(m.as_str().chars().next()?)
        } else if caps.name("comma").is_some() {
            Token::Comma
        } else if let Some(m) = caps.name("single").or_else(|| caps.name("double")) {
            let raw = caps
                .name("prefix")
                .is_some_and(|p| p.as_str().eq_ignore_ascii_case("r"));
            if raw {
                Token::Str(m.as_str().to_string())
            } else {
                Token::Str(unescape(m.as_str())?)
            }
        } else if caps.name("scalar").is_some() {
            Token::Scalar
        } else {
            return None;
        };
        tokens.push(token);
        rest = &rest[caps.get(0)?.end()..];
    }
}

/// `depth` counts the brackets already open around `pos`
fn parse_value(tokens: &[Token], pos: &mut usize, depth: usize) -> Option<Literal> {
    match tokens.get(*pos)? {
        Token::Str(s) => {
            let mut joined = s.clone();
            *pos += 1;
            // 'a' 'b' is one literal
            while let Some(Token::Str(next)) = tokens.get(*pos) {
                joined.push_str(next);
                *pos += 1;
            }
            Some(Literal::Str(joined))
        }
        Token::Scalar => {
            *pos += 1;
            Some(Literal::Scalar)
        }
        Token::Open(open) => {
            if depth >= GRAMMAR_MAX_NESTING {
                return None;
            }
            let close = if *open == '[' { ']' } else { ')' };
            *pos += 1;
            let mut items = Vec::new();
            loop {
                if tokens.get(*pos)? == &Token::Close(close) {
                    *pos += 1;
                    return Some(Literal::Seq(items));
                }
                items.push(parse_value(tokens, pos, depth + 1)?);
                match tokens.get(*pos)? {
                    Token::Comma => *pos += 1,
                    Token::Close(c) if *c == close => {}
                    _ => return None,
                }
            }
        }
        Token::Close(_) | Token::Comma => None,
    }
}

/// Resolve the escapes a quoted literal can carry.
///
/// Unknown escapes are kept verbatim; a truncated `\x`, `\u` or `\U` makes
/// the literal malformed.
fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some(e @ ('\\' | '\'' | '"')) => out.push(e),
            Some('x') => out.push(hex_escape(&mut chars, 2)?),
            Some('u') => out.push(hex_escape(&mut chars, 4)?),
            Some('U') => out.push(hex_escape(&mut chars, 8)?),
            Some(first @ '0'..='7') => {
                let mut code = first.to_digit(8)?;
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code)?);
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Some(out)
}

/// Exactly `digits` hex digits naming a valid code point
fn hex_escape(chars: &mut impl Iterator<Item = char>, digits: usize) -> Option<char> {
    let hex: String = chars.take(digits).collect();
    if hex.chars().count() != digits || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    char::from_u32(u32::from_str_radix(&hex, 16).ok()?)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_with_trailing_junk() {
        let parser = GrammarRuleParser::new();
        let rules = parser.rules("[['rule-a','explanation a'], ['rule-b','explanation b']] trailing junk");
        assert_eq!(rules, vec!["rule-a", "rule-b"]);
    }

    #[test]
    fn test_malformed_returns_empty() {
        let parser = GrammarRuleParser::new();
        let result = parser.parse("[['rule-a', unterminated");
        assert!(result.rules.is_empty());
        assert!(result.is_failure());
        assert_eq!(result.reason, GrammarReason::G004_UNTERMINATED_LITERAL);
    }

    #[test]
    fn test_malformed_with_marker() {
        let parser = GrammarRuleParser::new();
        let result = parser.parse("[['rule-a' 'no comma', x]] tail");
        assert!(result.rules.is_empty());
        assert_eq!(result.reason, GrammarReason::G003_MALFORMED_LITERAL);
    }

    #[test]
    fn test_empty_list_is_not_an_error() {
        let parser = GrammarRuleParser::new();
        let result = parser.parse("[]");
        assert!(result.rules.is_empty());
        assert!(!result.is_failure());
        assert_eq!(result.reason, GrammarReason::G002_RULES_EMPTY);
    }

    #[test]
    fn test_double_quotes_and_escapes() {
        let parser = GrammarRuleParser::new();
        let rules = parser.rules(r#"[["l'articolo", 'it\'s "the"'], ('di + il = del', "tuple pair")]] more"#);
        assert_eq!(rules, vec!["l'articolo", "di + il = del"]);
    }

    #[test]
    fn test_multiline_literal() {
        let parser = GrammarRuleParser::new();
        let raw = "[\n  ['sotto', 'under'],\n  ['il', 'masculine article']]\nNotes follow";
        assert_eq!(parser.rules(raw), vec!["sotto", "il"]);
    }

    #[test]
    fn test_trailing_comma_allowed() {
        let parser = GrammarRuleParser::new();
        assert_eq!(parser.rules("[['a', 'x',]] tail"), vec!["a"]);
    }

    #[test]
    fn test_item_not_a_pair() {
        let parser = GrammarRuleParser::new();
        let result = parser.parse("['loose', ['rule', 'x']]");
        assert!(result.rules.is_empty());
        assert_eq!(result.reason, GrammarReason::G005_NOT_A_PAIR);
    }

    #[test]
    fn test_mismatched_brackets() {
        let parser = GrammarRuleParser::new();
        assert!(parser.parse("[('a', 'b']]").is_failure());
    }

    #[test]
    fn test_determinism() {
        let parser = GrammarRuleParser::new();
        let raw = "[['a', 'x'], ['b', 'y']] tail";
        assert_eq!(parser.parse(raw), parser.parse(raw));
    }

    #[test]
    fn test_deep_nesting_degrades_without_overflow() {
        let parser = GrammarRuleParser::new();

        let unterminated = parser.parse(&"[".repeat(100_000));
        assert!(unterminated.rules.is_empty());
        assert!(unterminated.is_failure());

        let closed = format!("{}]] tail", "[".repeat(100_000));
        let result = parser.parse(&closed);
        assert!(result.rules.is_empty());
        assert_eq!(result.reason, GrammarReason::G003_MALFORMED_LITERAL);
    }

    #[test]
    fn test_nesting_limit_boundary() {
        let parser = GrammarRuleParser::new();
        // Outer list and pair take two levels
        let nested = |extra: usize| {
            format!("[['x', {}'y'{}]]", "(".repeat(extra), ")".repeat(extra))
        };

        assert_eq!(parser.rules(&nested(GRAMMAR_MAX_NESTING - 2)), vec!["x"]);
        assert_eq!(
            parser.parse(&nested(GRAMMAR_MAX_NESTING - 1)).reason,
            GrammarReason::G003_MALFORMED_LITERAL
        );
    }

    #[test]
    fn test_adjacent_strings_concatenate() {
        let parser = GrammarRuleParser::new();
        assert_eq!(parser.rules("[['di ' 'il', 'x']] tail"), vec!["di il"]);
        assert_eq!(parser.rules(r#"[['a' "b" 'c', 'x']]"#), vec!["abc"]);
    }

    #[test]
    fn test_scalar_explanations_accepted() {
        let parser = GrammarRuleParser::new();
        assert_eq!(parser.rules("[['rule', None]] tail"), vec!["rule"]);
        assert_eq!(
            parser.rules("[['a', True], ['b', False], ['c', 3], ['d', -1.5e3]]"),
            vec!["a", "b", "c", "d"]
        );
    }

    #[test]
    fn test_scalar_rule_is_not_a_pair() {
        let parser = GrammarRuleParser::new();
        let result = parser.parse("[[None, 'x']]");
        assert!(result.rules.is_empty());
        assert_eq!(result.reason, GrammarReason::G005_NOT_A_PAIR);
    }

    #[test]
    fn test_bare_identifier_still_malformed() {
        let parser = GrammarRuleParser::new();
        assert!(parser.parse("[['rule', Nonesuch]]").is_failure());
    }

    #[test]
    fn test_string_prefixes() {
        let parser = GrammarRuleParser::new();
        assert_eq!(parser.rules(r"[[u'perché', 'why']]"), vec!["perché"]);
        assert_eq!(parser.rules(r"[[r'a\nb', 'raw']]"), vec![r"a\nb"]);
    }

    #[test]
    fn test_unicode_and_hex_escapes() {
        let parser = GrammarRuleParser::new();
        assert_eq!(parser.rules(r"[['perch\u00e9', 'x']]"), vec!["perché"]);
        assert_eq!(parser.rules(r"[['caf\xe9', 'x']]"), vec!["café"]);
        assert_eq!(parser.rules(r"[['\U0001F600', 'x']]"), vec!["\u{1F600}"]);
        assert_eq!(parser.rules(r"[['\101', 'x']]"), vec!["A"]);
    }

    #[test]
    fn test_truncated_hex_escape_is_malformed() {
        let parser = GrammarRuleParser::new();
        let result = parser.parse(r"[['bad\x4', 'x']]");
        assert_eq!(result.reason, GrammarReason::G003_MALFORMED_LITERAL);
    }
}
