use crate::parser::{ParseError, SyntaxErrorKind};

/// One logical configuration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based line where the statement's first token starts.
    pub line: usize,
    pub tokens: Vec<String>,
}

#[derive(Default)]
struct LexState {
    statements: Vec<Statement>,
    tokens: Vec<String>,
    current: String,
    in_token: bool,
    token_line: usize,
    statement_line: usize,
}

impl LexState {
    fn start_token(&mut self, line: usize) {
        if !self.in_token {
            self.in_token = true;
            self.token_line = line;
        }
    }

    fn flush_token(&mut self) {
        if !self.in_token {
            return;
        }
        if self.tokens.is_empty() {
            self.statement_line = self.token_line;
        }
        self.tokens.push(std::mem::take(&mut self.current));
        self.in_token = false;
    }

    fn flush_statement(&mut self) {
        self.flush_token();
        if self.tokens.is_empty() {
            return;
        }
        self.statements.push(Statement {
            line: self.statement_line,
            tokens: std::mem::take(&mut self.tokens),
        });
    }
}

/// Split configuration text into statements, one per line. A double-quoted
/// token may span several physical lines; inside it `\"` and `\\` are
/// escapes. A `#` at the start of a statement comments out the line.
///
/// Fails only on an unterminated quote, reported at the line where the quote
/// was opened.
pub fn lex(text: &str) -> Result<Vec<Statement>, ParseError> {
    let mut state = LexState::default();
    let mut line = 1;
    let mut quote_open: Option<usize> = None;
    let mut escape = false;
    let mut in_comment = false;

    for ch in text.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                line += 1;
            }
            continue;
        }

        if escape {
            state.current.push(ch);
            escape = false;
            if ch == '\n' {
                line += 1;
            }
            continue;
        }

        if quote_open.is_some() {
            match ch {
                '\\' => escape = true,
                '"' => quote_open = None,
                '\n' => {
                    state.current.push('\n');
                    line += 1;
                }
                '\r' => {}
                _ => state.current.push(ch),
            }
            continue;
        }

        match ch {
            '\n' => {
                state.flush_statement();
                line += 1;
            }
            '"' => {
                state.start_token(line);
                quote_open = Some(line);
            }
            '\\' => {
                state.start_token(line);
                escape = true;
            }
            '#' if state.tokens.is_empty() && !state.in_token => in_comment = true,
            c if c.is_whitespace() => state.flush_token(),
            c => {
                state.start_token(line);
                state.current.push(c);
            }
        }
    }

    if let Some(open_line) = quote_open {
        let token: String = state.current.chars().take(32).collect();
        return Err(ParseError::Syntax {
            line: open_line,
            token: format!("\"{token}"),
            kind: SyntaxErrorKind::UnterminatedQuote,
        });
    }

    state.flush_statement();
    Ok(state.statements)
}

#[cfg(test)]
mod tests {
    use super::lex;
    use crate::parser::{ParseError, SyntaxErrorKind};

    #[test]
    fn quoted_values_with_spaces_are_single_tokens() {
        let stmts = lex("set member \"web servers\" \"db\" plain\n").expect("lex");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].tokens, ["set", "member", "web servers", "db", "plain"]);
    }

    #[test]
    fn escapes_inside_quotes_are_unwrapped() {
        let stmts = lex(r#"set comments "say \"hi\" \\ bye""#).expect("lex");
        assert_eq!(stmts[0].tokens[2], r#"say "hi" \ bye"#);
    }

    #[test]
    fn empty_quotes_produce_empty_token() {
        let stmts = lex("set comments \"\"").expect("lex");
        assert_eq!(stmts[0].tokens, ["set", "comments", ""]);
    }

    #[test]
    fn quoted_token_may_span_lines() {
        let text = "config vpn certificate local\nset certificate \"-----BEGIN\nabc\n-----END\"\nend\n";
        let stmts = lex(text).expect("lex");
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[1].line, 2);
        assert_eq!(stmts[1].tokens[2], "-----BEGIN\nabc\n-----END");
        assert_eq!(stmts[2].line, 5);
    }

    #[test]
    fn comment_lines_are_skipped_but_hash_inside_token_is_kept() {
        let stmts = lex("#config-version=FGT\n  # note\nset name a#b\n").expect("lex");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].line, 3);
        assert_eq!(stmts[0].tokens[2], "a#b");
    }

    #[test]
    fn unterminated_quote_reports_opening_line() {
        let err = lex("config firewall address\nedit \"web\nnext\nend\n").expect_err("must fail");
        match err {
            ParseError::Syntax { line, kind, .. } => {
                assert_eq!(line, 2);
                assert_eq!(kind, SyntaxErrorKind::UnterminatedQuote);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
