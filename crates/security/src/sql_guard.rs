//! Read-only guard for model-generated SQL.
//!
//! The statement is lexed rather than substring-matched: comments, string
//! literals (including `E'...'` and dollar-quoted bodies) and double-quoted
//! identifiers are skipped, so `SELECT 'drop table' AS x` is fine while
//! `SELECT 1; DROP TABLE users` is not.
//!
//! Checks, in order:
//! 1. exactly one statement (a trailing `;` is allowed)
//! 2. it starts with `SELECT` or `WITH`
//! 3. no mutating, DDL or session keyword anywhere
//! 4. no call to a denied server function
//! 5. every table after `FROM`/`JOIN` is allow-listed (CTE names exempt)

use std::collections::HashSet;

use maitred_config::QueryConfig;
use thiserror::Error;

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "truncate", "grant", "revoke",
    "merge", "copy", "call", "do", "execute", "vacuum", "reindex", "cluster", "lock", "comment",
    "set", "reset", "into",
];

const DENIED_FUNCTIONS: &[&str] = &[
    "pg_sleep",
    "pg_read_file",
    "pg_read_binary_file",
    "pg_terminate_backend",
    "pg_cancel_backend",
    "lo_import",
    "lo_export",
    "dblink",
    // These run a query passed as text, out of reach of the table check.
    "query_to_xml",
    "query_to_xmlschema",
    "query_to_xml_and_xmlschema",
    "table_to_xml",
    "table_to_xmlschema",
    "table_to_xml_and_xmlschema",
    "cursor_to_xml",
    "schema_to_xml",
    "database_to_xml",
];

/// Functions whose argument syntax uses `FROM` without naming a table.
const FROM_ARGUMENT_FUNCTIONS: &[&str] = &["extract", "substring", "trim", "overlay"];

/// Words that end a table reference, so they are never taken as an alias.
const CLAUSE_WORDS: &[&str] = &[
    "where", "group", "order", "limit", "offset", "having", "window", "union", "intersect",
    "except", "fetch", "for", "join", "inner", "left", "right", "full", "cross", "natural", "on",
    "using", "lateral", "tablesample",
];

/// Why a statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlRejection {
    #[error("Empty query")]
    Empty,

    #[error("Only a single statement is allowed")]
    MultipleStatements,

    #[error("Only SELECT queries are allowed (statement starts with '{0}')")]
    NotReadOnly(String),

    #[error("Only SELECT queries are allowed (found '{0}')")]
    ForbiddenKeyword(String),

    #[error("Function '{0}' is not allowed")]
    ForbiddenFunction(String),

    #[error("Table '{0}' is not allowed")]
    TableNotAllowed(String),
}

/// Validates that a statement is a single read-only query over allowed tables.
#[derive(Debug, Clone, Default)]
pub struct SqlGuard {
    allowed_tables: HashSet<String>,
}

impl SqlGuard {
    /// Guard with a table allow-list. An empty list disables the table check.
    pub fn new<I, S>(allowed_tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_tables: allowed_tables
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(&config.allowed_tables)
    }

    /// Check a statement and return it normalized (trimmed, no trailing `;`).
    pub fn check(&self, sql: &str) -> Result<String, SqlRejection> {
        let tokens = tokenize(sql);

        let mut statements = tokens
            .split(|t| t.kind == Kind::Semicolon)
            .filter(|s| !s.is_empty());
        let statement = statements.next().ok_or(SqlRejection::Empty)?;
        if statements.next().is_some() {
            return Err(SqlRejection::MultipleStatements);
        }

        let first = &statement[0];
        if !(first.is_word("select") || first.is_word("with")) {
            return Err(SqlRejection::NotReadOnly(first.text.clone()));
        }

        for (i, token) in statement.iter().enumerate() {
            if token.kind != Kind::Word {
                continue;
            }
            if FORBIDDEN_KEYWORDS.contains(&token.text.as_str()) {
                return Err(SqlRejection::ForbiddenKeyword(token.text.to_uppercase()));
            }
            if DENIED_FUNCTIONS.contains(&token.text.as_str())
                && statement.get(i + 1).is_some_and(|t| t.is_symbol('('))
            {
                return Err(SqlRejection::ForbiddenFunction(token.text.clone()));
            }
        }

        if !self.allowed_tables.is_empty() {
            let ctes = cte_names(statement);
            for table in table_references(statement) {
                if !ctes.contains(&table) && !self.allowed_tables.contains(&table) {
                    return Err(SqlRejection::TableNotAllowed(table));
                }
            }
        }

        let last = &statement[statement.len() - 1];
        Ok(sql[first.start..last.end].to_string())
    }
}

// ── Lexer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// Unquoted identifier or keyword, lowercased.
    Word,
    /// `"Quoted"` identifier, lowercased for comparison.
    QuotedIdent,
    Literal,
    Number,
    Symbol(char),
    Semicolon,
}

#[derive(Debug, Clone)]
struct Token {
    kind: Kind,
    text: String,
    start: usize,
    end: usize,
}

impl Token {
    fn is_word(&self, word: &str) -> bool {
        self.kind == Kind::Word && self.text == word
    }

    fn is_symbol(&self, c: char) -> bool {
        self.kind == Kind::Symbol(c)
    }

    fn is_name(&self) -> bool {
        matches!(self.kind, Kind::Word | Kind::QuotedIdent)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn tokenize(sql: &str) -> Vec<Token> {
    let chars: Vec<(usize, char)> = sql.char_indices().collect();
    let end_of = |i: usize| chars.get(i).map_or(sql.len(), |&(pos, _)| pos);
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        if c.is_whitespace() {
            i += 1;
        } else if c == '-' && next == Some('-') {
            while i < chars.len() && chars[i].1 != '\n' {
                i += 1;
            }
        } else if c == '/' && next == Some('*') {
            // Postgres block comments nest.
            let mut depth = 0;
            while i < chars.len() {
                let here = chars[i].1;
                let after = chars.get(i + 1).map(|&(_, c)| c);
                if here == '/' && after == Some('*') {
                    depth += 1;
                    i += 2;
                } else if here == '*' && after == Some('/') {
                    depth -= 1;
                    i += 2;
                    if depth == 0 {
                        break;
                    }
                } else {
                    i += 1;
                }
            }
        } else if c == '\'' {
            (i, _) = skip_quoted(&chars, i + 1, '\'', false);
            tokens.push(Token {
                kind: Kind::Literal,
                text: String::new(),
                start,
                end: end_of(i),
            });
        } else if (c == 'e' || c == 'E') && next == Some('\'') {
            (i, _) = skip_quoted(&chars, i + 2, '\'', true);
            tokens.push(Token {
                kind: Kind::Literal,
                text: String::new(),
                start,
                end: end_of(i),
            });
        } else if c == '"' {
            let body_start = end_of(i + 1);
            let terminated;
            (i, terminated) = skip_quoted(&chars, i + 1, '"', false);
            let body_end = if terminated { chars[i - 1].0 } else { sql.len() };
            tokens.push(Token {
                kind: Kind::QuotedIdent,
                text: sql[body_start..body_end].replace("\"\"", "\"").to_lowercase(),
                start,
                end: end_of(i),
            });
        } else if c == '$' && let Some(tag_end) = dollar_tag_end(&chars, i) {
            let tag = &sql[start..end_of(tag_end + 1)];
            let body_from = end_of(tag_end + 1);
            let close = sql[body_from..]
                .find(tag)
                .map_or(sql.len(), |p| body_from + p + tag.len());
            while i < chars.len() && chars[i].0 < close {
                i += 1;
            }
            tokens.push(Token {
                kind: Kind::Literal,
                text: String::new(),
                start,
                end: close,
            });
        } else if is_ident_start(c) {
            let begin = i;
            while i < chars.len() && is_ident_char(chars[i].1) {
                i += 1;
            }
            let end = end_of(i);
            tokens.push(Token {
                kind: Kind::Word,
                text: sql[chars[begin].0..end].to_lowercase(),
                start,
                end,
            });
        } else if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '.') {
                i += 1;
            }
            let end = end_of(i);
            tokens.push(Token {
                kind: Kind::Number,
                text: sql[start..end].to_string(),
                start,
                end,
            });
        } else {
            i += 1;
            tokens.push(Token {
                kind: if c == ';' { Kind::Semicolon } else { Kind::Symbol(c) },
                text: c.to_string(),
                start,
                end: end_of(i),
            });
        }
    }

    tokens
}

/// Skip a quoted body starting at `i`. Returns the index after the closing
/// quote and whether one was found; unterminated bodies run to the end.
/// A doubled quote is an escaped quote.
fn skip_quoted(
    chars: &[(usize, char)],
    mut i: usize,
    quote: char,
    backslash_escapes: bool,
) -> (usize, bool) {
    while i < chars.len() {
        let c = chars[i].1;
        if backslash_escapes && c == '\\' {
            i += 2;
        } else if c == quote {
            if chars.get(i + 1).map(|&(_, c)| c) == Some(quote) {
                i += 2;
            } else {
                return (i + 1, true);
            }
        } else {
            i += 1;
        }
    }
    (chars.len(), false)
}

/// Index of the closing `$` of a dollar-quote tag (`$$` or `$tag$`) at `i`.
fn dollar_tag_end(chars: &[(usize, char)], i: usize) -> Option<usize> {
    let mut j = i + 1;
    if let Some(&(_, c)) = chars.get(j)
        && c != '$'
        && !is_ident_start(c)
    {
        return None;
    }
    while let Some(&(_, c)) = chars.get(j) {
        if c == '$' {
            return Some(j);
        }
        if !(c.is_alphanumeric() || c == '_') {
            return None;
        }
        j += 1;
    }
    None
}

// ── Structure ────────────────────────────────────────────────────────────

/// Names bound by `name [(columns)] AS (` in a WITH clause.
fn cte_names(tokens: &[Token]) -> HashSet<String> {
    let mut names = HashSet::new();
    for j in 1..tokens.len().saturating_sub(1) {
        if !(tokens[j].is_word("as") && tokens[j + 1].is_symbol('(')) {
            continue;
        }
        let mut k = j - 1;
        if tokens[k].is_symbol(')') {
            match matching_open(tokens, k) {
                Some(open) if open > 0 => k = open - 1,
                _ => continue,
            }
        }
        if tokens[k].is_name() {
            names.insert(tokens[k].text.clone());
        }
    }
    names
}

fn matching_open(tokens: &[Token], close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for k in (0..=close).rev() {
        if tokens[k].is_symbol(')') {
            depth += 1;
        } else if tokens[k].is_symbol('(') {
            depth -= 1;
            if depth == 0 {
                return Some(k);
            }
        }
    }
    None
}

fn matching_close(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    for (k, token) in tokens.iter().enumerate().skip(open) {
        if token.is_symbol('(') {
            depth += 1;
        } else if token.is_symbol(')') {
            depth -= 1;
            if depth == 0 {
                return k;
            }
        }
    }
    tokens.len()
}

/// Whether the `FROM` at `i` is part of a function's argument syntax
/// (`EXTRACT(YEAR FROM ts)`, `x IS DISTINCT FROM y`) rather than a clause.
fn is_argument_from(tokens: &[Token], i: usize) -> bool {
    if i > 0 && tokens[i - 1].is_word("distinct") {
        return true;
    }
    let mut depth = 0usize;
    for k in (0..i).rev() {
        if tokens[k].is_symbol(')') {
            depth += 1;
        } else if tokens[k].is_symbol('(') {
            if depth == 0 {
                return k > 0
                    && tokens[k - 1].kind == Kind::Word
                    && FROM_ARGUMENT_FUNCTIONS.contains(&tokens[k - 1].text.as_str());
            }
            depth -= 1;
        }
    }
    false
}

/// Table names referenced after `FROM` and `JOIN`, schema prefix stripped.
fn table_references(tokens: &[Token]) -> Vec<String> {
    let mut tables = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        let is_from = token.is_word("from");
        if !(is_from || token.is_word("join")) || (is_from && is_argument_from(tokens, i)) {
            continue;
        }

        let mut j = i + 1;
        loop {
            while tokens.get(j).is_some_and(|t| t.is_word("only") || t.is_word("lateral")) {
                j += 1;
            }
            let Some(item) = tokens.get(j) else { break };

            if item.is_symbol('(') {
                // Subquery; its own FROM clauses are visited by the outer loop.
                j = matching_close(tokens, j) + 1;
            } else if item.is_name() {
                let mut name = item.text.clone();
                j += 1;
                while tokens.get(j).is_some_and(|t| t.is_symbol('.'))
                    && tokens.get(j + 1).is_some_and(Token::is_name)
                {
                    name = tokens[j + 1].text.clone();
                    j += 2;
                }
                if tokens.get(j).is_some_and(|t| t.is_symbol('(')) {
                    // Set-returning function call, not a table.
                    j = matching_close(tokens, j) + 1;
                } else {
                    tables.push(name);
                }
            } else {
                break;
            }

            // Optional alias.
            if tokens.get(j).is_some_and(|t| t.is_word("as")) {
                j += 1;
            }
            if let Some(alias) = tokens.get(j)
                && (alias.kind == Kind::QuotedIdent
                    || (alias.kind == Kind::Word && !CLAUSE_WORDS.contains(&alias.text.as_str())))
            {
                j += 1;
            }

            if is_from && tokens.get(j).is_some_and(|t| t.is_symbol(',')) {
                j += 1;
            } else {
                break;
            }
        }
    }

    tables
}
