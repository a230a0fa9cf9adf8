//! Natural-language-to-SQL prompts and reply parsing.

use maitred_core::data::QueryResult;
use maitred_core::message::Message;

/// Largest serialized result handed to the narration prompt.
const MAX_RESULT_CHARS: usize = 8_000;

/// Columns of the tables the context snapshot reads.
fn known_columns(table: &str) -> Option<&'static str> {
    match table {
        "menu_items" => Some("name, price, category, description, available"),
        "orders" => Some("id, customer_name, table_number, total, status, created_at"),
        "users" => Some("id, name, role"),
        _ => None,
    }
}

fn schema_lines(tables: &[String]) -> String {
    tables
        .iter()
        .map(|t| match known_columns(t) {
            Some(columns) => format!("- {t} ({columns})"),
            None => format!("- {t}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Messages asking the model for a single PostgreSQL SELECT statement.
pub fn sql_prompt(question: &str, tables: &[String]) -> Vec<Message> {
    let mut system = String::from(
        "You translate questions about a restaurant into a single PostgreSQL SELECT statement.\n\
         Reply with the SQL only: no explanation, no Markdown.\n\
         Never modify data.",
    );
    if !tables.is_empty() {
        system.push_str("\nUse only these tables:\n");
        system.push_str(&schema_lines(tables));
    }
    vec![Message::system(system), Message::user(question)]
}

/// Pull the statement out of a model reply.
///
/// Strips a Markdown code fence and a leading `sql` language tag.
pub fn extract_sql(reply: &str) -> String {
    let mut text = reply.trim();

    if let Some(open) = text.find("```") {
        let body = &text[open + 3..];
        text = match body.find("```") {
            Some(close) => &body[..close],
            None => body,
        };
    }

    let text = text.trim_start();
    let text = match text.get(..3) {
        Some(tag)
            if tag.eq_ignore_ascii_case("sql")
                && text[3..]
                    .chars()
                    .next()
                    .is_none_or(|c| c.is_whitespace() || c == ':') =>
        {
            text[3..].trim_start_matches(':')
        }
        _ => text,
    };

    text.trim().to_string()
}

/// Messages asking the model to describe a query result in plain language.
pub fn narration_prompt(question: &str, sql: &str, result: &QueryResult) -> Vec<Message> {
    let mut serialized = serde_json::to_string(result).unwrap_or_default();
    if serialized.len() > MAX_RESULT_CHARS {
        let mut cut = MAX_RESULT_CHARS;
        while !serialized.is_char_boundary(cut) {
            cut -= 1;
        }
        serialized.truncate(cut);
        serialized.push_str(" ...(truncated)");
    }

    vec![
        Message::system(
            "You are an AI assistant for a restaurant. Answer the question using only the \
             query result provided. Be brief. If the result is empty, say so.",
        ),
        Message::user(format!(
            "Question: {question}\n\nSQL:\n{sql}\n\nResult:\n{serialized}"
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use maitred_core::message::Role;

    #[test]
    fn plain_reply_is_trimmed() {
        assert_eq!(extract_sql("  SELECT 1;\n"), "SELECT 1;");
    }

    #[test]
    fn fenced_reply_with_tag() {
        let reply = "Here you go:\n```sql\nSELECT name FROM menu_items;\n```\nEnjoy!";
        assert_eq!(extract_sql(reply), "SELECT name FROM menu_items;");
    }

    #[test]
    fn fenced_reply_without_tag() {
        assert_eq!(extract_sql("```\nSELECT 2\n```"), "SELECT 2");
    }

    #[test]
    fn unclosed_fence() {
        assert_eq!(extract_sql("```SQL\nSELECT 3"), "SELECT 3");
    }

    #[test]
    fn leading_sql_label() {
        assert_eq!(extract_sql("SQL: SELECT 4"), "SELECT 4");
        assert_eq!(extract_sql("sql\nSELECT 5"), "SELECT 5");
    }

    #[test]
    fn sql_prefix_inside_word_is_kept() {
        assert_eq!(extract_sql("sqlite_master"), "sqlite_master");
    }

    #[test]
    fn prompt_lists_tables_with_columns() {
        let tables = vec!["menu_items".to_string(), "reservations".to_string()];
        let messages = sql_prompt("What is the cheapest dish?", &tables);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("- menu_items (name, price"));
        assert!(messages[0].content.ends_with("- reservations"));
        assert_eq!(messages[1].content, "What is the cheapest dish?");
    }

    #[test]
    fn narration_includes_result() {
        let result = QueryResult::no_rows(0);
        let messages = narration_prompt("Any orders?", "SELECT * FROM orders", &result);
        assert!(messages[1].content.contains("SELECT * FROM orders"));
        assert!(messages[1].content.contains("no rows returned"));
    }

    #[test]
    fn narration_truncates_large_results() {
        let rows = (0..2_000)
            .map(|i| {
                let mut row = serde_json::Map::new();
                row.insert("name".into(), serde_json::json!(format!("dish number {i}")));
                row
            })
            .collect();
        let messages = narration_prompt("List dishes", "SELECT name FROM menu_items", &QueryResult::Rows(rows));
        assert!(messages[1].content.ends_with("...(truncated)"));
        assert!(messages[1].content.len() < MAX_RESULT_CHARS + 200);
    }
}
