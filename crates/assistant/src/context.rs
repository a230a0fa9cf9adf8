//! Context builder: renders fetched rows into the system prompt.
//!
//! Output is deterministic for identical rows. Sections always appear in the
//! same order (menu, recent orders, users), and an empty row-set renders as
//! `- (none)` rather than failing.

use std::fmt::Write;

use maitred_core::data::{ContextRows, MenuItem, OrderSummary, StaffMember};

const PREAMBLE: &str = "You are an AI assistant for a restaurant. Here is the current data:";

const CONVERSATIONAL_CLOSING: &str = "\
Use this data to answer questions, summarize orders, or help with tasks.
Remember all previous questions and answers within this chat session. \
If the user uses 'it', 'them', or 'those', assume they refer to the most recent \
relevant item or entity unless clarified.";

const ONE_SHOT_CLOSING: &str = "\
Use this information to answer questions accurately about the restaurant.
If the question cannot be answered from this data, reply: 'This information is not available.'";

/// Which closing instructions the prompt carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// Multi-turn chat: remember earlier turns and resolve pronouns.
    Conversational,
    /// Single question: admit when the data has no answer.
    OneShot,
}

pub struct ContextBuilder;

impl ContextBuilder {
    /// Render the full system prompt for a snapshot.
    pub fn render(rows: &ContextRows, style: PromptStyle) -> String {
        let mut out = String::with_capacity(256 + 96 * (rows.menu.len() + rows.orders.len()));
        out.push_str(PREAMBLE);
        out.push_str("\n\n");

        section(&mut out, "MENU ITEMS:", &rows.menu, menu_line);
        section(&mut out, "RECENT ORDERS:", &rows.orders, order_line);
        section(&mut out, "USERS:", &rows.users, user_line);

        out.push_str(match style {
            PromptStyle::Conversational => CONVERSATIONAL_CLOSING,
            PromptStyle::OneShot => ONE_SHOT_CLOSING,
        });
        out.push('\n');
        out
    }
}

fn section<T>(out: &mut String, heading: &str, rows: &[T], line: fn(&T) -> String) {
    out.push_str(heading);
    out.push('\n');
    if rows.is_empty() {
        out.push_str("- (none)\n");
    }
    for row in rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out.push('\n');
}

fn money(amount: Option<f64>) -> String {
    match amount {
        Some(v) => format!("${v:.2}"),
        None => "N/A".to_string(),
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// First letter upper, the rest lower.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn menu_line(item: &MenuItem) -> String {
    let mut line = format!(
        "- {} ({}) - {}",
        item.name,
        money(item.price),
        non_blank(item.category.as_ref()).unwrap_or("Uncategorized")
    );
    if let Some(description) = non_blank(item.description.as_ref()) {
        let _ = write!(line, " | {description}");
    }
    line
}

fn order_line(order: &OrderSummary) -> String {
    let status = non_blank(order.status.as_ref())
        .map(capitalize)
        .unwrap_or_else(|| "Unknown".to_string());
    format!(
        "- Order {}: {}, Customer: {}, Table: {}, Total: {}",
        order.id,
        status,
        non_blank(order.customer_name.as_ref()).unwrap_or("N/A"),
        non_blank(order.table_number.as_ref()).unwrap_or("N/A"),
        money(order.total)
    )
}

fn user_line(user: &StaffMember) -> String {
    format!(
        "- {} ({})",
        non_blank(user.name.as_ref()).unwrap_or(&user.id),
        non_blank(user.role.as_ref()).unwrap_or("N/A")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> ContextRows {
        ContextRows {
            menu: vec![MenuItem {
                name: "Margherita".into(),
                price: Some(12.5),
                category: Some("Pizza".into()),
                description: Some("Tomato, mozzarella, basil".into()),
            }],
            orders: vec![OrderSummary {
                id: "17".into(),
                customer_name: Some("Ana".into()),
                table_number: Some("4".into()),
                total: Some(31.0),
                status: Some("PENDING".into()),
            }],
            users: vec![StaffMember {
                id: "3".into(),
                name: Some("Sam".into()),
                role: Some("manager".into()),
            }],
        }
    }

    #[test]
    fn renders_sections_in_order() {
        let text = ContextBuilder::render(&rows(), PromptStyle::Conversational);
        assert!(text.starts_with(PREAMBLE));
        assert!(text.contains("MENU ITEMS:\n- Margherita ($12.50) - Pizza | Tomato, mozzarella, basil\n"));
        assert!(text.contains("RECENT ORDERS:\n- Order 17: Pending, Customer: Ana, Table: 4, Total: $31.00\n"));
        assert!(text.contains("USERS:\n- Sam (manager)\n"));

        let menu = text.find("MENU ITEMS:").unwrap();
        let orders = text.find("RECENT ORDERS:").unwrap();
        let users = text.find("USERS:").unwrap();
        assert!(menu < orders && orders < users);
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = ContextBuilder::render(&rows(), PromptStyle::OneShot);
        let b = ContextBuilder::render(&rows(), PromptStyle::OneShot);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_rows_render_empty_sections() {
        let text = ContextBuilder::render(&ContextRows::default(), PromptStyle::Conversational);
        assert_eq!(text.matches("- (none)").count(), 3);
        assert!(text.contains("MENU ITEMS:\n- (none)\n"));
        assert!(text.contains("RECENT ORDERS:\n- (none)\n"));
        assert!(text.contains("USERS:\n- (none)\n"));
    }

    #[test]
    fn missing_fields_use_fallbacks() {
        let rows = ContextRows {
            menu: vec![MenuItem {
                name: "Soup".into(),
                price: None,
                category: None,
                description: Some("   ".into()),
            }],
            orders: vec![OrderSummary {
                id: "5".into(),
                customer_name: None,
                table_number: None,
                total: None,
                status: None,
            }],
            users: vec![StaffMember {
                id: "42".into(),
                name: None,
                role: None,
            }],
        };
        let text = ContextBuilder::render(&rows, PromptStyle::OneShot);
        assert!(text.contains("- Soup (N/A) - Uncategorized\n"));
        assert!(text.contains("- Order 5: Unknown, Customer: N/A, Table: N/A, Total: N/A\n"));
        assert!(text.contains("- 42 (N/A)\n"));
    }

    #[test]
    fn closing_depends_on_style() {
        let chat = ContextBuilder::render(&rows(), PromptStyle::Conversational);
        assert!(chat.contains("'it', 'them', or 'those'"));
        assert!(!chat.contains("This information is not available."));

        let ask = ContextBuilder::render(&rows(), PromptStyle::OneShot);
        assert!(ask.contains("This information is not available."));
        assert!(!ask.contains("'it', 'them'"));
    }

    #[test]
    fn capitalize_status() {
        assert_eq!(capitalize("served"), "Served");
        assert_eq!(capitalize("IN PROGRESS"), "In progress");
        assert_eq!(capitalize(""), "");
    }
}
