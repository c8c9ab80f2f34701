//! Output formatting for the one-shot catalog commands
//!
//! Every command prints either a comfy-table (human) or pretty JSON.

use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use practix_core::CoreError;
use practix_types::{Category, CategoryMastery, Page};
use std::collections::HashMap;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
pub enum CliError {
    /// Neither a corpus, a generated catalog nor a server was given
    NoCatalog,
    NoResults {
        query: String,
    },
    Core(CoreError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NoCatalog => write!(
                f,
                "No catalog to read: pass --corpus <DIR>, --demo <N> or --server <URL>"
            ),
            CliError::NoResults { query } => write!(f, "No items match '{}'", query),
            CliError::Core(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<CoreError> for CliError {
    fn from(e: CoreError) -> Self {
        CliError::Core(e)
    }
}

// ============================================================================
// Formatters
// ============================================================================

fn header(table: &mut Table, columns: &[&str], no_color: bool) {
    if no_color {
        table.set_header(columns.to_vec());
    } else {
        table.set_header(
            columns
                .iter()
                .map(|c| Cell::new(c).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
}

/// Category overview, with a mastery column when `mastery` is given
pub fn format_overview(
    categories: &[Category],
    mastery: Option<&[CategoryMastery]>,
    json: bool,
    no_color: bool,
) -> String {
    if json {
        let value = match mastery {
            Some(mastery) => serde_json::json!({ "categories": categories, "mastery": mastery }),
            None => serde_json::json!({ "categories": categories }),
        };
        return serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
    }

    if categories.is_empty() {
        return "No categories.".to_string();
    }

    let by_category: HashMap<_, _> = mastery
        .unwrap_or_default()
        .iter()
        .map(|m| (&m.category_id, m))
        .collect();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let mut columns = vec!["Category", "Items", "Easy", "Medium", "Hard", "Top item"];
    if mastery.is_some() {
        columns.push("Mastered");
    }
    header(&mut table, &columns, no_color);

    for category in categories {
        let histogram = &category.difficulty_histogram;
        let top = category
            .sample_items
            .first()
            .map(|item| truncate(&item.title, 40))
            .unwrap_or_else(|| "-".to_string());

        let mut row = vec![
            category.display_name.clone(),
            category.total_item_count.to_string(),
            histogram.easy.to_string(),
            histogram.medium.to_string(),
            histogram.hard.to_string(),
            top,
        ];
        if mastery.is_some() {
            row.push(
                by_category
                    .get(&category.id)
                    .map(|m| {
                        format!(
                            "{}/{} ({:.0}%)",
                            m.mastered_items, m.total_items, m.mastery_percent
                        )
                    })
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        table.add_row(Row::from(row));
    }

    table.to_string()
}

/// One listing or search page
pub fn format_page(page: &Page, json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(page).unwrap_or_else(|_| "{}".to_string());
    }

    if page.items.is_empty() {
        return format!(
            "Page {} is empty ({} matching items).",
            page.page_number, page.total_matching
        );
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    header(
        &mut table,
        &["ID", "Title", "Category", "Difficulty", "Quality", "Tags"],
        no_color,
    );

    for item in &page.items {
        let difficulty = if no_color {
            Cell::new(item.difficulty)
        } else {
            Cell::new(item.difficulty).fg(difficulty_color(item.difficulty))
        };
        let tags = item.tag_set.iter().cloned().collect::<Vec<_>>().join(", ");

        table.add_row(Row::from(vec![
            Cell::new(item.id.as_str()),
            Cell::new(truncate(&item.title, 50)),
            Cell::new(item.category_id.as_str()),
            difficulty,
            Cell::new(format!("{:.2}", item.quality_score)),
            Cell::new(truncate(&tags, 30)),
        ]));
    }

    format!("{}\n{}", table, page_footer(page))
}

fn page_footer(page: &Page) -> String {
    let more = if page.has_next {
        format!(" (next: --page {})", page.page_number + 1)
    } else {
        String::new()
    };
    format!(
        "Page {}: {} of {} matching items{}",
        page.page_number,
        page.items.len(),
        page.total_matching,
        more
    )
}

fn difficulty_color(difficulty: practix_types::Difficulty) -> Color {
    match difficulty {
        practix_types::Difficulty::Easy => Color::Green,
        practix_types::Difficulty::Medium => Color::Yellow,
        practix_types::Difficulty::Hard => Color::Red,
    }
}

// ============================================================================
// Utilities
// ============================================================================

pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1}MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1_024 {
        format!("{:.1}KB", bytes as f64 / 1_024.0)
    } else {
        format!("{}B", bytes)
    }
}

fn truncate(s: &str, max: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max {
        s.to_string()
    } else {
        // Char-based so multi-byte titles never split
        s.chars().take(max - 1).collect::<String>() + "…"
    }
}

// ============================================================================
// Tests
// ============================================================================
