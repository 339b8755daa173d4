//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::api::{Comment, Department};
use crate::settings::Settings;

fn skip_button() -> InlineKeyboardButton {
    InlineKeyboardButton::callback("⏭️ Skip", "skip")
}

fn cancel_button() -> InlineKeyboardButton {
    InlineKeyboardButton::callback("❌ Cancel", "cancel")
}

/// Skip/Cancel pair shown on every free-text step
pub fn skip_cancel_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![skip_button(), cancel_button()]])
}

/// Preview-step keyboard: begin configuration or cancel
pub fn begin_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("Yes", "skip"),
        cancel_button(),
    ]])
}

/// Department toggles, one per row, with the current selection marked
pub fn department_keyboard(
    departments: &[Department],
    selected: &[String],
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = departments
        .iter()
        .map(|d| {
            let label = if selected.contains(&d.id) {
                format!("✅ {}", d.name)
            } else {
                d.name.clone()
            };
            vec![InlineKeyboardButton::callback(label, format!("dept:{}", d.id))]
        })
        .collect();
    rows.push(vec![
        InlineKeyboardButton::callback("Done", "dept_done"),
        cancel_button(),
    ]);
    InlineKeyboardMarkup::new(rows)
}

/// Yes/No prompt for enabling periodic notifications
pub fn subscription_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("Yes", "sub:yes"),
        InlineKeyboardButton::callback("No", "sub:no"),
    ]])
}

/// Prev/Next navigation row; `None` when neither direction applies
pub fn pagination_keyboard(page: u32, total: u32) -> Option<InlineKeyboardMarkup> {
    let mut row = Vec::new();
    if page > 1 {
        row.push(InlineKeyboardButton::callback(
            "⬅️ Back",
            format!("page:{}", page - 1),
        ));
    }
    if page < total {
        row.push(InlineKeyboardButton::callback(
            "Forward ➡️",
            format!("page:{}", page + 1),
        ));
    }
    if row.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::new(vec![row]))
    }
}

/// URL buttons for a comment's review and author-profile links.
///
/// Whichever links are present get a button; no keyboard when neither is.
pub fn comment_buttons(comment: &Comment) -> Option<InlineKeyboardMarkup> {
    let mut row = Vec::new();
    if let Some(url) = comment
        .restaurant
        .review_url
        .as_deref()
        .and_then(|u| Url::parse(u).ok())
    {
        row.push(InlineKeyboardButton::url("Review", url));
    }
    if let Some(url) = comment
        .profile_url
        .as_deref()
        .and_then(|u| Url::parse(u).ok())
    {
        row.push(InlineKeyboardButton::url("Author profile", url));
    }
    if row.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::new(vec![row]))
    }
}

/// Render one comment as a message body
pub fn format_comment(comment: &Comment) -> String {
    let date = comment
        .created_at
        .split('T')
        .next()
        .unwrap_or(&comment.created_at);
    format!(
        "{}\n{}\nRestaurant: {}\nAuthor: {}\nDate: {}\n\n{}",
        comment.restaurant.type_comments_loader,
        "★".repeat(comment.stars as usize),
        comment.restaurant.name,
        comment.name,
        date,
        comment.text
    )
}

/// Human-readable summary of the session's current filters.
///
/// `restaurant` is the resolved display name for the restaurant filter,
/// when one is set and the reference data could be fetched.
pub fn format_filter_summary(settings: &Settings, restaurant: Option<&str>) -> String {
    let dates = match (
        settings.created_at_after.as_deref(),
        settings.created_at_before.as_deref(),
    ) {
        (None, None) => "all".to_string(),
        (after, before) => format!(
            "{}:{}",
            after.map(|d| format!("from {d}")).unwrap_or_default(),
            before.map(|d| format!("to {d}")).unwrap_or_default()
        ),
    };
    format!(
        "Current filters:\nDepartments: {}\nDates: {}\nStars: {}\nRestaurant: {}\nPage size: {}",
        settings.department_ids.join(", "),
        dates,
        settings.stars_display(),
        restaurant
            .or(settings.restaurant_id.as_deref())
            .unwrap_or("all"),
        settings.page_size
    )
}
