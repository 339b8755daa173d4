//! # Filter Flow Module
//!
//! Pure logic for the step-by-step filter configuration flow: the explicit
//! step enumeration, free-text validation per step and the settings
//! mutations each accepted input performs. Rendering and message routing
//! live in `bot::flow_manager`; nothing here touches the transport.

use lazy_static::lazy_static;
use regex::Regex;

use crate::settings::Settings;

lazy_static! {
    static ref DATE_RANGE_RE: Regex =
        Regex::new(r"^(\d{4}-\d{2}-\d{2}):(\d{4}-\d{2}-\d{2})$").unwrap();
    static ref DATE_AFTER_RE: Regex = Regex::new(r"^(\d{4}-\d{2}-\d{2})$").unwrap();
    static ref DATE_BEFORE_RE: Regex = Regex::new(r"^:(\d{4}-\d{2}-\d{2})$").unwrap();
    static ref STARS_RE: Regex = Regex::new(r"^([1-5])(?:-([1-5]))?$").unwrap();
    static ref PAGE_SIZE_RE: Regex = Regex::new(r"^[1-9]\d*$").unwrap();
}

/// Ordered steps of the filter configuration flow
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowStep {
    Preview,
    Department,
    Dates,
    Stars,
    PageSize,
    Subscription,
    GetData,
}

impl FlowStep {
    /// The step a single "skip"/"continue" signal advances to
    pub fn next(self) -> FlowStep {
        match self {
            FlowStep::Preview => FlowStep::Department,
            FlowStep::Department => FlowStep::Dates,
            FlowStep::Dates => FlowStep::Stars,
            FlowStep::Stars => FlowStep::PageSize,
            FlowStep::PageSize => FlowStep::Subscription,
            FlowStep::Subscription | FlowStep::GetData => FlowStep::GetData,
        }
    }

    /// Steps that consume free-text input
    pub fn accepts_text(self) -> bool {
        matches!(self, FlowStep::Dates | FlowStep::Stars | FlowStep::PageSize)
    }
}

/// Result of feeding free text to the current step
#[derive(Debug, PartialEq)]
pub enum TextOutcome {
    /// Input accepted and stored; move to the given step
    Advance(FlowStep),
    /// Input rejected; re-prompt with the given reason, no state change
    Reject(&'static str),
}

/// Parsed date-range input; unset sides stay open
#[derive(Debug, PartialEq)]
pub struct DateRange {
    pub after: Option<String>,
    pub before: Option<String>,
}

/// Accepts `YYYY-MM-DD:YYYY-MM-DD`, `YYYY-MM-DD` (lower bound only) or
/// `:YYYY-MM-DD` (upper bound only).
pub fn parse_date_range(text: &str) -> Option<DateRange> {
    if let Some(caps) = DATE_RANGE_RE.captures(text) {
        return Some(DateRange {
            after: Some(caps[1].to_string()),
            before: Some(caps[2].to_string()),
        });
    }
    if let Some(caps) = DATE_AFTER_RE.captures(text) {
        return Some(DateRange {
            after: Some(caps[1].to_string()),
            before: None,
        });
    }
    if let Some(caps) = DATE_BEFORE_RE.captures(text) {
        return Some(DateRange {
            after: None,
            before: Some(caps[1].to_string()),
        });
    }
    None
}

/// Accepts `D` or `D-D` with D in 1..=5; a range must be strictly ascending
pub fn parse_stars(text: &str) -> Option<Vec<u8>> {
    let caps = STARS_RE.captures(text)?;
    let low: u8 = caps[1].parse().ok()?;
    match caps.get(2) {
        Some(high) => {
            let high: u8 = high.as_str().parse().ok()?;
            if low < high {
                Some(vec![low, high])
            } else {
                None
            }
        }
        None => Some(vec![low]),
    }
}

/// Accepts one or more digits with no leading zero, returned verbatim
pub fn parse_page_size(text: &str) -> Option<String> {
    if PAGE_SIZE_RE.is_match(text) {
        Some(text.to_string())
    } else {
        None
    }
}

/// Validate free text for the current step and apply it to the settings.
///
/// Only the text-consuming steps reach this function; accepted input marks
/// the settings as changed for the current flow pass.
pub fn apply_text_input(step: FlowStep, text: &str, settings: &mut Settings) -> TextOutcome {
    let text = text.trim();
    match step {
        FlowStep::Dates => match parse_date_range(text) {
            Some(range) => {
                if range.after.is_some() {
                    settings.created_at_after = range.after;
                }
                if range.before.is_some() {
                    settings.created_at_before = range.before;
                }
                settings.is_val_changes = true;
                TextOutcome::Advance(step.next())
            }
            None => TextOutcome::Reject("Invalid date format!"),
        },
        FlowStep::Stars => match parse_stars(text) {
            Some(stars) => {
                settings.stars = Some(stars);
                settings.is_val_changes = true;
                TextOutcome::Advance(step.next())
            }
            None => TextOutcome::Reject("Enter a rating from 1 to 5, or an ascending range like 2-4."),
        },
        FlowStep::PageSize => match parse_page_size(text) {
            Some(size) => {
                settings.page_size = size;
                settings.is_val_changes = true;
                TextOutcome::Advance(step.next())
            }
            None => TextOutcome::Reject("Enter the number of reviews per page."),
        },
        _ => TextOutcome::Reject("This step does not take text input."),
    }
}

/// Toggle a department in the selection list, preserving selection order.
///
/// Returns `true` when the department is selected after the toggle.
pub fn toggle_department(settings: &mut Settings, department_id: &str) -> bool {
    settings.is_val_changes = true;
    if let Some(pos) = settings
        .department_ids
        .iter()
        .position(|id| id == department_id)
    {
        settings.department_ids.remove(pos);
        false
    } else {
        settings.department_ids.push(department_id.to_string());
        true
    }
}
