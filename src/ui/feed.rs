use chrono::Local;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::styles::Theme;
use crate::logs::types::short_session_id;
use crate::logs::{MessageRecord, Role};

const USER_MESSAGE_MARKER: &str = "[User Message]";
const MIRROR_MODEL: &str = "delivery-mirror";

/// Columns reserved for the timestamp, agent, session and badge prefix.
const PREFIX_RESERVE: usize = 50;
const MIN_TEXT_WIDTH: usize = 40;

pub struct FeedOptions {
    pub show_session: bool,
    /// Terminal width in columns.
    pub width: usize,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            show_session: true,
            width: 120,
        }
    }
}

/// Render one record as a single terminal line.
pub fn format_record(record: &MessageRecord, theme: &Theme, options: &FeedOptions) -> String {
    let mut line = String::new();

    let time_str = record.timestamp.with_timezone(&Local).format("%H:%M:%S");
    line.push_str(&format!("{} ", theme.timestamp.apply(time_str)));
    line.push_str(&format!("{} ", theme.agent.apply(format!("[{}]", record.agent_id))));

    if options.show_session {
        let short = short_session_id(&record.session_id);
        line.push_str(&format!("{} ", theme.session.apply(format!("({short})"))));
    }

    match &record.role {
        Role::User => line.push_str(&format!("{} ", theme.user_label.apply("USER"))),
        Role::Assistant { model, .. } => {
            let model = model.as_deref().unwrap_or("unknown");
            if model == MIRROR_MODEL {
                line.push_str(&format!("{} ", theme.mirror_label.apply("AI(mirror)")));
            } else {
                line.push_str(&format!("{} ", theme.assistant_label.apply(format!("AI({model})"))));
            }
        }
    }

    if let Some(cost) = record.role.cost()
        && cost > 0.0
    {
        line.push_str(&format!("{} ", theme.cost.apply(format!("${cost:.4}"))));
    }

    let max_width = options.width.saturating_sub(PREFIX_RESERVE).max(MIN_TEXT_WIDTH);
    let text = truncate_to_width(&one_line(&display_text(record)), max_width);
    line.push_str(&format!("{}", theme.text.apply(text)));

    line
}

/// User turns arrive wrapped as `[Tue 2026-...] ... [User Message] actual text`;
/// keep only the part after the marker.
pub fn display_text(record: &MessageRecord) -> &str {
    let text = record.text.as_str();
    if record.role.is_user()
        && text.starts_with('[')
        && let Some(idx) = text.find(USER_MESSAGE_MARKER)
    {
        return text[idx + USER_MESSAGE_MARKER.len()..].trim();
    }
    text
}

pub fn one_line(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', " ↵ ")
}

/// Cut `text` to at most `max` display columns, ending with `…` when cut.
pub fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }

    let budget = max.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}
