use crossterm::style::{Attribute, Attributes, Color, ContentStyle};

fn fg(color: Color) -> ContentStyle {
    ContentStyle {
        foreground_color: Some(color),
        ..ContentStyle::default()
    }
}

fn bold(color: Color) -> ContentStyle {
    ContentStyle {
        foreground_color: Some(color),
        attributes: Attributes::from(Attribute::Bold),
        ..ContentStyle::default()
    }
}

fn dim() -> ContentStyle {
    ContentStyle {
        attributes: Attributes::from(Attribute::Dim),
        ..ContentStyle::default()
    }
}

pub struct Theme {
    pub timestamp: ContentStyle,
    pub agent: ContentStyle,
    pub session: ContentStyle,
    pub user_label: ContentStyle,
    pub assistant_label: ContentStyle,
    pub mirror_label: ContentStyle,
    pub cost: ContentStyle,
    pub text: ContentStyle,
    pub notice: ContentStyle,
    pub header: ContentStyle,
    pub error: ContentStyle,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            timestamp: dim(),
            agent: fg(Color::Cyan),
            session: dim(),
            user_label: bold(Color::Green),
            assistant_label: bold(Color::Magenta),
            mirror_label: bold(Color::Blue),
            cost: fg(Color::Yellow),
            text: ContentStyle::default(),
            notice: dim(),
            header: ContentStyle {
                attributes: Attributes::from(Attribute::Bold),
                ..ContentStyle::default()
            },
            error: fg(Color::Red),
        }
    }
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    /// No escape codes at all, for pipes and `NO_COLOR`.
    pub fn plain() -> Self {
        let none = ContentStyle::default();
        Self {
            timestamp: none,
            agent: none,
            session: none,
            user_label: none,
            assistant_label: none,
            mirror_label: none,
            cost: none,
            text: none,
            notice: none,
            header: none,
            error: none,
        }
    }
}
