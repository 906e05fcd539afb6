use crate::value::ValueType;
use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub info: Style,
    pub dim: Style,
    pub key: Style,
    pub string: Style,
    pub bool: Style,
    pub number: Style,
}

impl Theme {
    pub fn detect() -> Self {
        if !console::Term::stdout().is_term() {
            return Self::plain();
        }
        Self::colored()
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            info: Style::new().magenta(),
            dim: Style::new().white().dimmed(),
            key: Style::new().bold(),
            string: Style::new().green(),
            bool: Style::new().yellow(),
            number: Style::new().cyan(),
        }
    }

    pub fn plain() -> Self {
        Self {
            header: Style::new(),
            success: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            key: Style::new(),
            string: Style::new(),
            bool: Style::new(),
            number: Style::new(),
        }
    }

    /// Style used to render values of `ty`
    pub fn for_type(&self, ty: ValueType) -> Style {
        match ty {
            ValueType::String => self.string.clone(),
            ValueType::Bool => self.bool.clone(),
            ValueType::Float | ValueType::Int => self.number.clone(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
