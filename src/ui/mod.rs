pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{empty, header, info, key_value, removed, section, styled_value, success};
pub use table::{stats_table, TableBuilder};
pub use theme::{theme, Theme};
