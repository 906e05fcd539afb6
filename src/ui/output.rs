use crate::ui::{theme, Icons};
use crate::value::Value;
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::DATABASE, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn empty(label: &str) {
    println!("{} {}", Icons::EMPTY, label.style(theme().dim.clone()));
}

/// Render a value in its type's colour
pub fn styled_value(value: &Value) -> String {
    value
        .to_string()
        .style(theme().for_type(value.value_type()))
        .to_string()
}

pub fn key_value(key: &str, value: &Value) {
    println!(
        "{} {} = {} {}",
        Icons::KEY,
        key.style(theme().key.clone()),
        styled_value(value),
        format!("({})", value.value_type()).style(theme().dim.clone())
    );
}

pub fn removed(key: &str) {
    println!("{} {}", Icons::DEL.style(theme().dim.clone()), key);
}
