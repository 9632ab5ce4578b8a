use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{CommandSpec, MARKER_COMMANDS, NO_ARG_COMMANDS, ZOOM_COMMAND};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub address: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            address: None,
            command_args: BTreeMap::new(),
        }
    }

    fn invalid(raw: &str, command: &str, reason: &str) -> Self {
        let mut intent = Self::new("invalid", raw);
        intent
            .command_args
            .insert("command".to_string(), Value::String(command.to_string()));
        intent
            .command_args
            .insert("reason".to_string(), Value::String(reason.to_string()));
        intent
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_zoom_delta(arg: &str) -> Option<i64> {
    let token = arg.trim().to_ascii_lowercase();
    match token.as_str() {
        "in" => Some(1),
        "out" => Some(-1),
        _ => token.strip_prefix('+').unwrap_or(token.as_str()).parse::<i64>().ok(),
    }
}

/// Parses a 1-based marker label into a 0-based placement index.
fn parse_marker_index(arg: &str) -> Option<usize> {
    let label = arg.trim().parse::<usize>().ok()?;
    label.checked_sub(1)
}

pub fn parse_command(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        let mut intent = Intent::new("submit", text);
        intent.address = Some(raw_trimmed.to_string());
        return intent;
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let args = split_args(&slash_tail[command_len..]);
    let first_arg = args.first().map(String::as_str).unwrap_or_default();

    if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
        return Intent::new(action, text);
    }

    if command == ZOOM_COMMAND.command {
        let Some(delta) = parse_zoom_delta(first_arg) else {
            return Intent::invalid(text, &command, "expected +N, -N, in or out");
        };
        let mut intent = Intent::new(ZOOM_COMMAND.action, text);
        intent
            .command_args
            .insert("delta".to_string(), Value::Number(delta.into()));
        return intent;
    }

    if let Some(action) = find_action(&command, MARKER_COMMANDS) {
        if action == "hover" && matches!(first_arg, "off" | "none") {
            let mut intent = Intent::new(action, text);
            intent.command_args.insert("index".to_string(), Value::Null);
            return intent;
        }
        let Some(index) = parse_marker_index(first_arg) else {
            return Intent::invalid(text, &command, "expected a marker number");
        };
        let mut intent = Intent::new(action, text);
        intent
            .command_args
            .insert("index".to_string(), Value::Number(index.into()));
        return intent;
    }

    let mut intent = Intent::new("unknown", text);
    intent
        .command_args
        .insert("command".to_string(), Value::String(command));
    intent
        .command_args
        .insert("arg".to_string(), Value::String(args.join(" ")));
    intent
}
