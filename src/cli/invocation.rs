//! Splits command line tokens into the loosely typed form understood by the daemon.
//!
//! `create --name tea -d 3 --unit m` becomes
//! `{"command": "create", "options": {"name": ["tea"], "d": ["3"], "unit": ["m"]}, "arguments": []}`.
//! Values following an option belong to it until the next option, positional arguments go before
//! the first option or after `--`. A value with spaces has to arrive as one quoted token, since
//! single valued options like `--name` reject a list of words.

use anyhow::{bail, Result};
use serde_json::{json, Map, Value};

pub fn to_raw_command(tokens: &[String]) -> Result<Value> {
    let Some((command, rest)) = tokens.split_first() else {
        bail!("Missing command name");
    };

    let mut options: Vec<(String, Vec<String>)> = Vec::new();
    let mut arguments = Vec::new();
    // Option receiving the following values
    let mut current = None;
    let mut rest = rest.iter();

    while let Some(token) = rest.next() {
        if token == "--" {
            arguments.extend(rest.by_ref().cloned());
            break;
        }

        match option_name(token) {
            Some((key, inline)) => {
                if key.is_empty() {
                    bail!("Invalid option \"{token}\"");
                }
                let index = match options.iter().position(|(k, _)| k == key) {
                    Some(index) => index,
                    None => {
                        options.push((key.to_string(), Vec::new()));
                        options.len() - 1
                    }
                };
                options[index].1.extend(inline.map(str::to_string));
                current = Some(index);
            }
            None => match current {
                Some(index) => options[index].1.push(token.clone()),
                None => arguments.push(token.clone()),
            },
        }
    }

    let options = options
        .into_iter()
        .map(|(key, values)| {
            let value = if values.is_empty() {
                Value::Bool(true)
            } else {
                json!(values)
            };
            (key, value)
        })
        .collect::<Map<_, _>>();

    Ok(json!({
        "command": command,
        "options": options,
        "arguments": arguments,
    }))
}

/// `--key`, `--key=value` and `-k`. Negative numbers are values.
fn option_name(token: &str) -> Option<(&str, Option<&str>)> {
    let name = token
        .strip_prefix("--")
        .or_else(|| token.strip_prefix('-'))?;
    if name.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    Some(match name.split_once('=') {
        Some((key, value)) => (key, Some(value)),
        None => (name, None),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::command::{error::ErrorCode, normalize::normalize, schema::DEFAULT_TABLE};

    use super::to_raw_command;

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn options_collect_values() {
        assert_eq!(
            to_raw_command(&tokens("ct --name deep -d 25 --unit=m")).unwrap(),
            json!({
                "command": "ct",
                "options": { "name": ["deep"], "d": ["25"], "unit": ["m"] },
                "arguments": [],
            })
        );
    }

    #[test]
    fn quoted_values_stay_whole() {
        let tokens = ["ct", "-n", "deep work", "-d", "25"].map(String::from);
        let raw = to_raw_command(&tokens).unwrap();
        assert_eq!(raw["options"]["n"], json!(["deep work"]));

        let normalized = normalize(&raw, &DEFAULT_TABLE).unwrap();
        assert_eq!(normalized.argument.unwrap()["name"], json!("deep work"));
    }

    #[test]
    fn unquoted_words_are_rejected_by_the_daemon() {
        let raw = to_raw_command(&tokens("ct -n deep work -d 25")).unwrap();
        let error = normalize(&raw, &DEFAULT_TABLE).unwrap_err();
        assert_eq!(error.code, ErrorCode::InvalidOptionType);
    }

    #[test]
    fn flags_without_values_are_true() {
        assert_eq!(
            to_raw_command(&tokens("stats --verbose")).unwrap()["options"],
            json!({ "verbose": true })
        );
    }

    #[test]
    fn positional_arguments() {
        assert_eq!(
            to_raw_command(&tokens("st tea")).unwrap(),
            json!({ "command": "st", "options": {}, "arguments": ["tea"] })
        );
        assert_eq!(
            to_raw_command(&tokens("rm -x 1 -- -weird-name")).unwrap(),
            json!({ "command": "rm", "options": { "x": ["1"] }, "arguments": ["-weird-name"] })
        );
    }

    #[test]
    fn negative_numbers_are_values() {
        assert_eq!(
            to_raw_command(&tokens("ct -d -5")).unwrap()["options"],
            json!({ "d": ["-5"] })
        );
    }

    #[test]
    fn repeated_options_accumulate() {
        assert_eq!(
            to_raw_command(&tokens("ct -n a -d 1 -n b")).unwrap()["options"],
            json!({ "n": ["a", "b"], "d": ["1"] })
        );
    }

    #[test]
    fn rejects_empty_input() {
        assert!(to_raw_command(&[]).is_err());
        assert!(to_raw_command(&tokens("ct --=3")).is_err());
    }
}
