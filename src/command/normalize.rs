use serde_json::{Map, Value};
use tracing::debug;

use super::{
    error::{ErrorCode, NormalizeError},
    schema::{ArgumentSpec, CommandSchema, CommandTable, OptionSpec, ValueKind},
    CommandName, NormalizedCommand,
};

/// Borrowed view of a raw invocation after its outer shape was validated.
struct RawCommand<'a> {
    command: &'a str,
    options: &'a Map<String, Value>,
    arguments: Option<Vec<&'a str>>,
}

impl<'a> RawCommand<'a> {
    fn parse(raw: &'a Value) -> Result<Self, NormalizeError> {
        let Some(object) = raw.as_object() else {
            return Err(NormalizeError::new(
                ErrorCode::InvalidCommandObject,
                "The command object must be a plain object.",
            ));
        };

        let (Some(command), Some(options)) = (object.get("command"), object.get("options")) else {
            return Err(NormalizeError::new(
                ErrorCode::MissingProperty,
                r#"The "command" or the "options" property is missing"#,
            ));
        };

        let command = match command.as_str() {
            Some(v) if !v.is_empty() => v,
            _ => {
                return Err(NormalizeError::new(
                    ErrorCode::InvalidCommand,
                    r#"The "command" property is missing or invalid."#,
                ))
            }
        };

        let options = match options.as_object() {
            Some(v) if v.values().all(|v| !v.is_object()) => v,
            _ => {
                return Err(NormalizeError::new(
                    ErrorCode::InvalidOptionsObject,
                    r#"The "options" property must be a flat key-value mapping."#,
                ))
            }
        };

        let arguments = match object.get("arguments") {
            None | Some(Value::Null) => None,
            Some(Value::Array(values)) => Some(
                values
                    .iter()
                    .map(Value::as_str)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(invalid_main_arguments)?,
            ),
            Some(_) => return Err(invalid_main_arguments()),
        };

        Ok(Self {
            command,
            options,
            arguments,
        })
    }
}

fn invalid_main_arguments() -> NormalizeError {
    NormalizeError::new(
        ErrorCode::InvalidMainArguments,
        "The main arguments of a command must be an array of strings.",
    )
}

/// Normalizes a command object parsed from command line arguments.
///
/// `prodtimer timer ct --name coding -d 20 -u m` is tokenized into
/// `{ "command": "ct", "options": { "name": ["coding"], "d": ["20"], "u": ["m"] }, "arguments": [] }`
/// and this function turns it into `{ "command": "CREATE", "argument": { "name": "coding",
/// "duration": 20, "unit": "m" } }` according to `table`.
pub fn normalize(raw: &Value, table: &CommandTable) -> Result<NormalizedCommand, NormalizeError> {
    let RawCommand {
        command: raw_name,
        options,
        arguments,
    } = RawCommand::parse(raw)?;

    let Some(command) = table.resolve(raw_name) else {
        return Err(NormalizeError::new(
            ErrorCode::UnknownCommand,
            format!("Unknown command \"{raw_name}\"."),
        ));
    };

    let schema = table.schema(command);

    if !schema.options.is_empty() && !options.is_empty() {
        return normalize_options(command, options, schema);
    }

    if let Some(spec) = schema.arguments {
        return normalize_arguments(command, arguments, spec);
    }

    Ok(NormalizedCommand::bare(command))
}

fn normalize_options(
    command: CommandName,
    options: &Map<String, Value>,
    schema: &CommandSchema,
) -> Result<NormalizedCommand, NormalizeError> {
    let mut supplied = Map::new();
    for (key, value) in options {
        supplied.insert(schema.resolve_option_alias(key).to_string(), value.clone());
    }

    let mut argument = Map::new();
    for spec in schema.options {
        if let Some(value) = normalize_option(spec, supplied.remove(spec.name))? {
            argument.insert(spec.name.to_string(), value);
        }
    }

    if !supplied.is_empty() {
        debug!(
            "Dropping undeclared options {:?} of {command}",
            supplied.keys().collect::<Vec<_>>()
        );
    }

    Ok(NormalizedCommand {
        command,
        argument: Some(Value::Object(argument)),
    })
}

fn normalize_option(
    spec: &OptionSpec,
    value: Option<Value>,
) -> Result<Option<Value>, NormalizeError> {
    let name = spec.name;
    let Some(value) = value else {
        if let Some(default) = spec.default {
            return Ok(Some(default.to_value()));
        }
        if spec.optional {
            return Ok(None);
        }
        return Err(NormalizeError::new(
            ErrorCode::MissingRequiredOption,
            format!("The property \"{name}\" is required."),
        ));
    };

    let value = if spec.kind == ValueKind::Array {
        if !value.is_array() {
            return Err(NormalizeError::new(
                ErrorCode::InvalidOptionType,
                format!("The value of \"{name}\" must be an array."),
            ));
        }
        value
    } else {
        // {"name": ["coding"]} is {"name": "coding"} for scalar options
        let value = match value {
            Value::Array(mut values) if values.len() == 1 => values.remove(0),
            other => other,
        };
        if !spec.kind.matches(&value) {
            return Err(NormalizeError::new(
                ErrorCode::InvalidOptionType,
                format!(
                    "The property \"{name}\" must be of type: \"{}\"",
                    spec.kind.name()
                ),
            ));
        }
        value
    };

    (spec.coerce)(value).map(Some).map_err(|reason| {
        NormalizeError::new(
            ErrorCode::InvalidOptionValue,
            format!("The property \"{name}\" is invalid: {reason}."),
        )
    })
}

fn normalize_arguments(
    command: CommandName,
    arguments: Option<Vec<&str>>,
    spec: ArgumentSpec,
) -> Result<NormalizedCommand, NormalizeError> {
    let required = spec.required();

    let Some(mut arguments) = arguments else {
        if required == 0 {
            return Ok(NormalizedCommand::bare(command));
        }
        return Err(missing_main_arguments(command, required));
    };

    if arguments.len() < required {
        return Err(missing_main_arguments(command, required));
    }

    arguments.truncate(spec.count);

    let argument = match arguments.as_slice() {
        [] => return Ok(NormalizedCommand::bare(command)),
        [single] => Value::from(*single),
        many => Value::from(many.to_vec()),
    };

    Ok(NormalizedCommand {
        command,
        argument: Some(argument),
    })
}

fn missing_main_arguments(command: CommandName, required: usize) -> NormalizeError {
    NormalizeError::new(
        ErrorCode::MissingRequiredMainArguments,
        format!("The command \"{command}\" is missing {required} required main argument(s)."),
    )
}
