//! Declarative description of every command the daemon understands. The table is interpreted by
//! [normalize](super::normalize::normalize), which is the only place that knows how to read it.

use serde_json::Value;

use super::CommandName;

/// Runtime type an option value has to have once single-element arrays are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    /// Accepts numbers and numeric text. The cli only ever produces text.
    Number,
    Boolean,
    Array,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Number => {
                value.is_number()
                    || value
                        .as_str()
                        .is_some_and(|s| s.trim().parse::<f64>().is_ok_and(f64::is_finite))
            }
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array => value.is_array(),
        }
    }
}

/// Fallback used when an option isn't supplied. `serde_json::Value` can't be built in a const
/// context, so defaults are stored in this form and converted on use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Text(&'static str),
    Integer(i64),
    Flag(bool),
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            DefaultValue::Text(v) => Value::from(v),
            DefaultValue::Integer(v) => Value::from(v),
            DefaultValue::Flag(v) => Value::from(v),
        }
    }
}

/// Pure conversion applied to a value after its type was checked. The error is a human readable
/// reason which is later attached to the option name.
pub type Coercion = fn(Value) -> Result<Value, String>;

#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: ValueKind,
    pub optional: bool,
    pub default: Option<DefaultValue>,
    pub coerce: Coercion,
}

/// Positional argument arity. `optional` of the `count` arguments may be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentSpec {
    pub count: usize,
    pub optional: usize,
}

impl ArgumentSpec {
    pub fn required(&self) -> usize {
        self.count.saturating_sub(self.optional)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSchema {
    pub options: &'static [OptionSpec],
    pub option_aliases: &'static [(&'static str, &'static str)],
    pub arguments: Option<ArgumentSpec>,
}

impl CommandSchema {
    pub const EMPTY: CommandSchema = CommandSchema {
        options: &[],
        option_aliases: &[],
        arguments: None,
    };

    pub fn resolve_option_alias<'a>(&self, key: &'a str) -> &'a str {
        self.option_aliases
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, name)| *name)
            .unwrap_or(key)
    }
}

/// Aliases plus schemas. Commands without an entry in `schemas` take neither options nor
/// arguments.
#[derive(Debug, Clone, Copy)]
pub struct CommandTable<'a> {
    pub aliases: &'a [(&'a str, CommandName)],
    pub schemas: &'a [(CommandName, CommandSchema)],
}

impl<'a> CommandTable<'a> {
    pub fn resolve(&self, raw_name: &str) -> Option<CommandName> {
        self.aliases
            .iter()
            .find(|(alias, _)| *alias == raw_name)
            .map(|(_, name)| *name)
            .or_else(|| CommandName::from_canonical(&raw_name.to_uppercase()))
    }

    pub fn schema(&self, name: CommandName) -> &CommandSchema {
        self.schemas
            .iter()
            .find(|(command, _)| *command == name)
            .map(|(_, schema)| schema)
            .unwrap_or(&CommandSchema::EMPTY)
    }
}

pub fn identity(value: Value) -> Result<Value, String> {
    Ok(value)
}

pub fn to_number(value: Value) -> Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value),
        Value::String(text) => {
            let text = text.trim();
            if let Ok(v) = text.parse::<i64>() {
                return Ok(Value::from(v));
            }
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("\"{text}\" is not a number"))
        }
        other => Err(format!("{other} is not a number")),
    }
}

pub fn non_empty_text(value: Value) -> Result<Value, String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Ok(Value::from(text.trim())),
        _ => Err("must not be empty".into()),
    }
}

pub const TIME_UNITS: [&str; 4] = ["ms", "s", "m", "h"];

pub fn to_time_unit(value: Value) -> Result<Value, String> {
    let unit = value.as_str().map(|v| v.trim().to_lowercase()).unwrap_or_default();
    if TIME_UNITS.contains(&unit.as_str()) {
        Ok(Value::from(unit))
    } else {
        Err(format!("must be one of {}", TIME_UNITS.join(", ")))
    }
}

const TIMER_SPEC_OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        name: "name",
        kind: ValueKind::String,
        optional: false,
        default: None,
        coerce: non_empty_text,
    },
    OptionSpec {
        name: "description",
        kind: ValueKind::String,
        optional: true,
        default: None,
        coerce: identity,
    },
    OptionSpec {
        name: "duration",
        kind: ValueKind::Number,
        optional: false,
        default: None,
        coerce: to_number,
    },
    OptionSpec {
        name: "unit",
        kind: ValueKind::String,
        optional: true,
        default: Some(DefaultValue::Text("m")),
        coerce: to_time_unit,
    },
];

const TIMER_SPEC_ALIASES: &[(&str, &str)] = &[
    ("n", "name"),
    ("desc", "description"),
    ("d", "duration"),
    ("u", "unit"),
];

const TIMER_SPEC_SCHEMA: CommandSchema = CommandSchema {
    options: TIMER_SPEC_OPTIONS,
    option_aliases: TIMER_SPEC_ALIASES,
    arguments: None,
};

const ONE_OPTIONAL_ARGUMENT: CommandSchema = CommandSchema {
    options: &[],
    option_aliases: &[],
    arguments: Some(ArgumentSpec {
        count: 1,
        optional: 1,
    }),
};

const ONE_REQUIRED_ARGUMENT: CommandSchema = CommandSchema {
    options: &[],
    option_aliases: &[],
    arguments: Some(ArgumentSpec {
        count: 1,
        optional: 0,
    }),
};

pub const DEFAULT_ALIASES: &[(&str, CommandName)] = &[
    ("ct", CommandName::Create),
    ("st", CommandName::Start),
    ("p", CommandName::Pause),
    ("r", CommandName::Reset),
    ("e", CommandName::End),
    ("i", CommandName::Info),
    ("s", CommandName::Save),
    ("uc", CommandName::UpdateConfig),
    ("ls", CommandName::ListSavedTimers),
    ("ds", CommandName::DeleteSavedTimer),
    ("rm", CommandName::DeleteSavedTimer),
    ("stat", CommandName::Stats),
    ("sb", CommandName::StopBeeping),
    ("stop-beeping", CommandName::StopBeeping),
];

pub const DEFAULT_SCHEMAS: &[(CommandName, CommandSchema)] = &[
    (CommandName::Create, TIMER_SPEC_SCHEMA),
    (CommandName::Save, TIMER_SPEC_SCHEMA),
    (CommandName::Start, ONE_OPTIONAL_ARGUMENT),
    (CommandName::DeleteSavedTimer, ONE_REQUIRED_ARGUMENT),
    (CommandName::Stats, ONE_OPTIONAL_ARGUMENT),
];

pub const DEFAULT_TABLE: CommandTable<'static> = CommandTable {
    aliases: DEFAULT_ALIASES,
    schemas: DEFAULT_SCHEMAS,
};
