pub struct ParseParamError {}

/// Parsed console parameter value.
#[derive(Debug, Clone)]
pub enum Value {
    U8(u8),
    Text(String),
}

impl Value {
    pub fn as_u8(&self) -> Option<u8> {
        return match self {
            Value::U8(value) => Some(*value),
            _ => None,
        };
    }

    pub fn as_text(&self) -> Option<String> {
        return match self {
            Value::Text(value) => Some(value.clone()),
            _ => None,
        };
    }
}

pub struct Spec {
    pub name: String,
    pub required: bool,
    pub parse: fn(&String) -> Result<Value, ParseParamError>,
}

impl Spec {
    pub fn u8(name: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            required: required,
            parse: |src| {
                let trimmed = src.trim();
                let parse_u8 = || {
                    if trimmed.starts_with("0x") {
                        u8::from_str_radix(trimmed.trim_start_matches("0x"), 16)
                    } else {
                        u8::from_str_radix(trimmed, 10)
                    }
                };
                return match parse_u8() {
                    Ok(value) => Ok(Value::U8(value)),
                    Err(_) => Err(ParseParamError {}),
                };
            },
        }
    }

    pub fn str(name: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            required: required,
            parse: |src| Ok(Value::Text(src.trim().to_string())),
        }
    }
}
