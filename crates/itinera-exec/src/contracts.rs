use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Everything a model program needs to produce one day itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub prompt: String,
    pub system_instruction: String,
    pub functions: Vec<FunctionDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the call arguments.
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    FunctionCall { name: String, args: Value },
    Text(String),
    /// Diagnostics that are not part of the answer.
    Meta(String),
    Done,
    Failed(String),
}

impl ModelEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

/// One line of model output, as written by a model program or a replay file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    FunctionCall {
        name: String,
        #[serde(default)]
        args: Value,
    },
    Text {
        text: String,
    },
    Error {
        message: String,
    },
}

impl From<WireEvent> for ModelEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::FunctionCall { name, args } => Self::FunctionCall { name, args },
            WireEvent::Text { text } => Self::Text(text),
            WireEvent::Error { message } => Self::Failed(message),
        }
    }
}

/// Interprets one stdout line. Blank lines yield nothing; anything that is
/// not a known JSON event is passed through as `Meta`.
pub fn parse_line(line: &str) -> Option<ModelEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if !trimmed.starts_with('{') {
        return Some(ModelEvent::Meta(trimmed.to_string()));
    }
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(ModelEvent::Meta(trimmed.to_string()));
    };
    let event_type = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match serde_json::from_value::<WireEvent>(value) {
        Ok(event) => Some(event.into()),
        Err(_) => Some(ModelEvent::Meta(format!("model event: {event_type}"))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn function_call_lines_become_calls() {
        let line = r#"{"type":"function_call","name":"location","args":{"name":"Cafe A","lat":1.0}}"#;
        assert_eq!(
            parse_line(line),
            Some(ModelEvent::FunctionCall {
                name: "location".to_string(),
                args: json!({"name": "Cafe A", "lat": 1.0}),
            })
        );
    }

    #[test]
    fn text_and_error_lines() {
        assert_eq!(
            parse_line(r#"{"type":"text","text":"Here you go."}"#),
            Some(ModelEvent::Text("Here you go.".to_string()))
        );
        assert_eq!(
            parse_line(r#"{"type":"error","message":"quota exceeded"}"#),
            Some(ModelEvent::Failed("quota exceeded".to_string()))
        );
    }

    #[test]
    fn noise_is_meta_and_blank_is_skipped() {
        assert_eq!(parse_line("   "), None);
        assert_eq!(
            parse_line("loading weights"),
            Some(ModelEvent::Meta("loading weights".to_string()))
        );
        assert_eq!(
            parse_line("{not json"),
            Some(ModelEvent::Meta("{not json".to_string()))
        );
        assert_eq!(
            parse_line(r#"{"type":"usage","tokens":12}"#),
            Some(ModelEvent::Meta("model event: usage".to_string()))
        );
    }

    #[test]
    fn call_without_args_gets_null_args() {
        assert_eq!(
            parse_line(r#"{"type":"function_call","name":"line"}"#),
            Some(ModelEvent::FunctionCall {
                name: "line".to_string(),
                args: Value::Null,
            })
        );
    }
}
