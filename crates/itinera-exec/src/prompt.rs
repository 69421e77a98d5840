use serde_json::json;

use crate::contracts::FunctionDeclaration;
use crate::contracts::ModelRequest;

pub const DAY_ITINERARY_SUFFIX: &str =
    " day trip with a timed sequence of stops and how to travel between them";

pub const SYSTEM_INSTRUCTION: &str = "\
You are a travel planner who lays out a single day as a walkable route.
Report every place with the `location` function and every leg between two \
places with the `line` function. Do not describe places only in text.
Give each stop a 24-hour `time` (HH:MM), a `duration` and a `sequence` \
starting at 1 in visiting order.
Name each leg \"<from> to <to>\" using the exact stop names, and fill in \
`transport` and `travelTime` when known.
Keep descriptions to one or two sentences.";

fn point_schema(description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "description": description,
        "properties": {
            "lat": {"type": "number"},
            "lng": {"type": "number"}
        },
        "required": ["lat", "lng"]
    })
}

pub fn location_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: "location".to_string(),
        description: "Place a stop of the day plan on the map.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Name of the place."},
                "description": {"type": "string", "description": "Why it is worth a visit."},
                "lat": {"type": "number"},
                "lng": {"type": "number"},
                "time": {"type": "string", "description": "Arrival time, HH:MM."},
                "duration": {"type": "string", "description": "How long to stay."},
                "sequence": {"type": "integer", "description": "Position in the day, from 1."}
            },
            "required": ["name", "description", "lat", "lng"]
        }),
    }
}

pub fn line_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: "line".to_string(),
        description: "Connect two stops of the day plan.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "\"<from> to <to>\"."},
                "start": point_schema("Where the leg starts."),
                "end": point_schema("Where the leg ends."),
                "transport": {"type": "string", "description": "walking, bus, metro..."},
                "travelTime": {"type": "string", "description": "e.g. 15 minutes."}
            },
            "required": ["name", "start", "end"]
        }),
    }
}

/// Turns the user's free text into a full model request.
pub fn build_request(prompt: &str, model: Option<&str>) -> ModelRequest {
    let mut text = prompt.trim().to_string();
    text.push_str(DAY_ITINERARY_SUFFIX);
    ModelRequest {
        prompt: text,
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        functions: vec![location_declaration(), line_declaration()],
        model: model.map(str::to_string),
    }
}
