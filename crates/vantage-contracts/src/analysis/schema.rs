use serde_json::{json, Value};

/// Structured-output schema sent with every analysis request.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "overview": {
                "type": "STRING",
                "description": "Short assessment of the property layout and its exposure points.",
            },
            "placements": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "location": {"type": "STRING"},
                        "reason": {"type": "STRING"},
                        "cameraType": {"type": "STRING"},
                        "coordinates": {
                            "type": "OBJECT",
                            "properties": {
                                "x": {"type": "NUMBER", "description": "Percent from the left edge, 0-100."},
                                "y": {"type": "NUMBER", "description": "Percent from the top edge, 0-100."},
                            },
                            "required": ["x", "y"],
                        },
                    },
                    "required": ["location", "reason", "cameraType", "coordinates"],
                },
            },
            "cameraSummary": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "cameraType": {"type": "STRING"},
                        "quantity": {"type": "INTEGER"},
                    },
                    "required": ["cameraType", "quantity"],
                },
            },
        },
        "required": ["overview", "placements"],
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::response_schema;

    #[test]
    fn schema_requires_overview_and_placements_only() {
        let schema = response_schema();
        assert_eq!(schema["required"], json!(["overview", "placements"]));
        assert!(schema["properties"].get("cameraSummary").is_some());
    }

    #[test]
    fn placement_items_require_every_field() {
        let schema = response_schema();
        let item = &schema["properties"]["placements"]["items"];
        assert_eq!(
            item["required"],
            json!(["location", "reason", "cameraType", "coordinates"])
        );
        assert_eq!(
            item["properties"]["coordinates"]["required"],
            json!(["x", "y"])
        );
        assert_eq!(
            item["properties"]["coordinates"]["properties"]["x"]["type"],
            Value::String("NUMBER".to_string())
        );
    }
}
