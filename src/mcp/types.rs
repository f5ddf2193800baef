//! Protocol-level value types shared by sessions, bridges and adapters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool advertised by one server. Names are unique per server only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
    pub output_schema: Option<Value>,
}

impl RemoteTool {
    pub fn new(name: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
            output_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_output_schema(mut self, output_schema: Value) -> Self {
        self.output_schema = Some(output_schema);
        self
    }

    pub fn description_or_empty(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

/// Body of an embedded resource content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    pub uri: String,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// One item of a tool result's content list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: EmbeddedResource,
    },
    ResourceLink {
        uri: String,
        #[serde(default)]
        name: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }

    /// Wire name of this item's type.
    pub fn kind(&self) -> &'static str {
        match self {
            ContentItem::Text { .. } => "text",
            ContentItem::Image { .. } => "image",
            ContentItem::Audio { .. } => "audio",
            ContentItem::Resource { .. } => "resource",
            ContentItem::ResourceLink { .. } => "resource_link",
            ContentItem::Unknown => "unknown",
        }
    }

    /// Text carried by this item, for plain text and text resources.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { text } => Some(text),
            ContentItem::Resource { resource } => resource.text.as_deref(),
            _ => None,
        }
    }
}

/// Successful result of a tool call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ContentItem>,
    pub structured_content: Option<Value>,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            structured_content: None,
        }
    }

    pub fn with_structured(mut self, structured: Value) -> Self {
        self.structured_content = Some(structured);
        self
    }

    /// Structured payload when present, else the joined text content.
    pub fn into_value_or_text(self) -> Value {
        if let Some(structured) = self.structured_content {
            return structured;
        }
        let lines: Vec<&str> = self.content.iter().filter_map(ContentItem::as_text).collect();
        Value::String(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_items_parse_from_wire_shape() {
        let items: Vec<ContentItem> = serde_json::from_value(json!([
            { "type": "text", "text": "hi", "annotations": { "priority": 1.0 } },
            { "type": "image", "data": "aGk=", "mimeType": "image/png" },
            { "type": "resource", "resource": { "uri": "file:///a.txt", "text": "body" } },
            { "type": "resource_link", "uri": "file:///b", "name": "b" },
            { "type": "hologram", "frames": 3 }
        ]))
        .expect("content should parse");

        let kinds: Vec<_> = items.iter().map(ContentItem::kind).collect();
        assert_eq!(kinds, ["text", "image", "resource", "resource_link", "unknown"]);
        assert_eq!(items[2].as_text(), Some("body"));
        assert_eq!(items[1].as_text(), None);
    }

    #[test]
    fn into_value_or_text_prefers_structured_payload() {
        let result = ToolResult::text("ignored").with_structured(json!({ "ok": true }));
        assert_eq!(result.into_value_or_text(), json!({ "ok": true }));
        assert_eq!(ToolResult::text("plain").into_value_or_text(), json!("plain"));
    }
}
