//! Structured-output reconciliation shared by every adapter.
//!
//! Each adapted tool gets an [`OutputReconciler`] built once at adaptation
//! time. It turns the raw [`ToolResult`] of a call into a [`ToolOutput`]
//! according to the tool's [`OutputMode`].

use base64::Engine;
use serde_json::{json, Map, Value};
use strum::{Display, EnumString};
use tracing::warn;

use crate::error::BridgeError;
use crate::mcp::{ContentItem, RemoteTool, ToolResult};
use crate::util::text::snippet;

const WRAP_RESULT_MARKER: &str = "x-fastmcp-wrap-result";
const RESULT_KEY: &str = "result";
const SNIPPET_CHARS: usize = 100;

/// How a tool's result is presented to its framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum OutputMode {
    /// First text item, verbatim.
    RawText,
    /// Structured payload or parsed JSON text.
    StructuredObject,
    /// Raw text, advertised as a string output.
    StructuredString,
}

impl OutputMode {
    /// Output type name advertised to frameworks.
    pub fn native_type(self) -> &'static str {
        match self {
            OutputMode::RawText | OutputMode::StructuredString => "string",
            OutputMode::StructuredObject => "object",
        }
    }
}

/// When a parsed non-object value is wrapped as `{"result": value}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ResultWrapping {
    /// Only when the output schema declares a wrapped result.
    #[default]
    FromSchema,
    Always,
    Never,
}

/// Adapter-level output settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputPolicy {
    pub structured_output: bool,
    pub wrapping: ResultWrapping,
}

impl OutputPolicy {
    pub fn raw_text() -> Self {
        Self::default()
    }

    pub fn structured() -> Self {
        Self {
            structured_output: true,
            wrapping: ResultWrapping::default(),
        }
    }

    pub fn with_wrapping(mut self, wrapping: ResultWrapping) -> Self {
        self.wrapping = wrapping;
        self
    }

    pub fn mode_for(&self, tool: &RemoteTool) -> OutputMode {
        match (self.structured_output, tool.output_schema.is_some()) {
            (false, _) => OutputMode::RawText,
            (true, true) => OutputMode::StructuredObject,
            (true, false) => OutputMode::StructuredString,
        }
    }
}

/// Media content a tool shape can carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaSupport {
    pub images: bool,
    pub audio: bool,
}

impl MediaSupport {
    pub const NONE: Self = Self {
        images: false,
        audio: false,
    };
    pub const ALL: Self = Self {
        images: true,
        audio: true,
    };
}

/// Reconciled result of one call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Structured(Value),
    Image { mime_type: String, data: Vec<u8> },
    Audio { mime_type: String, data: Vec<u8> },
}

impl ToolOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolOutput::Text(text) => Some(text),
            _ => None,
        }
    }

    /// JSON form; media is re-encoded as base64.
    pub fn into_value(self) -> Value {
        match self {
            ToolOutput::Text(text) => Value::String(text),
            ToolOutput::Structured(value) => value,
            ToolOutput::Image { mime_type, data } => json!({
                "type": "image",
                "mime_type": mime_type,
                "data": base64::engine::general_purpose::STANDARD.encode(data),
            }),
            ToolOutput::Audio { mime_type, data } => json!({
                "type": "audio",
                "mime_type": mime_type,
                "data": base64::engine::general_purpose::STANDARD.encode(data),
            }),
        }
    }
}

/// Per-tool output policy, fixed at adaptation time.
#[derive(Debug, Clone)]
pub struct OutputReconciler {
    tool_name: String,
    mode: OutputMode,
    wraps_result: bool,
    media: MediaSupport,
}

impl OutputReconciler {
    pub fn new(tool: &RemoteTool, policy: OutputPolicy, media: MediaSupport) -> Self {
        let wraps_result = match policy.wrapping {
            ResultWrapping::Always => true,
            ResultWrapping::Never => false,
            ResultWrapping::FromSchema => tool
                .output_schema
                .as_ref()
                .is_some_and(schema_wraps_result),
        };
        Self {
            tool_name: tool.name.clone(),
            mode: policy.mode_for(tool),
            wraps_result,
            media,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn reconcile(&self, result: ToolResult) -> Result<ToolOutput, BridgeError> {
        let ToolResult {
            content,
            structured_content,
        } = result;

        if self.mode == OutputMode::StructuredObject {
            if let Some(structured) = structured_content {
                return Ok(ToolOutput::Structured(self.shape(structured)));
            }
        }

        let content_len = content.len();
        let Some(first) = content.into_iter().next() else {
            return Err(BridgeError::EmptyContent {
                tool_name: self.tool_name.clone(),
            });
        };
        if content_len > 1 {
            warn!(
                tool = %self.tool_name,
                items = content_len,
                "tool returned multiple content items; using the first"
            );
        }

        match first {
            ContentItem::Text { text } => Ok(self.from_text(text)),
            ContentItem::Resource { resource } if resource.text.is_some() => {
                Ok(self.from_text(resource.text.unwrap_or_default()))
            }
            ContentItem::Image { data, mime_type } if self.media.images => Ok(ToolOutput::Image {
                data: self.decode(&data)?,
                mime_type,
            }),
            ContentItem::Audio { data, mime_type } if self.media.audio => Ok(ToolOutput::Audio {
                data: self.decode(&data)?,
                mime_type,
            }),
            other => Err(BridgeError::UnsupportedContent {
                tool_name: self.tool_name.clone(),
                content_type: other.kind().to_string(),
            }),
        }
    }

    fn from_text(&self, text: String) -> ToolOutput {
        if self.mode != OutputMode::StructuredObject {
            return ToolOutput::Text(text);
        }
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => ToolOutput::Structured(self.shape(value)),
            Err(error) => {
                warn!(
                    tool = %self.tool_name,
                    %error,
                    snippet = %snippet(&text, SNIPPET_CHARS),
                    "structured output is not valid JSON; returning raw text"
                );
                ToolOutput::Text(text)
            }
        }
    }

    fn shape(&self, value: Value) -> Value {
        if value.is_object() || !self.wraps_result {
            return value;
        }
        let mut wrapped = Map::new();
        wrapped.insert(RESULT_KEY.to_string(), value);
        Value::Object(wrapped)
    }

    fn decode(&self, data: &str) -> Result<Vec<u8>, BridgeError> {
        base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| BridgeError::InvalidContent {
                tool_name: self.tool_name.clone(),
                message: format!("invalid base64 payload: {e}"),
            })
    }
}

/// True when the schema marks the result as wrapped, or its only required
/// property is `result`.
fn schema_wraps_result(schema: &Value) -> bool {
    if schema.get(WRAP_RESULT_MARKER).and_then(Value::as_bool) == Some(true) {
        return true;
    }
    let sole_required_result = schema
        .get("required")
        .and_then(Value::as_array)
        .is_some_and(|required| required.len() == 1 && required[0] == RESULT_KEY);
    sole_required_result
        && schema
            .get("properties")
            .and_then(|p| p.get(RESULT_KEY))
            .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::EmbeddedResource;
    use pretty_assertions::assert_eq;

    fn plain_tool() -> RemoteTool {
        RemoteTool::new("plain", json!({ "type": "object" }))
    }

    fn schema_tool(schema: Value) -> RemoteTool {
        plain_tool().with_output_schema(schema)
    }

    fn wrapped_schema() -> Value {
        json!({
            "type": "object",
            "properties": { "result": { "type": "array", "items": { "type": "integer" } } },
            "required": ["result"],
            "x-fastmcp-wrap-result": true
        })
    }

    #[test]
    fn mode_follows_policy_and_schema() {
        let with_schema = schema_tool(json!({ "type": "object" }));

        assert_eq!(OutputPolicy::raw_text().mode_for(&with_schema), OutputMode::RawText);
        assert_eq!(
            OutputPolicy::structured().mode_for(&with_schema),
            OutputMode::StructuredObject
        );
        assert_eq!(
            OutputPolicy::structured().mode_for(&plain_tool()),
            OutputMode::StructuredString
        );
        assert_eq!(OutputMode::StructuredString.native_type(), "string");
        assert_eq!(OutputMode::StructuredObject.native_type(), "object");
    }

    #[test]
    fn raw_text_returns_first_text_verbatim() {
        let reconciler = OutputReconciler::new(&plain_tool(), OutputPolicy::raw_text(), MediaSupport::NONE);
        let output = reconciler
            .reconcile(ToolResult::text("{\"not\": \"parsed\"}"))
            .unwrap();
        assert_eq!(output, ToolOutput::Text("{\"not\": \"parsed\"}".into()));
    }

    #[test]
    fn structured_payload_object_is_returned_as_is() {
        let tool = schema_tool(json!({ "type": "object", "properties": { "temp": { "type": "number" } } }));
        let reconciler = OutputReconciler::new(&tool, OutputPolicy::structured(), MediaSupport::NONE);

        let result = ToolResult::text("ignored").with_structured(json!({ "temp": 21.5 }));
        assert_eq!(
            reconciler.reconcile(result).unwrap(),
            ToolOutput::Structured(json!({ "temp": 21.5 }))
        );
    }

    #[test]
    fn bare_list_is_wrapped_when_schema_declares_it() {
        let reconciler =
            OutputReconciler::new(&schema_tool(wrapped_schema()), OutputPolicy::structured(), MediaSupport::NONE);

        let output = reconciler.reconcile(ToolResult::text("[1, 2, 3]")).unwrap();
        assert_eq!(output, ToolOutput::Structured(json!({ "result": [1, 2, 3] })));
    }

    #[test]
    fn sole_required_result_property_implies_wrapping() {
        let schema = json!({
            "type": "object",
            "properties": { "result": { "type": "integer" } },
            "required": ["result"]
        });
        let reconciler = OutputReconciler::new(&schema_tool(schema), OutputPolicy::structured(), MediaSupport::NONE);

        assert_eq!(
            reconciler.reconcile(ToolResult::text("42")).unwrap(),
            ToolOutput::Structured(json!({ "result": 42 }))
        );
    }

    #[test]
    fn wrapping_overrides() {
        let plain_object = schema_tool(json!({ "type": "object" }));
        let always = OutputReconciler::new(
            &plain_object,
            OutputPolicy::structured().with_wrapping(ResultWrapping::Always),
            MediaSupport::NONE,
        );
        let never = OutputReconciler::new(
            &schema_tool(wrapped_schema()),
            OutputPolicy::structured().with_wrapping(ResultWrapping::Never),
            MediaSupport::NONE,
        );

        assert_eq!(
            always.reconcile(ToolResult::text("\"hi\"")).unwrap(),
            ToolOutput::Structured(json!({ "result": "hi" }))
        );
        assert_eq!(
            never.reconcile(ToolResult::text("[1]")).unwrap(),
            ToolOutput::Structured(json!([1]))
        );
        // objects are never re-wrapped
        assert_eq!(
            always.reconcile(ToolResult::text("{\"a\": 1}")).unwrap(),
            ToolOutput::Structured(json!({ "a": 1 }))
        );
    }

    #[test]
    fn unparseable_structured_text_falls_back_to_raw_text() {
        let reconciler = OutputReconciler::new(
            &schema_tool(json!({ "type": "object" })),
            OutputPolicy::structured(),
            MediaSupport::NONE,
        );
        let output = reconciler.reconcile(ToolResult::text("sunny, 21C")).unwrap();
        assert_eq!(output, ToolOutput::Text("sunny, 21C".into()));
    }

    #[test]
    fn plain_text_without_schema_is_structured_string() {
        let reconciler = OutputReconciler::new(&plain_tool(), OutputPolicy::structured(), MediaSupport::NONE);
        assert_eq!(reconciler.mode(), OutputMode::StructuredString);
        assert_eq!(
            reconciler.reconcile(ToolResult::text("[1, 2]")).unwrap(),
            ToolOutput::Text("[1, 2]".into())
        );
    }

    #[test]
    fn empty_content_is_an_error() {
        let reconciler = OutputReconciler::new(&plain_tool(), OutputPolicy::raw_text(), MediaSupport::NONE);
        let err = reconciler.reconcile(ToolResult::default()).unwrap_err();
        assert!(matches!(err, BridgeError::EmptyContent { tool_name } if tool_name == "plain"));
    }

    #[test]
    fn multiple_items_use_the_first() {
        let reconciler = OutputReconciler::new(&plain_tool(), OutputPolicy::raw_text(), MediaSupport::NONE);
        let result = ToolResult {
            content: vec![ContentItem::text("first"), ContentItem::text("second")],
            structured_content: None,
        };
        assert_eq!(reconciler.reconcile(result).unwrap(), ToolOutput::Text("first".into()));
    }

    #[test]
    fn media_is_decoded_only_when_supported() {
        let image = ToolResult {
            content: vec![ContentItem::Image {
                data: base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]),
                mime_type: "image/png".into(),
            }],
            structured_content: None,
        };

        let with_media = OutputReconciler::new(&plain_tool(), OutputPolicy::raw_text(), MediaSupport::ALL);
        assert_eq!(
            with_media.reconcile(image.clone()).unwrap(),
            ToolOutput::Image {
                mime_type: "image/png".into(),
                data: vec![1, 2, 3],
            }
        );

        let text_only = OutputReconciler::new(&plain_tool(), OutputPolicy::raw_text(), MediaSupport::NONE);
        assert!(matches!(
            text_only.reconcile(image).unwrap_err(),
            BridgeError::UnsupportedContent { content_type, .. } if content_type == "image"
        ));
    }

    #[test]
    fn invalid_base64_is_invalid_content() {
        let reconciler = OutputReconciler::new(&plain_tool(), OutputPolicy::raw_text(), MediaSupport::ALL);
        let result = ToolResult {
            content: vec![ContentItem::Audio {
                data: "%%%".into(),
                mime_type: "audio/wav".into(),
            }],
            structured_content: None,
        };
        assert!(matches!(
            reconciler.reconcile(result).unwrap_err(),
            BridgeError::InvalidContent { .. }
        ));
    }

    #[test]
    fn text_resources_read_as_text() {
        let reconciler = OutputReconciler::new(&plain_tool(), OutputPolicy::raw_text(), MediaSupport::NONE);
        let result = ToolResult {
            content: vec![ContentItem::Resource {
                resource: EmbeddedResource {
                    uri: "file:///notes.txt".into(),
                    mime_type: Some("text/plain".into()),
                    text: Some("notes".into()),
                    blob: None,
                },
            }],
            structured_content: None,
        };
        assert_eq!(reconciler.reconcile(result).unwrap(), ToolOutput::Text("notes".into()));
    }

    #[test]
    fn media_output_converts_back_to_json() {
        let value = ToolOutput::Image {
            mime_type: "image/png".into(),
            data: vec![1, 2, 3],
        }
        .into_value();
        assert_eq!(value["type"], "image");
        assert_eq!(value["data"], "AQID");
    }
}
