#![forbid(unsafe_code)]
#![warn(clippy::all)]

use crate::catalog::Field;
use crate::guard::GuardKind;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Raw hook message as the host sends it.
///
/// Every field is kept as a loose `Value` so a wrong-typed field degrades to
/// "absent" instead of failing the whole message.
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Value,
    #[serde(default)]
    pub cwd: Value,
    #[serde(default)]
    pub hook_event_name: Value,
    #[serde(default)]
    pub tool_name: Value,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub tool_response: Value,
}

impl HookInput {
    pub fn extract_field(&self, field_name: &str) -> Option<String> {
        non_empty_str(self.tool_input.get(field_name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    PermissionRequest,
    Stop,
    SubagentStop,
    Unknown,
}

impl HookEvent {
    pub fn from_name(name: &str) -> Self {
        match name {
            "PreToolUse" => HookEvent::PreToolUse,
            "PostToolUse" => HookEvent::PostToolUse,
            "PermissionRequest" => HookEvent::PermissionRequest,
            "Stop" => HookEvent::Stop,
            "SubagentStop" => HookEvent::SubagentStop,
            _ => HookEvent::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HookEvent::PreToolUse => "PreToolUse",
            HookEvent::PostToolUse => "PostToolUse",
            HookEvent::PermissionRequest => "PermissionRequest",
            HookEvent::Stop => "Stop",
            HookEvent::SubagentStop => "SubagentStop",
            HookEvent::Unknown => "Unknown",
        }
    }
}

/// Tool named in the hook message. Tools the guards never single out stay
/// as `Other` with the name the host sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tool {
    Write,
    Edit,
    MultiEdit,
    Bash,
    WebSearch,
    Other(String),
}

impl Tool {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Write" => Tool::Write,
            "Edit" => Tool::Edit,
            "MultiEdit" => Tool::MultiEdit,
            "Bash" => Tool::Bash,
            "WebSearch" => Tool::WebSearch,
            other => Tool::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Tool::Write => "Write",
            Tool::Edit => "Edit",
            Tool::MultiEdit => "MultiEdit",
            Tool::Bash => "Bash",
            Tool::WebSearch => "WebSearch",
            Tool::Other(name) => name,
        }
    }

    pub fn is_file_edit(&self) -> bool {
        matches!(self, Tool::Write | Tool::Edit | Tool::MultiEdit)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    pub file_path: Option<String>,
    pub content: Option<String>,
    pub command: Option<String>,
    pub query: Option<String>,
    pub pattern: Option<String>,
    pub url: Option<String>,
}

impl Parameters {
    fn from_tool_input(input: &HookInput, tool: Option<&Tool>) -> Self {
        let file_path = input
            .extract_field("file_path")
            .or_else(|| input.extract_field("path"));

        let content = input
            .extract_field("content")
            .or_else(|| input.extract_field("new_string"))
            .or_else(|| match tool {
                Some(Tool::MultiEdit) => joined_edits(&input.tool_input),
                _ => None,
            });

        Parameters {
            file_path,
            content,
            command: input.extract_field("command"),
            query: input.extract_field("query"),
            pattern: input.extract_field("pattern"),
            url: input.extract_field("url"),
        }
    }

    /// Text a rule reads for the given payload field.
    pub fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::Content => self.content.as_deref(),
            Field::Path => self.file_path.as_deref(),
            Field::Command => self.command.as_deref(),
            Field::Query => self.query.as_deref(),
        }
    }
}

/// Result of the action a post-action hook is reporting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorOutcome {
    pub success: bool,
    pub exit_code: Option<i64>,
}

impl PriorOutcome {
    fn from_response(response: &Value) -> Option<Self> {
        let object = response.as_object()?;
        let flag = object.get("success").and_then(Value::as_bool);
        let exit_code = object.get("exitCode").and_then(Value::as_i64);
        if flag.is_none() && exit_code.is_none() {
            return None;
        }
        // An exit code, when present, decides.
        let success = match exit_code {
            Some(code) => code == 0,
            None => flag.unwrap_or(true),
        };
        Some(PriorOutcome { success, exit_code })
    }
}

/// One parsed action, ready for evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub kind: GuardKind,
    pub event: HookEvent,
    pub tool: Option<Tool>,
    pub params: Parameters,
    pub prior_outcome: Option<PriorOutcome>,
    pub session_id: String,
    pub cwd: String,
}

impl Invocation {
    /// The invocation that evaluates to a silent allow.
    pub fn noop(kind: GuardKind) -> Self {
        Invocation {
            kind,
            event: HookEvent::Unknown,
            tool: None,
            params: Parameters::default(),
            prior_outcome: None,
            session_id: String::new(),
            cwd: String::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.event == HookEvent::Unknown && self.tool.is_none()
    }

    /// Decode an untrusted hook message. Never fails: anything that is not a
    /// usable JSON object becomes the no-op invocation.
    pub fn parse(kind: GuardKind, raw: &str) -> Self {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                debug!("Ignoring malformed hook input: {}", e);
                return Self::noop(kind);
            }
        };

        if !value.is_object() {
            debug!("Ignoring hook input that is not a JSON object");
            return Self::noop(kind);
        }

        let input: HookInput = match serde_json::from_value(value) {
            Ok(input) => input,
            Err(e) => {
                debug!("Ignoring unreadable hook input: {}", e);
                return Self::noop(kind);
            }
        };

        Self::from_hook_input(kind, &input)
    }

    pub fn from_hook_input(kind: GuardKind, input: &HookInput) -> Self {
        let event_name = non_empty_str(Some(&input.hook_event_name));
        let tool_name = non_empty_str(Some(&input.tool_name));

        if event_name.is_none() && tool_name.is_none() {
            trace!("Hook input names neither an event nor a tool");
            return Self::noop(kind);
        }

        let event = event_name
            .as_deref()
            .map(HookEvent::from_name)
            .unwrap_or_else(|| kind.event());
        let tool = tool_name.as_deref().map(Tool::from_name);
        let params = Parameters::from_tool_input(input, tool.as_ref());

        Invocation {
            kind,
            event,
            params,
            prior_outcome: PriorOutcome::from_response(&input.tool_response),
            session_id: non_empty_str(Some(&input.session_id)).unwrap_or_default(),
            cwd: non_empty_str(Some(&input.cwd)).unwrap_or_default(),
            tool,
        }
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool.as_ref().map(Tool::name)
    }

    /// A missing prior outcome counts as success.
    pub fn prior_succeeded(&self) -> bool {
        self.prior_outcome.is_none_or(|outcome| outcome.success)
    }

    pub fn file_name(&self) -> Option<&str> {
        let path = self.params.file_path.as_deref()?;
        Path::new(path).file_name().and_then(|name| name.to_str())
    }

    /// One-line description of the key parameters, used in audit records.
    pub fn summary(&self) -> String {
        let mut details = Vec::new();

        if let Some(path) = &self.params.file_path {
            details.push(format!("file={}", shorten_path(path)));
        }
        if let Some(command) = &self.params.command {
            let short = if command.chars().count() > 80 {
                format!("{}...", take_chars(command, 80))
            } else {
                command.clone()
            };
            details.push(format!("cmd={}", short.replace('\n', " ")));
        }
        if let Some(pattern) = &self.params.pattern {
            details.push(format!("pattern={}", take_chars(pattern, 40)));
        }
        if let Some(url) = &self.params.url {
            details.push(format!("url={}", take_chars(url, 60)));
        }
        if let Some(query) = &self.params.query {
            details.push(format!("query={}", take_chars(query, 80)));
        }

        if details.is_empty() {
            "no details".to_string()
        } else {
            details.join(" | ")
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn joined_edits(tool_input: &Value) -> Option<String> {
    let edits = tool_input.get("edits")?.as_array()?;
    let parts: Vec<&str> = edits
        .iter()
        .filter_map(|edit| edit.get("new_string").and_then(Value::as_str))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

fn take_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn shorten_path(path: &str) -> String {
    if path.chars().count() <= 50 {
        return path.to_string();
    }
    let p = Path::new(path);
    let parent = p
        .parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .unwrap_or("");
    let name = p.file_name().and_then(|name| name.to_str()).unwrap_or("");
    format!(".../{}/{}", parent, name)
}
