//! Role-typed conversations rebuilt from serialized message descriptors.

use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
    Ai,
}

impl Role {
    /// Maps a serialized message type tag to a role.
    ///
    /// Only `"system"` and `"human"` are recognised; every other tag, including a missing one,
    /// is treated as model output.
    pub fn from_type_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("system") => Role::System,
            Some("human") => Role::Human,
            _ => Role::Ai,
        }
    }

    /// Role name on the OpenAI chat completions wire format
    pub fn as_openai_role(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Human => "user",
            Role::Ai => "assistant",
        }
    }
}

/// One serialized message as captured by the tracer (the `kwargs` of a LangChain message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,
    pub content: String,
}

impl MessageDescriptor {
    pub fn new(message_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            message_type: Some(message_type.into()),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMessage {
    pub role: Role,
    pub content: String,
}

/// Converts descriptors into role-typed messages, one for one and in order.
pub fn build_conversation(descriptors: &[MessageDescriptor]) -> Vec<RoleMessage> {
    descriptors
        .iter()
        .map(|descriptor| RoleMessage {
            role: Role::from_type_tag(descriptor.message_type.as_deref()),
            content: descriptor.content.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tags_map_to_matching_role() {
        let conversation = build_conversation(&[
            MessageDescriptor::new("system", "Explain the meaning of life in 10 words or less."),
            MessageDescriptor::new("human", "Go on then."),
        ]);

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].role, Role::System);
        assert_eq!(conversation[0].content, "Explain the meaning of life in 10 words or less.");
        assert_eq!(conversation[1].role, Role::Human);
    }

    #[test]
    fn test_other_tags_fall_back_to_ai() {
        let descriptors = vec![
            MessageDescriptor::new("ai", "a"),
            MessageDescriptor::new("assistant", "b"),
            MessageDescriptor::new("", "c"),
            MessageDescriptor::new("tool", "d"),
            MessageDescriptor::new("System", "e"),
            MessageDescriptor {
                message_type: None,
                content: "f".to_string(),
            },
        ];

        let conversation = build_conversation(&descriptors);

        assert_eq!(conversation.len(), descriptors.len());
        assert!(conversation.iter().all(|m| m.role == Role::Ai));
        let contents: Vec<&str> = conversation.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn test_build_is_idempotent() {
        let descriptors = vec![
            MessageDescriptor::new("system", "You are terse."),
            MessageDescriptor::new("human", "Hi"),
            MessageDescriptor::new("ai", "Hello."),
        ];

        assert_eq!(build_conversation(&descriptors), build_conversation(&descriptors));
    }

    #[test]
    fn test_openai_roles() {
        assert_eq!(Role::System.as_openai_role(), "system");
        assert_eq!(Role::Human.as_openai_role(), "user");
        assert_eq!(Role::Ai.as_openai_role(), "assistant");
    }

    #[test]
    fn test_descriptor_null_type_deserializes() {
        let descriptor: MessageDescriptor = serde_json::from_str(r#"{"type": null, "content": "x"}"#).unwrap();
        assert_eq!(descriptor.message_type, None);
    }
}
