//! Conversation state for a single agent run.
//!
//! A `Conversation` is created from caller input, gets its system prompt
//! exactly once, and then only ever grows.

use crate::error::AgentError;
use crate::types::{AgentInput, Message, Role};

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Normalize caller input into a conversation ready for the first
    /// model call. Any string, including an empty one, becomes a single
    /// user turn.
    ///
    /// A system message is inserted at the front rather than appended after
    /// the caller's turns, so the model always reads it first. A caller
    /// supplied system message is left where it is.
    pub fn seed(input: AgentInput, system_prompt: &str) -> Result<Self, AgentError> {
        let mut messages = match input {
            AgentInput::Text(text) => vec![Message::user(text)],
            AgentInput::Messages(messages) => {
                if messages.is_empty() {
                    return Err(AgentError::InvalidInput("message list is empty".into()));
                }
                if let Some(pos) = messages
                    .iter()
                    .position(|m| m.role == Role::Tool && m.tool_call_id.is_none())
                {
                    return Err(AgentError::InvalidInput(format!(
                        "tool message at position {} has no tool_call_id",
                        pos
                    )));
                }
                messages
            }
        };

        if !messages.iter().any(|m| m.role == Role::System) {
            messages.insert(0, Message::system(system_prompt));
        }
        Ok(Self { messages })
    }

    /// Append a turn. There is no way to edit or remove one.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(conversation: &Conversation, role: Role) -> usize {
        conversation
            .messages()
            .iter()
            .filter(|m| m.role == role)
            .count()
    }

    #[test]
    fn test_text_gets_user_and_system() {
        let conversation = Conversation::seed("sales in Nov 2021".into(), "be helpful").unwrap();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[0], Message::system("be helpful"));
        assert_eq!(conversation.messages()[1], Message::user("sales in Nov 2021"));
    }

    #[test]
    fn test_existing_system_is_kept() {
        let input = AgentInput::Messages(vec![
            Message::user("hi"),
            Message::system("custom"),
        ]);
        let conversation = Conversation::seed(input, "default").unwrap();
        assert_eq!(conversation.len(), 2);
        assert_eq!(count(&conversation, Role::System), 1);
        assert_eq!(conversation.messages()[1].content, "custom");
    }

    #[test]
    fn test_history_without_system_gets_one() {
        let input = AgentInput::Messages(vec![
            Message::user("first"),
            Message::assistant("answer"),
            Message::user("second"),
        ]);
        let conversation = Conversation::seed(input, "default").unwrap();
        assert_eq!(conversation.len(), 4);
        assert_eq!(count(&conversation, Role::System), 1);
        assert_eq!(conversation.messages()[0].role, Role::System);
        assert_eq!(conversation.messages()[3].content, "second");
    }

    #[test]
    fn test_empty_text_is_still_a_user_turn() {
        let conversation = Conversation::seed("".into(), "s").unwrap();
        assert_eq!(
            conversation.messages(),
            &[Message::system("s"), Message::user("")]
        );
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(matches!(
            Conversation::seed(AgentInput::Messages(vec![]), "s"),
            Err(AgentError::InvalidInput(_))
        ));

        let mut orphan = Message::tool_result("x", "data");
        orphan.tool_call_id = None;
        let err = Conversation::seed(
            AgentInput::Messages(vec![Message::user("q"), orphan]),
            "s",
        )
        .unwrap_err();
        assert!(err.to_string().contains("position 1"));
    }

    #[test]
    fn test_push_appends() {
        let mut conversation = Conversation::seed("q".into(), "s").unwrap();
        conversation.push(Message::assistant("a"));
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation.into_messages()[2].content, "a");
    }
}
