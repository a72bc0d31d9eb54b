//! Prompt assembly for one reply.
//!
//! Block order is fixed: operator instructions, retrieved knowledge,
//! rolling summary, then the user's message. Empty blocks are skipped
//! entirely rather than sent as blank system messages.

use crate::providers::ChatMessage;
use crate::store::DEFAULT_SYSTEM_INSTRUCTIONS;

/// Everything one reply's prompt is built from, borrowed from the
/// admission-time config snapshot and the retrieval pass.
pub struct PromptContext<'a> {
    pub system_instructions: &'a str,
    pub knowledge: &'a [String],
    pub summary: Option<&'a str>,
    pub user_message: &'a str,
}

pub fn build_messages(ctx: &PromptContext<'_>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(4);

    let instructions = if ctx.system_instructions.trim().is_empty() {
        DEFAULT_SYSTEM_INSTRUCTIONS
    } else {
        ctx.system_instructions
    };
    messages.push(ChatMessage::system(instructions));

    if !ctx.knowledge.is_empty() {
        messages.push(ChatMessage::system(format!(
            "RELEVANT KNOWLEDGE:\n{}",
            ctx.knowledge.join("\n\n")
        )));
    }

    if let Some(summary) = ctx.summary.filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage::system(format!("Context Summary: {summary}")));
    }

    messages.push(ChatMessage::user(ctx.user_message));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_context<'a>(knowledge: &'a [String]) -> PromptContext<'a> {
        PromptContext {
            system_instructions: "You are the support agent for Acme.",
            knowledge,
            summary: Some("User is asking about refunds."),
            user_message: "how long do refunds take?",
        }
    }

    #[test]
    fn all_blocks_present_in_fixed_order() {
        let knowledge = vec!["Refunds take 5 days.".to_string()];
        let messages = build_messages(&full_context(&knowledge));

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "You are the support agent for Acme.");
        assert_eq!(messages[1].role, "system");
        assert!(messages[1].content.starts_with("RELEVANT KNOWLEDGE:\n"));
        assert_eq!(messages[2].role, "system");
        assert_eq!(
            messages[2].content,
            "Context Summary: User is asking about refunds."
        );
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content, "how long do refunds take?");
    }

    #[test]
    fn empty_knowledge_block_is_skipped() {
        let messages = build_messages(&PromptContext {
            system_instructions: "instructions",
            knowledge: &[],
            summary: None,
            user_message: "hi",
        });

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn blank_summary_is_skipped() {
        let messages = build_messages(&PromptContext {
            system_instructions: "instructions",
            knowledge: &[],
            summary: Some("   "),
            user_message: "hi",
        });

        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn blank_instructions_fall_back_to_default() {
        let messages = build_messages(&PromptContext {
            system_instructions: "  ",
            knowledge: &[],
            summary: None,
            user_message: "hi",
        });

        assert_eq!(messages[0].content, DEFAULT_SYSTEM_INSTRUCTIONS);
    }

    #[test]
    fn knowledge_chunks_joined_with_blank_line() {
        let knowledge = vec!["first chunk".to_string(), "second chunk".to_string()];
        let messages = build_messages(&PromptContext {
            system_instructions: "instructions",
            knowledge: &knowledge,
            summary: None,
            user_message: "hi",
        });

        assert_eq!(
            messages[1].content,
            "RELEVANT KNOWLEDGE:\nfirst chunk\n\nsecond chunk"
        );
    }

    #[test]
    fn user_message_always_last() {
        let knowledge = vec!["chunk".to_string()];
        let messages = build_messages(&full_context(&knowledge));

        let last = messages.last().unwrap();
        assert_eq!(last.role, "user");
        assert_eq!(last.content, "how long do refunds take?");
    }
}
