//! Prompt assembly — system instructions, retrieved context, conversation.
//!
//! The assembler turns a validated conversation plus zero or more retrieved
//! passages into the exact message sequence sent to the generation backend.
//!
//! # Determinism
//!
//! Assembly is a pure function of its inputs. No random or time-dependent
//! logic is used, and the input conversation is never mutated.

use scholarag_core::message::{ChatMessage, Role};
use scholarag_core::retrieval::RetrievedPassage;
use std::fmt::Write;

/// Fixed instructions sent as the system prompt of every request.
pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant for ScholaRAG - a system that helps researchers build custom RAG systems for literature review.

Your role is to:
1. Answer questions about ScholaRAG's 5-stage workflow
2. Explain PRISMA configuration and screening
3. Help with query design and search strategies
4. Troubleshoot common issues
5. Provide examples and code snippets
6. Guide users through the documentation

Guidelines:
- Be concise but thorough
- Use examples from the documentation
- Cite specific sections when relevant (e.g., \"According to Stage 2: Query Strategy...\")
- If you don't know something, suggest where to find the answer
- Use markdown formatting for code and structured content
- Be encouraging and supportive to researchers

When answering:
- First check if the retrieved context is relevant
- If context is relevant, use it to ground your answer
- If context is not relevant, use your general knowledge but acknowledge limitations
- Always be accurate about technical details (APIs, code, configurations)

Available documentation topics:
- CLAUDE.md (18,000-word implementation guide)
- 5-stage prompts (research setup, query strategy, PRISMA, RAG design, execution)
- Research profile templates (Education, Medicine, Social Science)
- Workshop hands-on guide (3-hour curriculum)
- Quick start guide
";

const CONTEXT_HEADER: &str = "\n\n**Retrieved Context:**\n\n";

/// The generation input: system instructions plus the final message list.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub system_instructions: &'static str,
    pub messages: Vec<ChatMessage>,
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssemblyError {
    #[error("Cannot assemble a prompt from an empty conversation")]
    EmptyConversation,
}

/// Render passages as one delimited block, 1-indexed in input order.
///
/// Returns an empty string when there are no passages.
pub fn render_context_block(passages: &[RetrievedPassage]) -> String {
    if passages.is_empty() {
        return String::new();
    }

    let mut block = String::from(CONTEXT_HEADER);
    for (i, passage) in passages.iter().enumerate() {
        // Writing to a String cannot fail
        let _ = write!(
            block,
            "[{}] From {}:\n{}\n\n",
            i + 1,
            passage.source.filename,
            passage.content
        );
    }
    block
}

/// Build the prompt for one request.
///
/// The context block is appended to the last message only when that message
/// is from the user. Otherwise it is rendered and discarded.
pub fn assemble(
    messages: &[ChatMessage],
    passages: &[RetrievedPassage],
) -> Result<AssembledPrompt, AssemblyError> {
    if messages.is_empty() {
        return Err(AssemblyError::EmptyConversation);
    }

    let mut assembled = messages.to_vec();
    let context = render_context_block(passages);

    if let Some(last) = assembled.last_mut() {
        if !context.is_empty() && last.role == Role::User {
            last.content.push_str(&context);
        }
    }

    Ok(AssembledPrompt {
        system_instructions: SYSTEM_PROMPT,
        messages: assembled,
    })
}
