//! Prompt construction for the generation stage
//!
//! Two shapes of request: grounded (the retrieved passages are folded into
//! the final user message and the system prompt forbids going beyond them)
//! and general (no passages, plain assistant persona). Both carry the
//! layered-context messages between the system prompt and the final user
//! message.

use crate::backend::ChatMessage;
use crate::memory::LayeredContext;
use crate::retrieval::RetrievalCandidate;

const GROUNDED_SYSTEM: &str = "\
You are a document question answering assistant. You answer the user's \
question from the document passages they supply.
Rules:
1. Base every statement strictly on the passages; never invent or guess \
information they do not contain.
2. If the passages do not contain the answer, say so plainly.
3. Keep answers concise and clearly structured.
4. When you draw on a passage, cite it by its [n] number.";

const GENERAL_SYSTEM: &str = "\
You are a helpful assistant. Answer the question concisely and accurately, \
and say so when you are not sure.";

/// A fully assembled generation request
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
}

/// Build a request whose final user message embeds the retrieved passages
pub fn grounded_request(
    question: &str,
    passages: &[RetrievalCandidate],
    context: &LayeredContext,
) -> PromptRequest {
    let user_message = render_grounded_question(question, passages);
    PromptRequest {
        system_prompt: GROUNDED_SYSTEM.to_string(),
        messages: context.to_messages(&user_message),
    }
}

/// Build a request with no document grounding
pub fn general_request(question: &str, context: &LayeredContext) -> PromptRequest {
    PromptRequest {
        system_prompt: GENERAL_SYSTEM.to_string(),
        messages: context.to_messages(question),
    }
}

fn render_grounded_question(question: &str, passages: &[RetrievalCandidate]) -> String {
    let mut text = String::from(
        "Answer the question using only the document passages below.\n\nPassages:\n",
    );
    for (index, passage) in passages.iter().enumerate() {
        text.push_str(&format!(
            "[{}] (document {}, chunk {})\n{}\n\n",
            index + 1,
            passage.document_id,
            passage.chunk_id,
            passage.content
        ));
    }
    text.push_str(&format!(
        "Question: {question}\n\nIf the passages do not contain the relevant information, state that explicitly."
    ));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Role;

    fn passage(chunk_id: &str, content: &str) -> RetrievalCandidate {
        RetrievalCandidate::new(3, chunk_id, content)
    }

    #[test]
    fn test_grounded_request_numbers_passages() {
        let passages = vec![
            passage("3_1", "first passage text"),
            passage("3_2", "second passage text"),
        ];
        let request = grounded_request("what is covered?", &passages, &LayeredContext::default());

        assert!(request.system_prompt.contains("strictly on the passages"));
        assert_eq!(request.messages.len(), 1);
        let user = &request.messages[0];
        assert_eq!(user.role, Role::User);
        assert!(user.content.contains("[1] (document 3, chunk 3_1)\nfirst passage text"));
        assert!(user.content.contains("[2] (document 3, chunk 3_2)\nsecond passage text"));
        assert!(user.content.contains("Question: what is covered?"));
    }

    #[test]
    fn test_general_request_keeps_bare_question() {
        let request = general_request("what time is it?", &LayeredContext::default());
        assert!(!request.system_prompt.contains("passages"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "what time is it?");
    }

    #[test]
    fn test_context_messages_precede_final_question() {
        let context = LayeredContext {
            short_term: vec![
                ChatMessage::user("earlier question"),
                ChatMessage::assistant("earlier answer"),
            ],
            ..LayeredContext::default()
        };
        let request = grounded_request("follow-up", &[passage("3_1", "text")], &context);

        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0].content, "earlier question");
        assert_eq!(request.messages[1].content, "earlier answer");
        assert!(request.messages[2].content.contains("Question: follow-up"));
    }
}
