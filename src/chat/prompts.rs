//! System prompts and chat message assembly.

use crate::chat::service::{AnswerMode, SearchContext};
use crate::llm::{ChatMessage, QueryClassification};

/// Application name surfaced in every system prompt.
pub const APP_NAME: &str = "StudyMate";

/// Fixed answer returned when no stored material matches a study query.
pub const NO_STUDY_CONTEXT_ANSWER: &str =
    "No relevant study material found. Please upload documents first or try web search mode.";

/// Fixed answer returned when a web search produces no usable snippets.
pub const NO_WEB_CONTEXT_ANSWER: &str =
    "No relevant web search results found. Please try rephrasing your query.";

const STUDY_MATERIAL_SYSTEM: &str = "You are StudyMate, a highly knowledgeable AI study mentor. \
Your goal is to help students deeply understand academic material using clear explanations \
and proper math formatting.\n\n\
Response Style & Guidelines:\n\
- Write mathematical expressions using LaTeX-style formatting inside `$...$` or `$$...$$`.\n\
- Provide step-by-step reasoning like a teacher.\n\
- Structure responses for readability: a quick summary, a detailed explanation, then optional examples.\n\
- Use bullet points or numbered lists for clarity.\n\
- Be friendly, supportive, and never assume missing information.\n\
- If the answer is not in the study material, clearly say: \
'The provided study material does not contain enough information to answer this question.'\n\
- When asked about your identity, introduce yourself as StudyMate, an AI study mentor.";

const WEB_SEARCH_SYSTEM: &str = "You are StudyMate, an AI mentor who explains concepts with \
math clarity and citations. You answer using web search results.\n\n\
Response Style & Guidelines:\n\
- Write math expressions using LaTeX-style formatting inside `$...$` or `$$...$$`.\n\
- Base answers strictly on search results and cite sources.\n\
- If information conflicts, point this out and provide reasoning.\n\
- Structure answers: summary, step-by-step explanation with math, then sources.\n\
- Use simple, educational language, like a helpful teacher.\n\
- Always identify yourself as StudyMate, an AI study mentor.";

/// Build the message sequence for a context-grounded answer:
/// mode-selected system prompt, then context block, then question block.
pub fn context_messages(context: &SearchContext) -> Vec<ChatMessage> {
    let system = match context.answer_mode {
        AnswerMode::StudyMaterial => STUDY_MATERIAL_SYSTEM,
        AnswerMode::WebSearch => WEB_SEARCH_SYSTEM,
    };
    let context_block = format!("Context:\n{}\n", context.context.join(" "));
    let question_block = format!("Question:\n{}\n", context.original_query);

    vec![
        ChatMessage::system(system),
        ChatMessage::user(context_block),
        ChatMessage::user(question_block),
    ]
}

/// Build the message sequence for a context-less, classification-tailored answer.
pub fn direct_messages(query: &str, classification: QueryClassification) -> Vec<ChatMessage> {
    let system = format!(
        "You are {APP_NAME}, a helpful AI mentor.\n\n\
         Guidelines:\n\
         - Write mathematical expressions in LaTeX style using `$...$` or `$$...$$`.\n\
         - Give step-by-step reasoning instead of just final answers.\n\
         - Use a mentor tone: encouraging, detailed, and clear.\n\
         - Structure responses: summary, explanation (math included), then examples.\n\
         - Be honest about missing information.\n\
         - Cite sources if using web data.\n\n\
         Query classification: {}",
        classification.as_str()
    );

    vec![ChatMessage::system(system), ChatMessage::user(query)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn context(mode: AnswerMode) -> SearchContext {
        SearchContext {
            answer_mode: mode,
            original_query: "what is osmosis?".into(),
            context: vec!["Osmosis moves water.".into(), "Across a membrane.".into()],
            metadata: vec![Map::new(), Map::new()],
        }
    }

    #[test]
    fn context_messages_follow_system_context_question_order() {
        let messages = context_messages(&context(AnswerMode::StudyMaterial));
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("study mentor"));
        assert!(messages[1].content.starts_with("Context:"));
        assert!(messages[1].content.contains("Osmosis moves water. Across a membrane."));
        assert!(messages[2].content.contains("what is osmosis?"));
    }

    #[test]
    fn web_mode_selects_the_citation_prompt() {
        let messages = context_messages(&context(AnswerMode::WebSearch));
        assert!(messages[0].content.contains("web search results"));
    }

    #[test]
    fn direct_messages_carry_the_classification() {
        let messages = direct_messages("tell me a joke", QueryClassification::Misc);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("Query classification: misc"));
        assert_eq!(messages[1].content, "tell me a joke");
    }
}
