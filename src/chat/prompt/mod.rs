
use crate::AskdocsError;
use crate::chat::retriever::Reference;

const PLAIN_PROMPT: &str = "You are a helpful assistant. Please provide your response in a \
     natural conversational style.";

const CITATION_PROMPT: &str = "You are a helpful assistant. Please provide your response with \
     references embedded naturally within the text.\nWhen you reference a source, use a numbered \
     citation style [1], [2], etc.\nAt the end of your response, include a \"References\" section \
     listing all cited sources.";

/// Build the system prompt for a chat turn. With no usable references the
/// model is asked for a plain conversational answer; otherwise the retrieved
/// content is embedded as context with numbered-citation instructions.
#[inline]
pub fn compose_system_prompt(
    user_message: &str,
    references: &[Reference],
) -> crate::Result<String> {
    if user_message.trim().is_empty() {
        return Err(AskdocsError::InvalidRequest(
            "message must not be empty".to_string(),
        ));
    }

    let context: Vec<&str> = references
        .iter()
        .map(|reference| reference.content.as_str())
        .filter(|content| !content.trim().is_empty())
        .collect();

    if context.is_empty() {
        return Ok(PLAIN_PROMPT.to_string());
    }

    Ok(format!("{}\n\nContext: {}", CITATION_PROMPT, context.join("\n")))
}
