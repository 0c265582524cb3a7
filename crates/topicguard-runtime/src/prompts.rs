//! Prompts for LLM topic resolution.
//!
//! The model is asked for exactly one topic, as a JSON object with a single
//! `topic` key. [`crate::resolver::parse_topic_response`] reads that shape.

/// Classification prompt. `{text}` and `{topics}` are substituted.
pub const TOPIC_CLASSIFICATION_PROMPT: &str = concat!(
    "Classify the following text {text} into one of these topics: {topics}. ",
    "Format the response as JSON with the following schema: {\"topic\": \"topic_name\"}"
);

/// Render the candidate list the way the prompt expects it.
pub fn format_topic_list(topics: &[String]) -> String {
    let quoted: Vec<String> = topics.iter().map(|t| format!("'{}'", t)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Build the user prompt for one classification request.
///
/// Placeholders are filled in a single pass over the template, so braces in
/// the text or in topic labels are copied verbatim.
pub fn build_topic_prompt(text: &str, topics: &[String]) -> String {
    let topic_list = format_topic_list(topics);
    let mut prompt =
        String::with_capacity(TOPIC_CLASSIFICATION_PROMPT.len() + text.len() + topic_list.len());
    let mut rest = TOPIC_CLASSIFICATION_PROMPT;

    while let Some(start) = rest.find('{') {
        prompt.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{text}") {
            prompt.push_str(text);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{topics}") {
            prompt.push_str(&topic_list);
            rest = after;
        } else {
            prompt.push('{');
            rest = &tail[1..];
        }
    }
    prompt.push_str(rest);
    prompt
}
