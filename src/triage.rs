//! Rule-based prompting for the care-line triage assistant
//!
//! Everything the model is told lives here: the topic rules, the strict
//! JSON output contract, and the canned replies. The exchange handler only
//! assembles strings from this module; it never invents prompt text.

/// Reply the model is instructed to use for OTHERS traffic that needs a human.
pub const ESCALATION_REPLY: &str =
    "Thanks for reaching out. A member of your care team will review this and get back to you shortly.";

/// Bare acknowledgements that never warrant a reply when they open a session.
const GENERIC_ACKS: [&str; 3] = ["ok", "okay", "thanks"];

/// Topic rules given to the classifier as system context.
const TRIAGE_RULES: &str = r#"You are the automated triage assistant for a care program. Members send short SMS-style messages to their care team. Classify the conversation into exactly one topic:

LAB - lab test appointments and lab results: scheduling, rescheduling or cancelling a blood draw, fasting requirements, sample collection visits, questions about a lab report.

TWIN_APPOINTMENT - non-lab appointments with the care team: doctor consultations, coach check-ins, sensor fitting or removal, follow-up visits.

OTHERS - anything that fits neither topic.

For LAB and TWIN_APPOINTMENT set "status" to "ok" and answer the member's latest message directly in one or two SMS-length sentences.

For OTHERS set "status" to "escalate" and set "response_message" to exactly: "Thanks for reaching out. A member of your care team will review this and get back to you shortly." Exception: if the latest message is only a bare acknowledgement such as "ok", "okay" or "thanks", set "status" to "no_response" and leave "response_message" empty.

Set "confidence" to your estimate in [0.0, 1.0] and "justification" to one short sentence."#;

/// Full system prompt: rules plus the strict output contract.
pub fn system_prompt() -> String {
    format!(
        "{}\n\nYour task is strictly to analyze the conversation and output a JSON object \
         that adheres to the provided schema. DO NOT generate any free-form text or preamble.",
        TRIAGE_RULES
    )
}

/// Render a conversation as `role: content` lines for the classifier.
pub fn render_history<'a>(turns: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    turns
        .into_iter()
        .map(|(role, content)| format!("{}: {}", role, content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// User-side message wrapping the rendered history.
pub fn classification_input(history: &str) -> String {
    format!(
        "Analyze the following conversation history and classify the topic.\n\
         **Conversation History:**\n{}\n\
         Provide the complete classification JSON.",
        history
    )
}

/// True for a bare acknowledgement ("ok", "okay", "thanks"), ignoring
/// case and surrounding whitespace. Multi-word messages never match.
pub fn is_generic_ack(message: &str) -> bool {
    let normalized = message.trim().to_lowercase();
    GENERIC_ACKS.contains(&normalized.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_ack_detection() {
        assert!(is_generic_ack("ok"));
        assert!(is_generic_ack("  OK  "));
        assert!(is_generic_ack("Okay"));
        assert!(is_generic_ack("thanks"));
        // Multi-word and substantive messages go to the classifier.
        assert!(!is_generic_ack("ok thanks"));
        assert!(!is_generic_ack("thanks for the reminder"));
        assert!(!is_generic_ack(""));
    }

    #[test]
    fn history_renders_role_prefixed_lines() {
        let rendered = render_history([
            ("user", "When is my blood test?"),
            ("assistant", "Tomorrow at 9am."),
        ]);
        assert_eq!(
            rendered,
            "user: When is my blood test?\nassistant: Tomorrow at 9am."
        );
    }

    #[test]
    fn system_prompt_names_all_topics() {
        let prompt = system_prompt();
        for label in ["LAB", "TWIN_APPOINTMENT", "OTHERS"] {
            assert!(prompt.contains(label), "missing topic {}", label);
        }
        assert!(prompt.contains("JSON"));
    }

    #[test]
    fn classification_input_embeds_history() {
        let input = classification_input("user: hello");
        assert!(input.contains("user: hello"));
        assert!(input.contains("Conversation History"));
    }
}
