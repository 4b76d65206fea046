//! Prompt text for the two model calls.

/// Selection prompt: pick new, representative product questions from a batch,
/// skipping anything close to what was already asked. The model is asked
/// for at most `max_questions`.
pub fn selection_prompt(
    new_comments: &[String],
    processed_questions: &[String],
    max_questions: usize,
) -> String {
    format!(
        r#"
You are an AI assistant for a live shopping stream. Your task is to analyze a batch of NEW user comments in the context of questions that have ALREADY been asked, and select only the truly NEW, representative, product-related questions.

CONTEXT:
Here is the list of questions that have already been selected and asked previously. Do NOT select these questions again or any minor variations of them:
---
{processed}
---

TASK:
Now, analyze this NEW batch of user comments. Identify important, new product questions that are NOT semantically similar to the ones in the context list above.
---
NEW BATCH:
{comments}
---

Please perform the following steps:
1. From the NEW BATCH, identify direct product questions.
2. Compare them against the list of previously asked questions to ensure they are genuinely new topics.
3. Group any similar new questions and pick the single best one.
4. Return a JSON object with a single key "newly_selected_questions", which is a list of the new representative question strings you have chosen. The list should contain at most {max_questions} questions.

Example output format:
{{
  "newly_selected_questions": [
    "What material is it made of?",
    "How long does shipping take?"
  ]
}}
"#,
        processed = json_list(processed_questions),
        comments = json_list(new_comments),
    )
}

/// Answer prompt: product context plus one viewer question.
pub fn answer_prompt(product_info: &str, question: &str) -> String {
    format!(
        "You are an AI assistant for a live shopping stream. Based on the following product \
         information and the user's question, generate a concise and professional answer.\n\n\
         Product Information:\n{product_info}\n\n\
         User Question:\n{question}\n\n\
         Please output only the answer text."
    )
}

fn json_list(items: &[String]) -> String {
    serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_prompt_embeds_both_lists_as_json() {
        let prompt = selection_prompt(
            &["What's the price?".to_string()],
            &["Is it waterproof?".to_string()],
            5,
        );
        assert!(prompt.contains("\"What's the price?\""));
        assert!(prompt.contains("\"Is it waterproof?\""));
        assert!(prompt.contains("newly_selected_questions"));
        assert!(prompt.contains("at most 5"));
    }

    #[test]
    fn selection_prompt_with_empty_history() {
        let prompt = selection_prompt(&["hi".to_string()], &[], 5);
        assert!(prompt.contains("---\n[]\n---"));
    }

    #[test]
    fn selection_prompt_states_the_configured_cap() {
        let prompt = selection_prompt(&["hi".to_string()], &[], 3);
        assert!(prompt.contains("at most 3 questions"));
        assert!(!prompt.contains("at most 5"));
    }

    #[test]
    fn answer_prompt_contains_context_and_question() {
        let prompt = answer_prompt("A 43-inch QLED TV.", "How big is it?");
        assert!(prompt.contains("Product Information:\nA 43-inch QLED TV."));
        assert!(prompt.contains("User Question:\nHow big is it?"));
        assert!(prompt.ends_with("Please output only the answer text."));
    }
}
