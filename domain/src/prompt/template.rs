//! Prompt templates for the council flow

use crate::persona::{JudgePersona, Persona};
use crate::session::entities::Message;

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for a worker: its persona instruction, plus background
    /// from a previous discussion when this is a follow-up turn.
    pub fn worker_system(persona: &Persona, background: Option<&str>) -> String {
        match background {
            Some(context) => format!(
                "{}\n\n{}",
                persona.instruction,
                Self::background_block(context)
            ),
            None => persona.instruction.clone(),
        }
    }

    /// Feedback message asking a worker to refine its prior answer
    pub fn worker_feedback(critique: &str) -> String {
        format!(
            "CRITICAL FEEDBACK FROM JUDGE:\n{}\n\nPlease refine your answer based on this feedback.",
            critique
        )
    }

    /// User-side messages for a worker call: the query, then the judge's
    /// feedback when one is carried over from the previous round.
    pub fn worker_messages(query: &str, critique: Option<&str>) -> Vec<Message> {
        let mut messages = vec![Message::user(query)];
        if let Some(critique) = critique.filter(|c| !c.trim().is_empty()) {
            messages.push(Message::user(Self::worker_feedback(critique)));
        }
        messages
    }

    /// System prompt for the judge
    pub fn judge_system(judge: &JudgePersona) -> String {
        judge.instruction.clone()
    }

    /// Judge prompt carrying the query, every labeled draft, and background
    pub fn judge_prompt(query: &str, drafts: &[(String, String)], background: Option<&str>) -> String {
        let mut prompt = format!(
            "You have received {} drafts answering the user's query: \"{}\".\n",
            drafts.len(),
            query
        );

        if let Some(context) = background {
            prompt.push('\n');
            prompt.push_str(&Self::background_block(context));
            prompt.push('\n');
        }

        prompt.push_str("\nDrafts:\n");
        for (label, content) in drafts {
            prompt.push_str(&format!("\n--- {} ---\n{}\n", label, content));
        }

        prompt.push_str(
            r#"
Your goal is to reach consensus.
1. Synthesize the best parts of all drafts into a coherent summary.
2. Provide specific critique on what is missing or conflicting.
3. Rate the current quality (0-100).

Return ONLY valid JSON in this format:
{
  "synthesis": "The summary of the best points...",
  "critique": "Instructions for the workers on how to improve...",
  "score": 85,
  "stop": false
}

Set stop to true if the score is above 90."#,
        );

        prompt
    }

    fn background_block(context: &str) -> String {
        format!(
            "BACKGROUND FROM THE PREVIOUS DISCUSSION (this is prior background: extend it rather than repeat it):\n{}",
            context
        )
    }
}
