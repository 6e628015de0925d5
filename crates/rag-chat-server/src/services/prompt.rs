//! Prompt text and assembly for grounded answers.
//!
//! Policy sections always come before any dynamic content (summary,
//! retrieved context, question).

pub const INITIAL_MESSAGE: &str = "Hi there! I'm AStarBot. I'm Avrodeep's AI assistant, here to chat in his stead \
while he's offline. Whether you want to dive into his projects, check his \
skills, or just hear about his daily life, I've got the answers. \
How about we start with a quick intro?";

pub const SYSTEM_PROMPT: &str = "You are AStarBot, a professional, calm, and approachable AI assistant
representing a computer science postgraduate student.

Your role is to help users understand the student's:
- education and academic background
- projects and technical work
- skills, tools, and interests
- approach to learning and problem-solving

You are informative, precise, and honest.
You never exaggerate, speculate, or invent information.";

pub const RAG_RULES: &str = "Answering Rules:
- Use ONLY the information provided in the context below.
- Do NOT use outside knowledge or assumptions.
- If the context does not contain the answer, say so clearly.
- Never guess or fabricate details.";

pub const REFUSAL_RULES: &str = "If the user asks about:
- private or personal life details
- sensitive or inappropriate topics
- information not present in the context
- topics unrelated to education, projects, skills, or interests

Then:
- Politely decline to answer
- Briefly explain the limitation
- Redirect to a related, allowed topic";

pub const STYLE_GUIDELINES: &str = "Tone & Style:
- Match the conversation tone implied by the summary:
  - professional: composed and formal
  - casual: warm and friendly
- Default to professional but approachable if unsure
- Be clear, focused, and natural, never robotic
- Avoid over-promotion or unnecessary repetition
- Prefer clarity over verbosity";

pub const LENGTH_GUIDELINES: &str = "Response Length:
- Concise answers: under 30 words
- Detailed answers: 40-50 words
- Do not exceed what is necessary to answer well";

pub const FALLBACK_MESSAGE: &str = "I don't have verified information on that topic right now. \
If you'd like, I can help with education, projects, skills or technical interests instead.";

pub const NO_CONTEXT_PLACEHOLDER: &str = "No relevant context was retrieved.";

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// Builder with the configured persona, or the built-in one.
    pub fn with_override(system_prompt: Option<&str>) -> Self {
        match system_prompt.map(str::trim).filter(|s| !s.is_empty()) {
            Some(custom) => Self::new(custom),
            None => Self::default(),
        }
    }

    pub fn build<S: AsRef<str>>(
        &self,
        contexts: &[S],
        summary: Option<&str>,
        question: &str,
    ) -> String {
        let context_text = if contexts.is_empty() {
            NO_CONTEXT_PLACEHOLDER.to_string()
        } else {
            contexts
                .iter()
                .map(|c| c.as_ref())
                .collect::<Vec<&str>>()
                .join("\n\n")
        };

        let summary_text = match summary.map(str::trim).filter(|s| !s.is_empty()) {
            Some(summary) => format!("Conversation Summary:\n{}\n\n", summary),
            None => String::new(),
        };

        format!(
            "{}\n\n{}\n\n{}\n\n{}\n\n{}\n\n{}Context:\n{}\n\nUser Question:\n{}\n\nAnswer:",
            self.system_prompt.trim(),
            RAG_RULES,
            REFUSAL_RULES,
            STYLE_GUIDELINES,
            LENGTH_GUIDELINES,
            summary_text,
            context_text,
            question,
        )
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(SYSTEM_PROMPT)
    }
}
