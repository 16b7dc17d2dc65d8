// All LLM prompt constants for the scoring pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, PLAIN_TEXT_SYSTEM};

/// System prompt for resume scoring: a recruiter persona with JSON-only output.
pub fn resume_score_system() -> String {
    format!("You are an experienced Technical Recruiter. {JSON_ONLY_SYSTEM}")
}

/// Resume scoring prompt. Each argument is inserted once, verbatim.
pub fn resume_score_prompt(file_name: &str, attachment_note: &str, jd_text: &str) -> String {
    format!(
        r#"Analyze the resume "{file_name}" against this Job Description.
{attachment_note}
JD: {jd_text}

Return a JSON object with this EXACT schema (no extra fields):
{{
  "candidateName": "Full name of the candidate",
  "currentRole": "Their current or most recent role title",
  "matchScore": 0,
  "analysis": "One sentence summary of how well the candidate fits"
}}

matchScore is a number from 0 to 100."#
    )
}

/// Note inserted when the resume content could not be attached.
pub const NO_ATTACHMENT_NOTE: &str =
    "The resume content is not available; judge from the file name only.";

/// Note inserted when the resume content is attached.
pub const ATTACHMENT_NOTE: &str = "The resume is attached.";

/// System prompt for job-description extraction.
pub const JD_EXTRACT_SYSTEM: &str = PLAIN_TEXT_SYSTEM;

/// Job-description extraction instruction.
pub const JD_EXTRACT_PROMPT: &str = "Extract the full Job Description. Format it strictly as follows:\n\
    1. Use '## ' for main headers (Responsibilities, Requirements, Preferred Qualifications).\n\
    2. Use bullet points '- ' for lists.\n\
    3. Return only the structured text with no extra commentary.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_prompt_keeps_braces_in_file_name() {
        let prompt = resume_score_prompt("{jd_text} {attachment_note}.pdf", ATTACHMENT_NOTE, "Rust SRE");
        assert!(prompt.contains(r#""{jd_text} {attachment_note}.pdf""#));
        assert_eq!(prompt.matches("Rust SRE").count(), 1);
        assert_eq!(prompt.matches(ATTACHMENT_NOTE).count(), 1);
    }

    #[test]
    fn test_resume_prompt_schema_is_literal_json() {
        let prompt = resume_score_prompt("cv.pdf", NO_ATTACHMENT_NOTE, "Role");
        assert!(prompt.contains("{\n  \"candidateName\""));
        assert!(prompt.contains("JD: Role\n"));
    }
}
