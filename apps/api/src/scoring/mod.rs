// Resume scoring pipeline.
// Intake -> job description resolution -> sequential per-file scoring -> projection.
// All LLM calls go through llm_client via the AnalysisOracle boundary.

pub mod batch;
pub mod encoder;
pub mod handlers;
pub mod intake;
pub mod jd_format;
pub mod oracle;
pub mod orchestrator;
pub mod projection;
pub mod prompts;
pub mod resolver;

#[cfg(test)]
pub mod testing;
