// Prompt constants for the batch assessment pipeline.
// The instruction text and system prompt are counted into every batch's
// fixed overhead, so changes here shift batch sizing.

/// Role preamble; `JSON_ONLY_SYSTEM` is appended at build time.
pub const ASSESSMENT_SYSTEM_ROLE: &str = "You are an expert technical recruiter and career coach. \
    You compare job postings against a candidate's resume and produce honest, \
    structured fit assessments.";

/// Instruction header. Replace `{resume_text}` and `{jobs_text}` before sending.
pub const ASSESSMENT_PROMPT_TEMPLATE: &str = r#"Assess how well the candidate's resume fits EACH job posting below.

Return a JSON object with this EXACT schema (no extra fields):
{
  "results": [
    {
      "title": "Senior Rust Engineer",
      "company": "Acme",
      "description": "One-sentence summary of the role",
      "location": "London, UK",
      "match_score": 78,
      "key_matches": ["Rust", "distributed systems"],
      "missing_qualifications": ["Kafka"],
      "resume_suggestions": ["Quantify the latency work at your last role"],
      "application_priority": "High",
      "reason": "Short justification for the score",
      "job_url": "copy the URL field of the posting EXACTLY"
    }
  ]
}

HARD RULES:
1. Produce exactly ONE result per job posting, in the same order as the postings
2. `job_url` MUST be copied verbatim from the posting's URL line — it identifies the posting
3. `match_score` is an integer from 0 to 100
4. `application_priority` is one of "High", "Medium", "Low"
5. Base every judgement ONLY on the resume and the posting text — do not invent experience

CANDIDATE RESUME:
{resume_text}

JOB POSTINGS:
{jobs_text}"#;

/// Separator placed between rendered postings.
pub const JOB_SEPARATOR: &str = "\n---\n";
