// Cross-cutting prompt fragments. Feature modules keep their own prompts.rs
// next to the code that sends them.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Register used for every generated report section.
pub const ACADEMIC_REGISTER: &str = "\
    Write in a formal, written academic register suitable for a vocational or \
    applied-undergraduate training report. Be concrete and specific to the task; \
    do not invent measurements or results that the task description does not support.";
