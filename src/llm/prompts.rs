//! Prompt text and the structured-output schema for question generation.

use std::fmt::Write as _;

use serde_json::json;

/// System prompt for HyDE search-query generation.
pub const HYDE_SYSTEM_PROMPT: &str = "\
You are an expert at searching technical IT documentation.
Given a topic, you produce a query optimized for semantic search.

Rules:
1. Write only sentences that clearly explain the core concepts of the topic.
2. The topic matters most, so describe the topic itself first.
3. Reflect the angles commonly probed in technical interviews.
4. Write in English.
5. Stay under 100 words.";

/// System prompt for question generation.
pub const GENERATION_SYSTEM_PROMPT: &str = "\
You are an experienced technical interviewer writing quiz questions for
engineering candidates. You only ask about material that is explicitly
present in the source excerpts you are given, and you never reveal that the
questions come from retrieved documents.";

/// System prompt for explanation postprocessing.
pub const POSTPROCESS_SYSTEM_PROMPT: &str = r#"You are an editor for technical interview question explanations.

Revise the explanation according to these rules:

1. Remove internal references: delete any phrasing that hints at a data
   source, such as "chunk", "document", "ID", or "according to the source".
2. Fix awkward mixed-language fragments so the text reads naturally.
3. Preserve the technical content and meaning exactly.
4. Write as if an interviewer were explaining the answer directly.

Respond strictly as JSON:
{"cleaned_explanation": "the revised explanation"}"#;

/// User prompt for HyDE query generation.
#[must_use]
pub fn build_hyde_prompt(category_name: &str, category_path: &str) -> String {
    format!("Topic: {category_name}\nCategory Path: {category_path}")
}

/// User prompt for question generation: category context, the tagged
/// chunks, and the rules block.
#[must_use]
pub fn build_generation_prompt(
    category_name: &str,
    category_path: &str,
    chunks: &[(i64, &str)],
    target_count: usize,
) -> String {
    let chunk_id_list = chunks
        .iter()
        .map(|(id, _)| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut chunks_text = String::new();
    for (id, content) in chunks {
        let _ = write!(chunks_text, "[chunk id: {id}]\n{content}\n\n");
    }

    format!(
        r"## Question generation request

### Category
- name: {category_name}
- path: {category_path}

### Available chunk ids
{chunk_id_list}

### Source excerpts
{chunks_text}
---

## Requirements

### Count and mix
- Target: {target_count} questions (get as close to {target_count} as you can)
- At least 5, at most 10
- Approximate type mix: multiple_choice 40%, short_answer 30%, essay 30%
- Approximate difficulty mix: level 1 (basic) 50%, level 2 (intermediate) 30%, level 3 (advanced) 20%

### Maximizing yield
- After writing a question, check whether the same concept supports another
  question of a different type or difficulty, and write that one too.

### Mandatory rules
1. Ground every question in the excerpts above only. Never use outside
   knowledge; questions based on outside knowledge are invalid.
2. chunk_ids must contain only ids from the list above ({chunk_id_list}).
   Record every chunk a question draws on.
3. Only ask about content related to the category ({category_name}); ignore
   unrelated excerpt material.
4. Never repeat an identical question text. Re-asking the same concept at a
   different type or difficulty is encouraged.
5. For multiple_choice, the answer field must be exactly equal to
   options[correct_index].
6. Never mention chunks, documents, ids, or sources in the question, answer,
   or explanation text."
    )
}

/// JSON schema for the structured generation reply.
#[must_use]
pub fn question_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "question_type": {
                            "type": "string",
                            "enum": ["multiple_choice", "short_answer", "essay"],
                        },
                        "difficulty": {
                            "type": "integer",
                            "enum": [1, 2, 3],
                        },
                        "question": { "type": "string" },
                        "answer": { "type": "string" },
                        "explanation": { "type": "string" },
                        "options": {
                            "type": "array",
                            "items": { "type": "string" },
                        },
                        "correct_index": { "type": "integer" },
                        "chunk_ids": {
                            "type": "array",
                            "items": { "type": "integer" },
                        },
                    },
                    "required": [
                        "question_type",
                        "difficulty",
                        "question",
                        "answer",
                        "explanation",
                        "chunk_ids",
                    ],
                },
                "minItems": 5,
                "maxItems": 10,
            }
        },
        "required": ["questions"],
    })
}
