//! Model output cleanup

use serde_json::Value;

/// Remove markdown code-fence markers (```json and ```) and trim.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Strip fences and parse the remainder as JSON
pub fn parse_model_json(text: &str) -> serde_json::Result<Value> {
    serde_json::from_str(&strip_code_fences(text))
}
