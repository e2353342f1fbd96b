use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn blocks_pseudocode(project_json: &str) -> Result<String, JsValue> {
    execute_requests(project_json, r#"[{"api": "get_blocks_pseudocode"}]"#)
}

/// Runs a JSON array of requests against `project_json` and returns
/// `{"responses": [...], "project": {...}}`.
#[wasm_bindgen]
pub fn execute_requests(project_json: &str, requests_json: &str) -> Result<String, JsValue> {
    crate::execute_requests_json(project_json, requests_json)
        .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
