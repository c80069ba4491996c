use blockview::config::{Config, parse_config};
use blockview::ir::{Diagram, DiagramIndex};
use blockview::layout::compute_view;
use blockview::layout_dump::LayoutDump;
use blockview::state::ViewState;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewRequest {
    #[serde(default)]
    state: ViewState,
    /// JSON5 config overrides.
    config: Option<String>,
    /// Return the raw layout instead of the flattened dump.
    raw: Option<bool>,
}

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn layout_json(model_json: &str, request: ViewRequest) -> Result<String, String> {
    let diagram = Diagram::from_json(model_json).map_err(|e| e.to_string())?;
    let config = match request.config.as_deref() {
        Some(raw) => parse_config(raw).map_err(|e| format!("{e:#}"))?,
        None => Config::default(),
    };
    let index = DiagramIndex::new(&diagram.nodes);
    let layout = compute_view(&diagram, &index, &request.state, &config.layout);
    let out = if request.raw.unwrap_or(false) {
        serde_json::to_string(&layout)
    } else {
        serde_json::to_string(&LayoutDump::from_view(&layout, &diagram, &index, &request.state))
    };
    out.map_err(|e| e.to_string())
}

/// Lay out `model_json` for the view described by `request_json`
/// (`{ state, config, raw }`, all optional) and return JSON.
#[wasm_bindgen]
pub fn compute_view_json(model_json: &str, request_json: Option<String>) -> Result<String, JsValue> {
    let request = match request_json {
        Some(raw) => serde_json::from_str::<ViewRequest>(&raw).map_err(to_js)?,
        None => ViewRequest::default(),
    };
    layout_json(model_json, request).map_err(to_js)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"{
        "nodes": [
            { "id": "x", "name": "X", "children": [ { "id": "a", "name": "A" } ] },
            { "id": "y", "name": "Y" }
        ],
        "edges": [ { "id": "INT-1", "sourceNodeId": "a", "targetNodeId": "y", "name": "Data" } ]
    }"#;

    #[test]
    fn lays_out_expanded_model() {
        let request: ViewRequest =
            serde_json::from_str(r#"{ "state": { "expanded": ["x"] } }"#).expect("request parses");
        let json = layout_json(MODEL, request).expect("layout succeeds");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
        assert_eq!(value["nodes"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["edges"][0]["id"], "INT-1");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let model = r#"{ "nodes": [ { "id": "x", "name": "X" }, { "id": "x", "name": "Again" } ] }"#;
        let err = layout_json(model, ViewRequest::default()).expect_err("duplicate id");
        assert!(err.contains("duplicate node id"));
    }
}
