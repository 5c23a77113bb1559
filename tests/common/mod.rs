use std::sync::Arc;

use statecraft::model::FsmModel;

/// The traffic-light fixture: three states cycling on `tick`, one counter
/// variable driven by entry/during actions.
pub const TRAFFIC_LIGHT: &str = r#"{
    "name": "traffic_light",
    "states": [
        {
            "name": "Red",
            "is_initial": true,
            "entry_action": "timer = 0",
            "during_action": "timer = timer + 1",
            "action_language": "Python (Generic Simulation)"
        },
        {
            "name": "Green",
            "entry_action": "timer = 0",
            "during_action": "timer = timer + 1",
            "action_language": "Python (Generic Simulation)"
        },
        {
            "name": "Yellow",
            "entry_action": "timer = 0",
            "during_action": "timer = timer + 1",
            "action_language": "Python (Generic Simulation)"
        }
    ],
    "transitions": [
        {"source": "Red", "target": "Green", "event": "tick", "condition": "timer >= 5"},
        {"source": "Green", "target": "Yellow", "event": "tick", "condition": "timer >= 3"},
        {"source": "Yellow", "target": "Red", "event": "tick", "condition": "timer >= 1"}
    ],
    "comments": [{"text": "Cycles forever.", "x": 10.0, "y": 10.0}],
    "data_dictionary": {
        "timer": {"type": "int", "initial_value": 0}
    }
}"#;

#[allow(dead_code)]
pub fn traffic_light() -> Arc<FsmModel> {
    Arc::new(statecraft::load(TRAFFIC_LIGHT.as_bytes()).expect("fixture must load"))
}

#[allow(dead_code)]
pub fn load_json(json: &serde_json::Value) -> FsmModel {
    statecraft::load(json.to_string().as_bytes()).expect("fixture must load")
}

/// Installs a test subscriber once; later calls are no-ops.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
