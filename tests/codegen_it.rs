mod common;

use chrono::{TimeZone, Utc};
use serde_json::json;
use statecraft::codegen::{GenOptions, Target, generate, generate_for_tag};
use statecraft::error::CodeGenError;
use strum::IntoEnumIterator;

fn pinned() -> GenOptions {
    GenOptions::default().with_timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
}

#[test]
fn every_target_renders_the_traffic_light() {
    common::init_tracing();
    let model = common::traffic_light();
    for target in Target::iter() {
        let bundle = generate(&model, target, &pinned())
            .unwrap_or_else(|e| panic!("target {target} failed: {e}"));
        assert!(!bundle.is_empty(), "target {target} produced no artifacts");
        for artifact in bundle.iter() {
            assert!(!artifact.content.is_empty());
            assert_eq!(artifact.target, target);
        }
    }
}

#[test]
fn pinned_timestamp_makes_generation_byte_identical() {
    let model = common::traffic_light();
    let first = generate(&model, Target::CGeneric, &pinned()).unwrap();
    let second = generate(&model, Target::CGeneric, &pinned()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn c_generic_emits_switch_and_guards() {
    let model = common::traffic_light();
    let bundle = generate(&model, Target::CGeneric, &pinned()).unwrap();

    let header = bundle.get("traffic_light.h").expect("header artifact");
    assert!(header.content.contains("typedef enum"));
    assert!(header.content.contains("STATE_RED"));
    assert!(header.content.contains("EVENT_TICK"));
    assert!(header.content.contains("#ifndef FSM_TRAFFIC_LIGHT_H"));

    let source = bundle.get("traffic_light.c").expect("source artifact");
    assert!(source.content.contains("switch (s_state)"));
    assert!(source.content.contains("event == EVENT_TICK && (timer >= 5)"));
    assert!(source.content.contains("static int timer = 0;"));
    // The entered state settles with its during action, like the simulator.
    assert!(source.content.contains("Green_during();"));
}

#[test]
fn state_table_variant_uses_function_pointers() {
    let model = common::traffic_light();
    let bundle = generate(&model, Target::CStateTable, &pinned()).unwrap();
    let source = bundle.get("traffic_light.c").unwrap();
    assert!(source.content.contains("k_transitions"));
    assert!(source.content.contains("k_state_ops"));
    assert!(source.content.contains("t0_guard"));
}

#[test]
fn arduino_sketch_has_setup_and_loop() {
    let model = common::traffic_light();
    let bundle = generate(&model, Target::Arduino, &pinned()).unwrap();
    let sketch = bundle.get("traffic_light.ino").unwrap();
    assert!(sketch.content.contains("void setup()"));
    assert!(sketch.content.contains("void loop()"));
    assert!(bundle.get("traffic_light.h").is_some());
}

#[test]
fn python_class_dispatches_by_state_name() {
    let model = common::traffic_light();
    let bundle = generate(&model, Target::Python, &pinned()).unwrap();
    let module = bundle.get("traffic_light.py").unwrap();
    assert!(module.content.contains("class Traffic_light:"));
    assert!(module.content.contains("match self.state:"));
    assert!(module.content.contains("case \"Red\":"));
    assert!(
        module
            .content
            .contains("event == \"tick\" and ((self.timer >= 5))")
    );
    assert!(module.content.contains("self.timer = (self.timer + 1)"));
}

#[test]
fn vhdl_uses_two_processes_and_sized_state_vector() {
    let model = common::traffic_light();
    let bundle = generate(&model, Target::Vhdl, &pinned()).unwrap();
    let vhd = bundle.get("traffic_light.vhd").unwrap();
    assert!(vhd.content.contains("entity traffic_light is"));
    assert!(vhd.content.contains("sync_proc"));
    assert!(vhd.content.contains("comb_proc"));
    // Three states need two bits.
    assert!(vhd.content.contains("STD_LOGIC_VECTOR(1 downto 0)"));
    assert!(vhd.content.contains("rising_edge(clk)"));
}

#[test]
fn verilog_uses_the_clocked_always_block() {
    let model = common::traffic_light();
    let bundle = generate(&model, Target::Verilog, &pinned()).unwrap();
    let v = bundle.get("traffic_light.v").unwrap();
    assert!(v.content.contains("module traffic_light"));
    assert!(v.content.contains("always @(posedge clk or negedge rst_n)"));
    assert!(v.content.contains("localparam STATE_RED"));
    assert!(v.content.contains("[1:0] state"));
}

#[test]
fn diagram_targets_emit_their_dialects() {
    let model = common::traffic_light();

    let puml = generate(&model, Target::PlantUml, &pinned()).unwrap();
    let puml = puml.get("traffic_light.puml").unwrap();
    assert!(puml.content.starts_with("@startuml"));
    assert!(puml.content.trim_end().ends_with("@enduml"));
    assert!(puml.content.contains("[*] --> Red"));
    assert!(puml.content.contains("Red --> Green : tick [timer >= 5]"));
    assert!(puml.content.contains("note \"Cycles forever.\""));

    let mmd = generate(&model, Target::Mermaid, &pinned()).unwrap();
    let mmd = mmd.get("traffic_light.mmd").unwrap();
    assert!(mmd.content.contains("stateDiagram-v2"));
    assert!(mmd.content.contains("[*] --> Red"));
    assert!(mmd.content.contains("%% Cycles forever."));
}

#[test]
fn testbench_option_adds_a_driver() {
    let model = common::traffic_light();
    let bundle = generate(&model, Target::CGeneric, &pinned().with_testbench()).unwrap();
    let tb = bundle.get("traffic_light_testbench.c").expect("testbench");
    assert!(tb.content.contains("int main(void)"));
    assert!(tb.content.contains("EVENT_TICK"));
    assert_eq!(bundle.len(), 3);
}

#[test]
fn nested_machines_become_their_own_c_modules() {
    let model = common::load_json(&json!({
        "name": "outer",
        "states": [
            {
                "name": "Super",
                "is_initial": true,
                "is_superstate": true,
                "sub_fsm_data": {
                    "name": "inner",
                    "states": [
                        {"name": "X", "is_initial": true},
                        {"name": "Y", "is_final": true}
                    ],
                    "transitions": [{"source": "X", "target": "Y", "event": "fin"}],
                    "comments": []
                }
            },
            {"name": "Done", "is_final": true}
        ],
        "transitions": [{"source": "Super", "target": "Done", "event": "stop"}],
        "comments": []
    }));
    let bundle = generate(&model, Target::CGeneric, &pinned()).unwrap();
    assert!(bundle.get("outer.h").is_some());
    assert!(bundle.get("outer.c").is_some());
    assert!(bundle.get("outer_Super.h").is_some());
    assert!(bundle.get("outer_Super.c").is_some());
}

#[test]
fn hostile_names_are_sanitized_without_collisions() {
    let model = common::load_json(&json!({
        "name": "2 bad name!",
        "states": [
            {"name": "go left", "is_initial": true},
            {"name": "go-left", "is_final": true},
            {"name": "while", "is_final": true}
        ],
        "transitions": [
            {"source": "go left", "target": "go-left", "event": "e1"},
            {"source": "go left", "target": "while", "event": "e2"}
        ],
        "comments": []
    }));
    let bundle = generate(&model, Target::CGeneric, &pinned()).unwrap();
    let header = bundle.get("fsm_2_bad_name_.h").expect("sanitized file name");
    assert!(header.content.contains("STATE_GO_LEFT"));
    assert!(header.content.contains("STATE_GO_LEFT_1"));
    assert!(header.content.contains("STATE_WHILE"));

    let source = bundle.get("fsm_2_bad_name_.c").unwrap();
    assert!(source.content.contains("s_state = STATE_GO_LEFT_1;"));
}

#[test]
fn codegen_failures_precede_artifacts() {
    let empty = common::load_json(&json!({
        "name": "empty",
        "states": [],
        "transitions": [],
        "comments": []
    }));
    assert!(matches!(
        generate(&empty, Target::Python, &GenOptions::default()),
        Err(CodeGenError::EmptyModel)
    ));

    let no_initial = common::load_json(&json!({
        "name": "adrift",
        "states": [{"name": "A"}],
        "transitions": [],
        "comments": []
    }));
    assert!(matches!(
        generate(&no_initial, Target::Vhdl, &GenOptions::default()),
        Err(CodeGenError::NoInitialState)
    ));

    assert!(matches!(
        generate_for_tag(&no_initial, "brainfuck", &GenOptions::default()),
        Err(CodeGenError::UnsupportedTarget(_))
    ));
}
