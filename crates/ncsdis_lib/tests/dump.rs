mod common;

use common::{GraphBuilder, render_with};
use ncsdis_lib::graph::{ControlStructure, ControlType, SubRoutineType, VariableType};
use ncsdis_lib::{
    AnalysisEngine, Disassembler, Game, GameId, InstructionType, NcsError, Opcode, OutputFormat, RenderOptions,
    ScriptDump, StaticAnalysis, render_dump,
};
use pretty_assertions::assert_eq;

fn sample() -> ScriptDump {
    let mut g = GraphBuilder::new().size(8);
    let sub = g.sub(0x0D, SubRoutineType::Start);
    let b0 = g.block(sub, 0x0D);
    let v = g.var(1, VariableType::EngineType(2));
    let rsadd = g.instr(b0, 0x0D, Opcode::RsAdd, InstructionType::EngineType(2), &[], &[], &[v]);
    let retn = g.instr(b0, 0x0F, Opcode::Retn, InstructionType::None, &[], &[], &[]);
    g.created_by(v, rsadd);
    g.instr_mut(retn).stack = vec![v];
    g.control(b0, ControlStructure { kind: ControlType::Return, retn: Some(b0), ..Default::default() });

    ScriptDump {
        game: Game {
            id: GameId::Nwn,
            engine_types: vec![Some("effect".into()), Some("event".into()), Some("location".into())],
            functions: vec![],
        },
        analysis: g.build(),
    }
}

#[test]
fn rendering_a_dump_matches_direct_rendering() {
    let dump = sample();
    let json = serde_json::to_string(&dump).unwrap();

    for format in [OutputFormat::Listing, OutputFormat::Assembly, OutputFormat::Dot, OutputFormat::Nss] {
        let options = RenderOptions { format, print_stack: true, print_control_types: true };
        let direct = render_with(dump.analysis.clone(), dump.game.clone(), |d, out| d.render(out, options));
        assert_eq!(render_dump(&json, options).unwrap(), direct, "{format:?}");
    }
}

#[test]
fn engine_types_use_game_names() {
    let json = serde_json::to_string(&sample()).unwrap();

    let asm = render_dump(&json, RenderOptions { format: OutputFormat::Assembly, print_stack: true, ..Default::default() })
        .unwrap();
    assert!(asm.contains("  RSADDE2\n"));
    assert!(asm.contains("; |    0 -      1: location (0000000D)\n"));

    let nss = render_dump(&json, RenderOptions { format: OutputFormat::Nss, ..Default::default() }).unwrap();
    assert!(nss.contains("\tlocation var_1 = 0;\n"));
}

#[test]
fn minimal_dump_uses_defaults() {
    let json = r#"{
        "analysis": {
            "size": 2,
            "instructions": [
                { "address": 13, "opcode": "RETN", "block": 0, "address_type": "SubRoutine" }
            ],
            "blocks": [ { "address": 13, "instructions": [0], "sub_routine": 0 } ],
            "sub_routines": [ { "address": 13, "kind": "Start", "blocks": [0] } ]
        }
    }"#;

    let engine = StaticAnalysis::from_json(json).unwrap();
    assert_eq!(engine.game().id, GameId::Unknown);
    assert!(!engine.analysis().has_stack_analysis);

    let text = render_dump(json, RenderOptions::default()).unwrap();
    assert_eq!(
        text,
        "; 2 bytes, 1 instructions\n\n_start:\n  0000000D 20 00                      RETN\n  -------- -------------------------- ---\n"
    );
}

#[test]
fn dangling_references_are_rejected() {
    let mut dump = sample();
    dump.analysis.instructions[0].branches.push(ncsdis_lib::graph::InstrId(40));

    let dis = Disassembler::new(StaticAnalysis::new(dump.analysis, dump.game));
    let err = dis.create_dot(&mut Vec::<u8>::new(), false).unwrap_err();
    assert!(matches!(err, NcsError::DanglingReference { kind: "instruction", index: 40 }));
}

#[test]
fn malformed_json_is_reported() {
    assert!(matches!(StaticAnalysis::from_json("{ \"analysis\": 3 }"), Err(NcsError::Json(_))));
}
