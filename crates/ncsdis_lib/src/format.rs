//! Text forms of single instructions, variables and subroutines.
//!
//! Everything here is a pure function of its inputs and the [`Game`] tables
//! passed in; the renderers only ever go through these helpers to name things.

use byteorder::{BigEndian, ByteOrder};

use crate::game::Game;
use crate::graph::{
    AddressType, Analysis, BlockId, Instruction, StackAnalysisState, SubId, SubRoutine, SubRoutineType, Variable,
    VariableType,
};
use crate::opcode::{InstructionType, Opcode};

const OBJECT_SELF: i32 = 0;
const OBJECT_INVALID: i32 = 1;

pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}

pub fn format_bytes(instr: &Instruction) -> String {
    let mut out = format!("{:02X} {:02X}", instr.opcode.code(), instr.ins_type.code());
    for b in &instr.bytes {
        out.push_str(&format!(" {b:02X}"));
    }
    out
}

pub fn format_jump_destination(address: u32) -> String {
    format!("loc_{address:08X}")
}

pub fn generic_engine_type_name(index: usize) -> String {
    format!("E{index}")
}

pub fn variable_type_name(ty: VariableType, game: &Game) -> String {
    match ty {
        VariableType::Void => "void".into(),
        VariableType::Int => "int".into(),
        VariableType::Float => "float".into(),
        VariableType::String => "string".into(),
        VariableType::Object => "object".into(),
        VariableType::Any => "any".into(),
        VariableType::EngineType(n) => game
            .engine_type_name(n as usize)
            .map(str::to_string)
            .unwrap_or_else(|| generic_engine_type_name(n as usize)),
    }
}

pub fn format_variable_name(var: &Variable) -> String {
    format!("var_{}", var.id)
}

pub fn function_name(game: &Game, index: i32) -> String {
    usize::try_from(index)
        .ok()
        .and_then(|i| game.function_name(i))
        .map(str::to_string)
        .unwrap_or_else(|| format!("action_{index}"))
}

fn sub_routine_name(sub: &SubRoutine, address: u32) -> String {
    if let Some(name) = sub.name.as_deref().filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    match sub.kind {
        SubRoutineType::Start => "_start".into(),
        SubRoutineType::Global => "_global".into(),
        SubRoutineType::StoreState => format!("sta_{address:08X}"),
        SubRoutineType::None => format!("sub_{address:08X}"),
    }
}

/// Label for an instruction that is a jump or call destination.
pub fn format_jump_label_name(analysis: &Analysis, instr: &Instruction) -> Option<String> {
    match instr.address_type {
        AddressType::None => None,
        AddressType::JumpLabel => Some(format_jump_destination(instr.address)),
        AddressType::StoreState => Some(format!("sta_{:08X}", instr.address)),
        AddressType::SubRoutine => Some(match analysis.owning_sub_routine(instr) {
            Some(sub) => sub_routine_name(analysis.sub_routine(sub), instr.address),
            None => format!("sub_{:08X}", instr.address),
        }),
    }
}

pub fn block_label_name(analysis: &Analysis, block: BlockId) -> Option<String> {
    analysis.block_entry(block).and_then(|i| format_jump_label_name(analysis, i))
}

pub fn sub_routine_label_name(analysis: &Analysis, sub: SubId) -> Option<String> {
    analysis.sub_routine_entry(sub).and_then(|i| format_jump_label_name(analysis, i))
}

/// `<return type> <name>(<parameters>)`, optionally with parameter names.
pub fn format_signature(analysis: &Analysis, sub: SubId, game: &Game, with_names: bool) -> String {
    let s = analysis.sub_routine(sub);
    let name = sub_routine_label_name(analysis, sub).unwrap_or_else(|| sub_routine_name(s, s.address));

    let ret = match s.returns.first() {
        Some(&v) => variable_type_name(analysis.variable(v).ty, game),
        None => "void".into(),
    };

    let params: Vec<String> = s
        .params
        .iter()
        .map(|&p| {
            let var = analysis.variable(p);
            let ty = variable_type_name(var.ty, game);
            if with_names {
                format!("{ty} {}", format_variable_name(var))
            } else {
                ty
            }
        })
        .collect();

    format!("{ret} {name}({})", params.join(", "))
}

/// The signature of a subroutine whose stack analysis is complete.
///
/// The program entry, the global initializer and store-state closures have
/// no meaningful signature and yield `None`, as does any subroutine while the
/// stack analysis is missing or unfinished.
pub fn analyzed_signature(analysis: &Analysis, sub: SubId, game: &Game) -> Option<String> {
    if !analysis.has_stack_analysis {
        return None;
    }
    let s = analysis.sub_routine(sub);
    if matches!(s.kind, SubRoutineType::Start | SubRoutineType::Global | SubRoutineType::StoreState) {
        return None;
    }
    if s.stack_analysis != StackAnalysisState::Finished {
        return None;
    }
    Some(format_signature(analysis, sub, game, false))
}

fn format_float(v: f32) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Decodes the literal carried by a `CONST` instruction.
pub fn format_constant(instr: &Instruction) -> Option<String> {
    let b = &instr.bytes;
    match instr.ins_type {
        InstructionType::Int => Some(BigEndian::read_i32(b.get(..4)?).to_string()),
        InstructionType::Float => Some(format_float(BigEndian::read_f32(b.get(..4)?))),
        InstructionType::String | InstructionType::Resource => {
            let len = BigEndian::read_u16(b.get(..2)?) as usize;
            let s = String::from_utf8_lossy(b.get(2..2 + len)?);
            Some(format!("\"{}\"", quote_string(&s)))
        }
        InstructionType::Object => Some(match BigEndian::read_i32(b.get(..4)?) {
            OBJECT_SELF => "OBJECT_SELF".into(),
            OBJECT_INVALID => "OBJECT_INVALID".into(),
            v => format!("0x{v:08X}"),
        }),
        _ => None,
    }
}

fn join_args(args: &[i32]) -> String {
    args.iter().map(i32::to_string).collect::<Vec<_>>().join(" ")
}

fn format_operands(analysis: &Analysis, instr: &Instruction, game: &Game) -> String {
    if instr.opcode.is_branch() {
        let target = match instr.branches.first() {
            Some(&t) => {
                let t = analysis.instruction(t);
                format_jump_label_name(analysis, t).unwrap_or_else(|| format_jump_destination(t.address))
            }
            None => {
                let offset = instr.args.first().copied().unwrap_or(0);
                format_jump_destination(instr.address.wrapping_add_signed(offset))
            }
        };
        let rest = instr.args.get(1..).map(join_args).unwrap_or_default();
        return if rest.is_empty() { target } else { format!("{target} {rest}") };
    }

    match instr.opcode {
        Opcode::Const => format_constant(instr).unwrap_or_else(|| join_args(&instr.args)),
        Opcode::Action => {
            let index = instr.args.first().copied().unwrap_or(-1);
            let argc = instr.args.get(1).copied().unwrap_or(0);
            format!("{} {argc}", function_name(game, index))
        }
        _ => join_args(&instr.args),
    }
}

/// Mnemonic plus operands, e.g. `CPDOWNSP   -8 4`.
pub fn format_instruction(analysis: &Analysis, instr: &Instruction, game: &Game) -> String {
    let mnemonic = format!("{}{}", instr.opcode.name(), instr.ins_type.suffix());
    let operands = format_operands(analysis, instr, game);
    if operands.is_empty() {
        mnemonic
    } else {
        format!("{mnemonic:<10} {operands}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Block, InstrId};

    fn instr(address: u32, opcode: Opcode, ins_type: InstructionType, bytes: Vec<u8>, args: Vec<i32>) -> Instruction {
        Instruction {
            address,
            opcode,
            ins_type,
            bytes,
            args,
            variables: vec![],
            stack: vec![],
            branches: vec![],
            follower: None,
            block: None,
            address_type: AddressType::None,
        }
    }

    #[test]
    fn quotes_backslashes_and_quotes() {
        assert_eq!(quote_string(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }

    #[test]
    fn formats_constants() {
        let a = Analysis::default();
        let game = Game::unknown();

        let i = instr(0x20, Opcode::Const, InstructionType::Int, vec![0xFF, 0xFF, 0xFF, 0xFE], vec![-2]);
        assert_eq!(format_instruction(&a, &i, &game), "CONSTI     -2");
        assert_eq!(format_bytes(&i), "04 03 FF FF FF FE");

        let f = instr(0x26, Opcode::Const, InstructionType::Float, 2.0f32.to_be_bytes().to_vec(), vec![]);
        assert_eq!(format_constant(&f).as_deref(), Some("2.0"));

        let s = instr(0x2C, Opcode::Const, InstructionType::String, vec![0, 3, b'a', b'"', b'c'], vec![]);
        assert_eq!(format_constant(&s).as_deref(), Some(r#""a\"c""#));

        let o = instr(0x30, Opcode::Const, InstructionType::Object, vec![0, 0, 0, 0], vec![0]);
        assert_eq!(format_constant(&o).as_deref(), Some("OBJECT_SELF"));

        let short = instr(0x36, Opcode::Const, InstructionType::Int, vec![0, 1], vec![7]);
        assert_eq!(format_instruction(&a, &short, &game), "CONSTI     7");
    }

    #[test]
    fn formats_actions_with_game_names() {
        let a = Analysis::default();
        let game = Game { functions: vec!["Random".into(), "PrintString".into()], ..Game::unknown() };

        let i = instr(0x40, Opcode::Action, InstructionType::None, vec![0, 1, 1], vec![1, 1]);
        assert_eq!(format_instruction(&a, &i, &game), "ACTION     PrintString 1");

        let unknown = instr(0x40, Opcode::Action, InstructionType::None, vec![], vec![9, 0]);
        assert_eq!(format_instruction(&a, &unknown, &game), "ACTION     action_9 0");
    }

    #[test]
    fn jumps_use_target_labels() {
        let mut a = Analysis::default();
        let mut target = instr(0x30, Opcode::Retn, InstructionType::None, vec![], vec![]);
        target.address_type = AddressType::JumpLabel;
        let mut jmp = instr(0x10, Opcode::Jmp, InstructionType::None, vec![], vec![0x20]);
        jmp.branches = vec![InstrId(1)];
        a.instructions = vec![jmp.clone(), target];

        assert_eq!(format_instruction(&a, &jmp, &Game::unknown()), "JMP        loc_00000030");

        jmp.branches.clear();
        jmp.args = vec![-8];
        assert_eq!(format_instruction(&a, &jmp, &Game::unknown()), "JMP        loc_00000008");
    }

    #[test]
    fn engine_types_fall_back_to_generic_names() {
        let game = Game { engine_types: vec![Some("effect".into()), None], ..Game::unknown() };
        assert_eq!(variable_type_name(VariableType::EngineType(0), &game), "effect");
        assert_eq!(variable_type_name(VariableType::EngineType(1), &game), "E1");
    }

    #[test]
    fn signatures() {
        let mut a = Analysis::default();
        let mut entry = instr(0x0D, Opcode::RsAdd, InstructionType::Int, vec![], vec![]);
        entry.address_type = AddressType::SubRoutine;
        entry.block = Some(BlockId(0));
        a.instructions.push(entry);
        a.blocks.push(Block {
            address: 0x0D,
            instructions: vec![InstrId(0)],
            sub_routine: SubId(0),
            children: vec![],
            children_types: vec![],
            controls: vec![],
        });
        a.variables = vec![
            Variable { id: 1, ty: VariableType::Int, creator: None, siblings: Default::default() },
            Variable { id: 2, ty: VariableType::String, creator: None, siblings: Default::default() },
        ];
        a.sub_routines.push(SubRoutine {
            address: 0x0D,
            kind: SubRoutineType::None,
            name: None,
            blocks: vec![BlockId(0)],
            params: vec![crate::graph::VarId(1)],
            returns: vec![crate::graph::VarId(0)],
            return_sites: vec![],
            stack_analysis: StackAnalysisState::Finished,
        });

        let game = Game::unknown();
        assert_eq!(format_signature(&a, SubId(0), &game, false), "int sub_0000000D(string)");
        assert_eq!(format_signature(&a, SubId(0), &game, true), "int sub_0000000D(string var_2)");

        a.sub_routines[0].name = Some("main".into());
        a.sub_routines[0].returns.clear();
        assert_eq!(format_signature(&a, SubId(0), &game, false), "void main(string)");
    }
}
