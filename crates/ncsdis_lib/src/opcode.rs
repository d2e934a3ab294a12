use std::fmt;

use serde::{Deserialize, Serialize};

/// NWScript VM opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Opcode {
    CpDownSp,
    RsAdd,
    CpTopSp,
    Const,
    Action,
    LogAnd,
    LogOr,
    IncOr,
    ExcOr,
    BoolAnd,
    Eq,
    Neq,
    Geq,
    Gt,
    Lt,
    Leq,
    ShLeft,
    ShRight,
    UShRight,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Comp,
    MovSp,
    StoreStateAll,
    Jmp,
    Jsr,
    Jz,
    Retn,
    Destruct,
    Not,
    DecSp,
    IncSp,
    Jnz,
    CpDownBp,
    CpTopBp,
    DecBp,
    IncBp,
    SaveBp,
    RestoreBp,
    StoreState,
    Nop,
    WriteArray,
    ReadArray,
    GetRef,
    GetRefArray,
    ScriptSize,
}

impl Opcode {
    pub fn code(self) -> u8 {
        match self {
            Opcode::CpDownSp => 0x01,
            Opcode::RsAdd => 0x02,
            Opcode::CpTopSp => 0x03,
            Opcode::Const => 0x04,
            Opcode::Action => 0x05,
            Opcode::LogAnd => 0x06,
            Opcode::LogOr => 0x07,
            Opcode::IncOr => 0x08,
            Opcode::ExcOr => 0x09,
            Opcode::BoolAnd => 0x0A,
            Opcode::Eq => 0x0B,
            Opcode::Neq => 0x0C,
            Opcode::Geq => 0x0D,
            Opcode::Gt => 0x0E,
            Opcode::Lt => 0x0F,
            Opcode::Leq => 0x10,
            Opcode::ShLeft => 0x11,
            Opcode::ShRight => 0x12,
            Opcode::UShRight => 0x13,
            Opcode::Add => 0x14,
            Opcode::Sub => 0x15,
            Opcode::Mul => 0x16,
            Opcode::Div => 0x17,
            Opcode::Mod => 0x18,
            Opcode::Neg => 0x19,
            Opcode::Comp => 0x1A,
            Opcode::MovSp => 0x1B,
            Opcode::StoreStateAll => 0x1C,
            Opcode::Jmp => 0x1D,
            Opcode::Jsr => 0x1E,
            Opcode::Jz => 0x1F,
            Opcode::Retn => 0x20,
            Opcode::Destruct => 0x21,
            Opcode::Not => 0x22,
            Opcode::DecSp => 0x23,
            Opcode::IncSp => 0x24,
            Opcode::Jnz => 0x25,
            Opcode::CpDownBp => 0x26,
            Opcode::CpTopBp => 0x27,
            Opcode::DecBp => 0x28,
            Opcode::IncBp => 0x29,
            Opcode::SaveBp => 0x2A,
            Opcode::RestoreBp => 0x2B,
            Opcode::StoreState => 0x2C,
            Opcode::Nop => 0x2D,
            Opcode::WriteArray => 0x30,
            Opcode::ReadArray => 0x32,
            Opcode::GetRef => 0x37,
            Opcode::GetRefArray => 0x39,
            Opcode::ScriptSize => 0x42,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::CpDownSp => "CPDOWNSP",
            Opcode::RsAdd => "RSADD",
            Opcode::CpTopSp => "CPTOPSP",
            Opcode::Const => "CONST",
            Opcode::Action => "ACTION",
            Opcode::LogAnd => "LOGAND",
            Opcode::LogOr => "LOGOR",
            Opcode::IncOr => "INCOR",
            Opcode::ExcOr => "EXCOR",
            Opcode::BoolAnd => "BOOLAND",
            Opcode::Eq => "EQ",
            Opcode::Neq => "NEQ",
            Opcode::Geq => "GEQ",
            Opcode::Gt => "GT",
            Opcode::Lt => "LT",
            Opcode::Leq => "LEQ",
            Opcode::ShLeft => "SHLEFT",
            Opcode::ShRight => "SHRIGHT",
            Opcode::UShRight => "USHRIGHT",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Neg => "NEG",
            Opcode::Comp => "COMP",
            Opcode::MovSp => "MOVSP",
            Opcode::StoreStateAll => "STORESTATEALL",
            Opcode::Jmp => "JMP",
            Opcode::Jsr => "JSR",
            Opcode::Jz => "JZ",
            Opcode::Retn => "RETN",
            Opcode::Destruct => "DESTRUCT",
            Opcode::Not => "NOT",
            Opcode::DecSp => "DECSP",
            Opcode::IncSp => "INCSP",
            Opcode::Jnz => "JNZ",
            Opcode::CpDownBp => "CPDOWNBP",
            Opcode::CpTopBp => "CPTOPBP",
            Opcode::DecBp => "DECBP",
            Opcode::IncBp => "INCBP",
            Opcode::SaveBp => "SAVEBP",
            Opcode::RestoreBp => "RESTOREBP",
            Opcode::StoreState => "STORESTATE",
            Opcode::Nop => "NOP",
            Opcode::WriteArray => "WRITEARRAY",
            Opcode::ReadArray => "READARRAY",
            Opcode::GetRef => "GETREF",
            Opcode::GetRefArray => "GETREFARRAY",
            Opcode::ScriptSize => "SCRIPTSIZE",
        }
    }

    /// Opcodes whose operand is an address rather than plain data.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Jmp | Opcode::Jsr | Opcode::Jz | Opcode::Jnz | Opcode::StoreState | Opcode::StoreStateAll
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The operand type byte that follows every opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InstructionType {
    #[default]
    None,
    Direct,
    Int,
    Float,
    String,
    Object,
    Resource,
    EngineType(u8),
    IntInt,
    FloatFloat,
    ObjectObject,
    StringString,
    StructStruct,
    IntFloat,
    FloatInt,
    EngineTypeEngineType(u8),
    VectorVector,
    VectorFloat,
    FloatVector,
}

impl InstructionType {
    pub fn code(self) -> u8 {
        match self {
            InstructionType::None => 0x00,
            InstructionType::Direct => 0x01,
            InstructionType::Int => 0x03,
            InstructionType::Float => 0x04,
            InstructionType::String => 0x05,
            InstructionType::Object => 0x06,
            InstructionType::Resource => 0x60,
            InstructionType::EngineType(n) => 0x10 + (n & 0x0F),
            InstructionType::IntInt => 0x20,
            InstructionType::FloatFloat => 0x21,
            InstructionType::ObjectObject => 0x22,
            InstructionType::StringString => 0x23,
            InstructionType::StructStruct => 0x24,
            InstructionType::IntFloat => 0x25,
            InstructionType::FloatInt => 0x26,
            InstructionType::EngineTypeEngineType(n) => 0x30 + (n & 0x07),
            InstructionType::VectorVector => 0x3A,
            InstructionType::VectorFloat => 0x3B,
            InstructionType::FloatVector => 0x3C,
        }
    }

    /// Mnemonic suffix, e.g. `II` in `ADDII`.
    pub fn suffix(self) -> String {
        match self {
            InstructionType::None | InstructionType::Direct => String::new(),
            InstructionType::Int => "I".into(),
            InstructionType::Float => "F".into(),
            InstructionType::String => "S".into(),
            InstructionType::Object => "O".into(),
            InstructionType::Resource => "R".into(),
            InstructionType::EngineType(n) => format!("E{n}"),
            InstructionType::IntInt => "II".into(),
            InstructionType::FloatFloat => "FF".into(),
            InstructionType::ObjectObject => "OO".into(),
            InstructionType::StringString => "SS".into(),
            InstructionType::StructStruct => "TT".into(),
            InstructionType::IntFloat => "IF".into(),
            InstructionType::FloatInt => "FI".into(),
            InstructionType::EngineTypeEngineType(n) => format!("E{n}E{n}"),
            InstructionType::VectorVector => "VV".into(),
            InstructionType::VectorFloat => "VF".into(),
            InstructionType::FloatVector => "FV".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_names_follow_serialized_form() {
        for op in [Opcode::CpDownSp, Opcode::StoreStateAll, Opcode::UShRight, Opcode::GetRefArray] {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.name()));
        }
    }

    #[test]
    fn type_suffixes() {
        assert_eq!(InstructionType::IntInt.suffix(), "II");
        assert_eq!(InstructionType::EngineType(2).suffix(), "E2");
        assert_eq!(InstructionType::EngineTypeEngineType(1).suffix(), "E1E1");
        assert_eq!(InstructionType::Direct.suffix(), "");
        assert_eq!(InstructionType::EngineType(3).code(), 0x13);
    }
}
