//! The analyzed script graph.
//!
//! Everything here is produced by the analysis engine. Entities live in flat
//! arenas inside [`Analysis`] and refer to each other through typed indices,
//! so a graph loaded from a dump can be checked once with
//! [`Analysis::validate`] and then walked without further bounds checks.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::NcsError;
use crate::opcode::{InstructionType, Opcode};

macro_rules! arena_id {
    ($name:ident, $what:literal) => {
        #[doc = concat!("Index of a", $what, " inside [`Analysis`].")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub usize);
    };
}

arena_id!(InstrId, "n instruction");
arena_id!(BlockId, " block");
arena_id!(SubId, " subroutine");
arena_id!(VarId, " variable");

/// Stack slots, bottom first. The position of an entry is its slot index.
pub type Stack = Vec<VarId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddressType {
    #[default]
    None,
    JumpLabel,
    SubRoutine,
    StoreState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub address: u32,
    pub opcode: Opcode,
    #[serde(default)]
    pub ins_type: InstructionType,
    /// Raw operand bytes following the opcode and type bytes.
    #[serde(default)]
    pub bytes: Vec<u8>,
    #[serde(default)]
    pub args: Vec<i32>,
    #[serde(default)]
    pub variables: Vec<VarId>,
    #[serde(default)]
    pub stack: Stack,
    #[serde(default)]
    pub branches: Vec<InstrId>,
    #[serde(default)]
    pub follower: Option<InstrId>,
    #[serde(default)]
    pub block: Option<BlockId>,
    #[serde(default)]
    pub address_type: AddressType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Void,
    Int,
    Float,
    String,
    Object,
    EngineType(u8),
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub id: u32,
    pub ty: VariableType,
    #[serde(default)]
    pub creator: Option<InstrId>,
    /// Other producers merged into the same slot at a join point.
    #[serde(default)]
    pub siblings: BTreeSet<VarId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeType {
    Unconditional,
    ConditionalTrue,
    ConditionalFalse,
    SubRoutineCall,
    SubRoutineTail,
    SubRoutineStore,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlType {
    #[default]
    None,
    DoWhileHead,
    DoWhileTail,
    DoWhileNext,
    WhileHead,
    WhileTail,
    WhileNext,
    Break,
    Continue,
    Return,
    IfCond,
    IfTrue,
    IfElse,
    IfNext,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlStructure {
    pub kind: ControlType,
    pub if_cond: Option<BlockId>,
    pub if_true: Option<BlockId>,
    pub if_else: Option<BlockId>,
    pub if_next: Option<BlockId>,
    pub loop_head: Option<BlockId>,
    pub loop_tail: Option<BlockId>,
    pub loop_next: Option<BlockId>,
    pub loop_break: Option<BlockId>,
    pub loop_continue: Option<BlockId>,
    pub retn: Option<BlockId>,
}

impl ControlStructure {
    fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        [
            self.if_cond,
            self.if_true,
            self.if_else,
            self.if_next,
            self.loop_head,
            self.loop_tail,
            self.loop_next,
            self.loop_break,
            self.loop_continue,
            self.retn,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub address: u32,
    pub instructions: Vec<InstrId>,
    pub sub_routine: SubId,
    #[serde(default)]
    pub children: Vec<BlockId>,
    #[serde(default)]
    pub children_types: Vec<EdgeType>,
    #[serde(default)]
    pub controls: Vec<ControlStructure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubRoutineType {
    #[default]
    None,
    Start,
    Global,
    StoreState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StackAnalysisState {
    #[default]
    Unstarted,
    InProgress,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubRoutine {
    pub address: u32,
    #[serde(default)]
    pub kind: SubRoutineType,
    #[serde(default)]
    pub name: Option<String>,
    /// Entry block first.
    pub blocks: Vec<BlockId>,
    #[serde(default)]
    pub params: Vec<VarId>,
    #[serde(default)]
    pub returns: Vec<VarId>,
    #[serde(default)]
    pub return_sites: Vec<InstrId>,
    #[serde(default)]
    pub stack_analysis: StackAnalysisState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Analysis {
    pub size: usize,
    /// All instructions, in address order.
    pub instructions: Vec<Instruction>,
    pub blocks: Vec<Block>,
    pub sub_routines: Vec<SubRoutine>,
    pub variables: Vec<Variable>,
    pub globals: Stack,
    pub has_stack_analysis: bool,
    pub has_control_flow: bool,
}

impl Analysis {
    pub fn instruction(&self, id: InstrId) -> &Instruction {
        &self.instructions[id.0]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn sub_routine(&self, id: SubId) -> &SubRoutine {
        &self.sub_routines[id.0]
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn block_entry(&self, id: BlockId) -> Option<&Instruction> {
        self.block(id).instructions.first().map(|&i| self.instruction(i))
    }

    pub fn sub_routine_entry(&self, id: SubId) -> Option<&Instruction> {
        self.sub_routine(id).blocks.first().and_then(|&b| self.block_entry(b))
    }

    pub fn owning_sub_routine(&self, instr: &Instruction) -> Option<SubId> {
        instr.block.map(|b| self.block(b).sub_routine)
    }

    /// Checks every cross reference and the structural invariants the
    /// renderers rely on.
    pub fn validate(&self) -> Result<(), NcsError> {
        let instrs = self.instructions.len();
        let blocks = self.blocks.len();
        let subs = self.sub_routines.len();
        let vars = self.variables.len();

        let check = |kind: &'static str, index: usize, len: usize| {
            if index < len {
                Ok(())
            } else {
                Err(NcsError::DanglingReference { kind, index })
            }
        };

        for instr in &self.instructions {
            for v in instr.variables.iter().chain(&instr.stack) {
                check("variable", v.0, vars)?;
            }
            for b in instr.branches.iter().chain(&instr.follower) {
                check("instruction", b.0, instrs)?;
            }
            if let Some(b) = instr.block {
                check("block", b.0, blocks)?;
            }
        }

        for (index, var) in self.variables.iter().enumerate() {
            if var.siblings.contains(&VarId(index)) {
                return Err(NcsError::SelfSibling { id: var.id });
            }
            for s in &var.siblings {
                check("variable", s.0, vars)?;
            }
            if let Some(c) = var.creator {
                check("instruction", c.0, instrs)?;
            }
        }

        for block in &self.blocks {
            if block.children.len() != block.children_types.len() {
                return Err(NcsError::ChildTypeMismatch {
                    address: block.address,
                    children: block.children.len(),
                    types: block.children_types.len(),
                });
            }
            check("subroutine", block.sub_routine.0, subs)?;
            for i in &block.instructions {
                check("instruction", i.0, instrs)?;
            }
            for c in block.children.iter().copied().chain(block.controls.iter().flat_map(|c| c.blocks())) {
                check("block", c.0, blocks)?;
            }
        }

        for sub in &self.sub_routines {
            for b in &sub.blocks {
                check("block", b.0, blocks)?;
            }
            for v in sub.params.iter().chain(&sub.returns) {
                check("variable", v.0, vars)?;
            }
            for r in &sub.return_sites {
                check("instruction", r.0, instrs)?;
            }
        }

        for g in &self.globals {
            check("variable", g.0, vars)?;
        }

        Ok(())
    }
}
