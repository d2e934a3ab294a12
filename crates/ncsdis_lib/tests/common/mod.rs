//! Hand-built analysis graphs for the renderer tests.

#![allow(dead_code)]

use ncsdis_lib::graph::{
    AddressType, Analysis, Block, BlockId, ControlStructure, EdgeType, InstrId, Instruction, StackAnalysisState, SubId,
    SubRoutine, SubRoutineType, VarId, Variable, VariableType,
};
use ncsdis_lib::{InstructionType, Opcode};

pub struct GraphBuilder {
    analysis: Analysis,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            analysis: Analysis {
                has_stack_analysis: true,
                has_control_flow: true,
                ..Default::default()
            },
        }
    }

    pub fn size(mut self, size: usize) -> Self {
        self.analysis.size = size;
        self
    }

    pub fn var(&mut self, id: u32, ty: VariableType) -> VarId {
        self.analysis.variables.push(Variable {
            id,
            ty,
            creator: None,
            siblings: Default::default(),
        });
        VarId(self.analysis.variables.len() - 1)
    }

    pub fn created_by(&mut self, var: VarId, instr: InstrId) {
        self.analysis.variables[var.0].creator = Some(instr);
    }

    pub fn sibling(&mut self, var: VarId, sibling: VarId) {
        self.analysis.variables[var.0].siblings.insert(sibling);
    }

    pub fn global(&mut self, var: VarId) {
        self.analysis.globals.push(var);
    }

    pub fn sub(&mut self, address: u32, kind: SubRoutineType) -> SubId {
        self.analysis.sub_routines.push(SubRoutine {
            address,
            kind,
            name: None,
            blocks: Vec::new(),
            params: Vec::new(),
            returns: Vec::new(),
            return_sites: Vec::new(),
            stack_analysis: StackAnalysisState::Finished,
        });
        SubId(self.analysis.sub_routines.len() - 1)
    }

    pub fn sub_mut(&mut self, sub: SubId) -> &mut SubRoutine {
        &mut self.analysis.sub_routines[sub.0]
    }

    pub fn block(&mut self, sub: SubId, address: u32) -> BlockId {
        self.analysis.blocks.push(Block {
            address,
            instructions: Vec::new(),
            sub_routine: sub,
            children: Vec::new(),
            children_types: Vec::new(),
            controls: Vec::new(),
        });
        let id = BlockId(self.analysis.blocks.len() - 1);
        self.analysis.sub_routines[sub.0].blocks.push(id);
        id
    }

    /// Appends an instruction to a block. The previous instruction of the
    /// same block gets it as its follower; the first instruction of a
    /// subroutine's entry block is marked as a subroutine address.
    pub fn instr(
        &mut self,
        block: BlockId,
        address: u32,
        opcode: Opcode,
        ins_type: InstructionType,
        bytes: &[u8],
        args: &[i32],
        variables: &[VarId],
    ) -> InstrId {
        let id = InstrId(self.analysis.instructions.len());

        let b = &self.analysis.blocks[block.0];
        let is_entry = b.instructions.is_empty() && self.analysis.sub_routines[b.sub_routine.0].blocks[0] == block;
        if let Some(&prev) = b.instructions.last() {
            self.analysis.instructions[prev.0].follower = Some(id);
        }

        self.analysis.instructions.push(Instruction {
            address,
            opcode,
            ins_type,
            bytes: bytes.to_vec(),
            args: args.to_vec(),
            variables: variables.to_vec(),
            stack: Vec::new(),
            branches: Vec::new(),
            follower: None,
            block: Some(block),
            address_type: if is_entry { AddressType::SubRoutine } else { AddressType::None },
        });
        self.analysis.blocks[block.0].instructions.push(id);
        id
    }

    pub fn instr_mut(&mut self, instr: InstrId) -> &mut Instruction {
        &mut self.analysis.instructions[instr.0]
    }

    pub fn branch(&mut self, from: InstrId, to: InstrId) {
        self.analysis.instructions[from.0].branches.push(to);
    }

    pub fn edge(&mut self, from: BlockId, to: BlockId, ty: EdgeType) {
        let b = &mut self.analysis.blocks[from.0];
        b.children.push(to);
        b.children_types.push(ty);
    }

    pub fn control(&mut self, block: BlockId, control: ControlStructure) {
        self.analysis.blocks[block.0].controls.push(control);
    }

    pub fn build(self) -> Analysis {
        self.analysis
    }
}

pub fn int_bytes(v: i32) -> [u8; 4] {
    v.to_be_bytes()
}

/// Renders with one of the `create_*` entry points into a string.
pub fn render_with<F>(analysis: Analysis, game: ncsdis_lib::Game, f: F) -> String
where
    F: FnOnce(&ncsdis_lib::Disassembler<ncsdis_lib::StaticAnalysis>, &mut Vec<u8>) -> Result<(), ncsdis_lib::NcsError>,
{
    let dis = ncsdis_lib::Disassembler::new(ncsdis_lib::StaticAnalysis::new(analysis, game));
    let mut out = Vec::new();
    f(&dis, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}
