//! NSS pseudo-source generation.
//!
//! The output is a best-effort reconstruction: only instructions with a known
//! statement form produce code, and loops are not reconstructed, so their
//! blocks come out as plain sequential statements.
//!
//! Unlike the linear and graph forms, this one does not degrade without a
//! stack analysis: every statement is built from the variables it assigns,
//! so both analyses are required up front. A unit that fails part way writes
//! nothing to the sink.

use std::collections::HashSet;
use std::io::Write;

use tracing::{debug, trace};

use crate::NcsError;
use crate::format::{
    format_constant, format_jump_destination, format_jump_label_name, format_signature, format_variable_name,
    function_name, variable_type_name,
};
use crate::game::Game;
use crate::graph::{Analysis, BlockId, ControlStructure, ControlType, EdgeType, Instruction, SubId, Variable, VariableType};
use crate::opcode::Opcode;

/// Statement forms, one per opcode family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Constant,
    Call,
    Copy,
    Binary(&'static str),
    Not,
    Reserve,
}

fn statement_shape(opcode: Opcode) -> Option<Shape> {
    match opcode {
        Opcode::Const => Some(Shape::Constant),
        Opcode::Action => Some(Shape::Call),
        Opcode::CpDownSp | Opcode::CpTopSp | Opcode::CpDownBp | Opcode::CpTopBp => Some(Shape::Copy),
        Opcode::LogAnd => Some(Shape::Binary("&&")),
        Opcode::LogOr => Some(Shape::Binary("||")),
        Opcode::Eq => Some(Shape::Binary("==")),
        Opcode::Leq => Some(Shape::Binary("<=")),
        Opcode::Lt => Some(Shape::Binary("<")),
        Opcode::Geq => Some(Shape::Binary(">=")),
        Opcode::Gt => Some(Shape::Binary(">")),
        Opcode::Not => Some(Shape::Not),
        Opcode::RsAdd => Some(Shape::Reserve),

        // No statement form yet. Stack bookkeeping and jumps are covered by
        // the block structure; arithmetic and the rest are simply omitted.
        Opcode::IncOr
        | Opcode::ExcOr
        | Opcode::BoolAnd
        | Opcode::Neq
        | Opcode::ShLeft
        | Opcode::ShRight
        | Opcode::UShRight
        | Opcode::Add
        | Opcode::Sub
        | Opcode::Mul
        | Opcode::Div
        | Opcode::Mod
        | Opcode::Neg
        | Opcode::Comp
        | Opcode::MovSp
        | Opcode::StoreStateAll
        | Opcode::Jmp
        | Opcode::Jsr
        | Opcode::Jz
        | Opcode::Retn
        | Opcode::Destruct
        | Opcode::DecSp
        | Opcode::IncSp
        | Opcode::Jnz
        | Opcode::DecBp
        | Opcode::IncBp
        | Opcode::SaveBp
        | Opcode::RestoreBp
        | Opcode::StoreState
        | Opcode::Nop
        | Opcode::WriteArray
        | Opcode::ReadArray
        | Opcode::GetRef
        | Opcode::GetRefArray
        | Opcode::ScriptSize => None,
    }
}

/// Initializer for a freshly reserved variable.
fn default_value(ty: VariableType) -> &'static str {
    match ty {
        VariableType::String => "\"\"",
        VariableType::Int => "0",
        VariableType::Float => "0.0",
        // TODO: objects and engine types have no literal form in NSS; they
        // need a constructor call per type once the game tables carry one.
        _ => "0",
    }
}

fn tabs(indent: usize) -> String {
    "\t".repeat(indent)
}

/// Pending output while walking a subroutine.
enum Step {
    Block { block: BlockId, indent: usize },
    Text(String),
    Leave(BlockId),
}

struct Generator<'a, W> {
    out: &'a mut W,
    analysis: &'a Analysis,
    game: &'a Game,
    /// Blocks whose output is still open on the current path.
    active: HashSet<BlockId>,
}

impl<'a, W: Write> Generator<'a, W> {
    fn new(out: &'a mut W, analysis: &'a Analysis, game: &'a Game) -> Self {
        Self { out, analysis, game, active: HashSet::new() }
    }

    fn variable(&self, instr: &Instruction, index: usize) -> Result<&'a Variable, NcsError> {
        match instr.variables.get(index) {
            Some(&v) => Ok(self.analysis.variable(v)),
            None => Err(NcsError::MissingVariables {
                address: instr.address,
                opcode: instr.opcode,
                needed: index + 1,
                found: instr.variables.len(),
            }),
        }
    }

    fn type_name(&self, var: &Variable) -> String {
        variable_type_name(var.ty, self.game)
    }

    fn declaration(&self, var: &Variable) -> String {
        format!("{} {}", self.type_name(var), format_variable_name(var))
    }

    /// The single-line statement for an instruction, if it has one.
    fn statement(&self, instr: &Instruction) -> Result<Option<String>, NcsError> {
        let Some(shape) = statement_shape(instr.opcode) else {
            trace!(address = instr.address, opcode = %instr.opcode, "no statement form");
            return Ok(None);
        };

        let stmt = match shape {
            Shape::Constant => {
                let v = self.variable(instr, 0)?;
                let value = format_constant(instr).unwrap_or_else(|| default_value(v.ty).to_string());
                format!("{} = {value};", self.declaration(v))
            }
            Shape::Call => {
                let param_count = instr.args.get(1).map_or(0, |&n| usize::try_from(n).unwrap_or(0));
                if instr.variables.len() < param_count {
                    return Err(NcsError::MissingVariables {
                        address: instr.address,
                        opcode: instr.opcode,
                        needed: param_count,
                        found: instr.variables.len(),
                    });
                }

                let mut stmt = String::new();
                if instr.variables.len() > param_count {
                    let ret = self.variable(instr, instr.variables.len() - 1)?;
                    stmt.push_str(&format!("{} = ", self.declaration(ret)));
                }

                let args = instr.variables[..param_count]
                    .iter()
                    .map(|&v| format_variable_name(self.analysis.variable(v)))
                    .collect::<Vec<_>>()
                    .join(", ");
                let index = instr.args.first().copied().unwrap_or(-1);
                stmt.push_str(&format!("{}({args});", function_name(self.game, index)));
                stmt
            }
            Shape::Copy => {
                let src = self.variable(instr, 0)?;
                let dst = self.variable(instr, 1)?;
                format!("{} = {};", self.declaration(dst), format_variable_name(src))
            }
            Shape::Binary(op) => {
                let lhs = self.variable(instr, 0)?;
                let rhs = self.variable(instr, 1)?;
                let result = self.variable(instr, 2)?;
                format!(
                    "{} = {} {op} {};",
                    self.declaration(result),
                    format_variable_name(lhs),
                    format_variable_name(rhs)
                )
            }
            Shape::Not => {
                let operand = self.variable(instr, 0)?;
                let result = self.variable(instr, 1)?;
                format!("{} = !{};", self.declaration(result), format_variable_name(operand))
            }
            Shape::Reserve => {
                let v = self.variable(instr, 0)?;
                format!("{} = {};", self.declaration(v), default_value(v.ty))
            }
        };

        Ok(Some(stmt))
    }

    /// `callee(args);` for a block ending in a subroutine call.
    fn call_statement(&self, block: BlockId) -> Result<Option<String>, NcsError> {
        let Some(&last) = self.analysis.block(block).instructions.last() else {
            return Ok(None);
        };
        let call = self.analysis.instruction(last);

        let callee = match call.branches.first() {
            Some(&t) => {
                let target = self.analysis.instruction(t);
                format_jump_label_name(self.analysis, target).unwrap_or_else(|| format_jump_destination(target.address))
            }
            None => return Ok(None),
        };

        let args = call
            .variables
            .iter()
            .map(|&v| format_variable_name(self.analysis.variable(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(Some(format!("{callee}({args});")))
    }

    fn return_statement(&self, block: BlockId, retn: Option<BlockId>) -> Result<String, NcsError> {
        let address = self.analysis.block(block).address;
        let retn = retn.ok_or(NcsError::IncompleteControl { address, kind: ControlType::Return, part: "return" })?;
        let retn = self.analysis.block(retn);

        let (Some(&first), Some(&last)) = (retn.instructions.first(), retn.instructions.last()) else {
            return Err(NcsError::EmptyReturnBlock { address: retn.address });
        };

        if self.analysis.instruction(last).stack.is_empty() {
            return Ok("return;".into());
        }

        let value = self.variable(self.analysis.instruction(first), 0)?;
        Ok(format!("return {};", format_variable_name(value)))
    }

    fn if_steps(&self, block: BlockId, control: &ControlStructure, indent: usize, next: &mut Vec<Step>) -> Result<(), NcsError> {
        let cond_block = self.analysis.block(control.if_cond.unwrap_or(block));
        let cond = match cond_block.instructions.last() {
            Some(&i) => self.variable(self.analysis.instruction(i), 0)?,
            None => {
                return Err(NcsError::IncompleteControl {
                    address: cond_block.address,
                    kind: ControlType::IfCond,
                    part: "condition",
                });
            }
        };

        let pad = tabs(indent);
        next.push(Step::Text(format!("{pad}if ({}) {{\n", format_variable_name(cond))));
        if let Some(t) = control.if_true {
            next.push(Step::Block { block: t, indent: indent + 1 });
        }
        next.push(Step::Text(format!("{pad}}}")));

        if let Some(e) = control.if_else {
            next.push(Step::Text(" else {\n".into()));
            next.push(Step::Block { block: e, indent: indent + 1 });
            next.push(Step::Text(format!("{pad}}}")));
        }
        next.push(Step::Text("\n".into()));

        if let Some(n) = control.if_next {
            next.push(Step::Block { block: n, indent });
        }
        Ok(())
    }

    /// Writes a block's own statements and returns what follows it, in order.
    fn block_steps(&mut self, id: BlockId, indent: usize) -> Result<Vec<Step>, NcsError> {
        let analysis = self.analysis;
        let block = analysis.block(id);
        let pad = tabs(indent);

        for &i in &block.instructions {
            if let Some(stmt) = self.statement(analysis.instruction(i))? {
                writeln!(self.out, "{pad}{stmt}")?;
            }
        }

        let mut next = Vec::new();

        if block.children_types.contains(&EdgeType::SubRoutineCall) {
            if let Some(call) = self.call_statement(id)? {
                next.push(Step::Text(format!("{pad}{call}\n")));
            }
            let tail = block
                .children
                .iter()
                .zip(&block.children_types)
                .find(|&(_, &ty)| ty == EdgeType::SubRoutineTail);
            if let Some((&tail, _)) = tail {
                next.push(Step::Block { block: tail, indent });
            }
        }

        for control in &block.controls {
            match control.kind {
                ControlType::Return => {
                    let stmt = self.return_statement(id, control.retn)?;
                    next.push(Step::Text(format!("{pad}{stmt}\n")));
                }
                ControlType::IfCond => self.if_steps(id, control, indent, &mut next)?,
                kind => trace!(address = block.address, ?kind, "control structure not reconstructed"),
            }
        }

        Ok(next)
    }

    /// Renders a block and everything structurally below it.
    ///
    /// Nesting is tracked on an explicit stack so deeply nested conditionals
    /// cannot exhaust the native stack. A block is skipped only while it is
    /// still open further up the path, which breaks cycles in the structure
    /// annotations but still renders a join shared by several `if`s after
    /// each of them.
    fn write_tree(&mut self, entry: BlockId, indent: usize) -> Result<(), NcsError> {
        let mut work = vec![Step::Block { block: entry, indent }];

        while let Some(step) = work.pop() {
            match step {
                Step::Text(text) => self.out.write_all(text.as_bytes())?,
                Step::Leave(block) => {
                    self.active.remove(&block);
                }
                Step::Block { block, indent } => {
                    if !self.active.insert(block) {
                        debug!(address = self.analysis.block(block).address, "block already open, skipping");
                        continue;
                    }
                    let next = self.block_steps(block, indent)?;
                    work.push(Step::Leave(block));
                    work.extend(next.into_iter().rev());
                }
            }
        }
        Ok(())
    }
}

fn write_sub_routine<W: Write>(out: &mut W, analysis: &Analysis, game: &Game, id: SubId) -> Result<(), NcsError> {
    let sub = analysis.sub_routine(id);
    if sub.returns.len() > 1 {
        return Err(NcsError::TooManyReturns { address: sub.address, count: sub.returns.len() });
    }

    writeln!(out, "\n{} {{", format_signature(analysis, id, game, true))?;

    if let Some(&entry) = sub.blocks.first() {
        Generator::new(out, analysis, game).write_tree(entry, 1)?;
    }

    writeln!(out, "}}")?;
    Ok(())
}

fn write_unit<W: Write>(out: &mut W, analysis: &Analysis, game: &Game) -> Result<(), NcsError> {
    writeln!(out, "// Decompiled using ncsdis\n")?;

    for &g in &analysis.globals {
        let var = analysis.variable(g);
        writeln!(out, "{} {};", variable_type_name(var.ty, game), format_variable_name(var))?;
    }

    for index in 0..analysis.sub_routines.len() {
        write_sub_routine(out, analysis, game, SubId(index))?;
    }
    Ok(())
}

/// Writes the whole translation unit: globals first, then one function per
/// subroutine.
pub fn write_nss<W: Write>(out: &mut W, analysis: &Analysis, game: &Game) -> Result<(), NcsError> {
    if !analysis.has_stack_analysis {
        return Err(NcsError::MissingAnalysis("stack"));
    }
    if !analysis.has_control_flow {
        return Err(NcsError::MissingAnalysis("control flow"));
    }

    let mut unit: Vec<u8> = Vec::new();
    write_unit(&mut unit, analysis, game)?;
    out.write_all(&unit)?;

    debug!(subroutines = analysis.sub_routines.len(), globals = analysis.globals.len(), "wrote nss");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modeled_opcodes() {
        assert_eq!(statement_shape(Opcode::Eq), Some(Shape::Binary("==")));
        assert_eq!(statement_shape(Opcode::CpTopBp), Some(Shape::Copy));
        assert_eq!(statement_shape(Opcode::Add), None);
        assert_eq!(statement_shape(Opcode::Retn), None);
    }

    #[test]
    fn defaults_per_type() {
        assert_eq!(default_value(VariableType::String), "\"\"");
        assert_eq!(default_value(VariableType::Int), "0");
        assert_eq!(default_value(VariableType::Float), "0.0");
        assert_eq!(default_value(VariableType::Object), "0");
        assert_eq!(default_value(VariableType::EngineType(2)), "0");
    }
}
