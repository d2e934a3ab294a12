use std::io::Write;

use tracing::{debug, warn};

use crate::NcsError;
use crate::format::{
    analyzed_signature, format_bytes, format_instruction, format_jump_label_name, generic_engine_type_name,
    variable_type_name,
};
use crate::game::Game;
use crate::graph::{AddressType, Analysis, Instruction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearStyle {
    /// Addresses, raw bytes and mnemonics, dashed rules between flows.
    Listing,
    /// Mnemonics only, blank lines between flows.
    Assembly,
}

impl LinearStyle {
    fn stack_indent(self) -> usize {
        match self {
            LinearStyle::Listing => 36,
            LinearStyle::Assembly => 0,
        }
    }

    fn separator(self) -> &'static str {
        match self {
            LinearStyle::Listing => "  -------- -------------------------- ---\n",
            LinearStyle::Assembly => "\n",
        }
    }
}

pub fn write_info<W: Write>(out: &mut W, analysis: &Analysis) -> Result<(), NcsError> {
    writeln!(out, "; {} bytes, {} instructions\n", analysis.size, analysis.instructions.len())?;
    Ok(())
}

pub fn write_engine_types<W: Write>(out: &mut W, game: &Game) -> Result<(), NcsError> {
    let count = game.engine_type_count();
    if count == 0 {
        return Ok(());
    }

    writeln!(out, "; Engine types:")?;
    for i in 0..count {
        if let Some(name) = game.engine_type_name(i) {
            writeln!(out, "; {}: {name}", generic_engine_type_name(i))?;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// The signature comment for an instruction that starts a subroutine.
fn instruction_signature(analysis: &Analysis, instr: &Instruction, game: &Game) -> Option<String> {
    if instr.address_type != AddressType::SubRoutine {
        return None;
    }
    let sub = analysis.owning_sub_routine(instr)?;
    analyzed_signature(analysis, sub, game)
}

fn write_jump_label<W: Write>(out: &mut W, analysis: &Analysis, instr: &Instruction, game: &Game) -> Result<(), NcsError> {
    let Some(label) = format_jump_label_name(analysis, instr) else {
        return Ok(());
    };

    match instruction_signature(analysis, instr, game) {
        Some(sig) => writeln!(out, "{label}: ; {sig}")?,
        None => writeln!(out, "{label}:")?,
    }
    Ok(())
}

fn write_stack<W: Write>(
    out: &mut W,
    analysis: &Analysis,
    instr: &Instruction,
    game: &Game,
    indent: usize,
) -> Result<(), NcsError> {
    let pad = " ".repeat(indent);

    writeln!(out, "{pad}; .--- Stack: {:>4} ---", instr.stack.len())?;

    for (slot, &v) in instr.stack.iter().enumerate() {
        let var = analysis.variable(v);

        let mut ids: Vec<u32> = var.siblings.iter().map(|&s| analysis.variable(s).id).collect();
        ids.sort_unstable();
        let siblings = if ids.is_empty() {
            String::new()
        } else {
            let ids: Vec<String> = ids.iter().map(u32::to_string).collect();
            format!(" ({})", ids.join(","))
        };

        let creator = var.creator.map(|c| analysis.instruction(c).address).unwrap_or(0);

        writeln!(
            out,
            "{pad}; | {slot:>4} - {:>6}: {:<8} ({creator:08X}){siblings}",
            var.id,
            variable_type_name(var.ty, game).to_lowercase(),
        )?;
    }

    writeln!(out, "{pad}; '--- ---------- ---")?;
    Ok(())
}

/// Walks the address-ordered instruction list once, emitting one line per
/// instruction plus labels, optional stack boxes and flow separators.
pub fn write_linear<W: Write>(
    out: &mut W,
    analysis: &Analysis,
    game: &Game,
    style: LinearStyle,
    print_stack: bool,
) -> Result<(), NcsError> {
    write_info(out, analysis)?;
    write_engine_types(out, game)?;

    if print_stack && !analysis.has_stack_analysis {
        warn!("no stack analysis, omitting stack boxes");
    }
    let print_stack = print_stack && analysis.has_stack_analysis;

    for instr in &analysis.instructions {
        write_jump_label(out, analysis, instr, game)?;

        if print_stack {
            write_stack(out, analysis, instr, game, style.stack_indent())?;
        }

        let text = format_instruction(analysis, instr, game);
        match style {
            LinearStyle::Listing => {
                writeln!(out, "  {:08X} {:<26} {text}", instr.address, format_bytes(instr))?;
            }
            LinearStyle::Assembly => writeln!(out, "  {text}")?,
        }

        if instr.follower.is_none() {
            out.write_all(style.separator().as_bytes())?;
        }
    }

    debug!(instructions = analysis.instructions.len(), ?style, "wrote linear output");
    Ok(())
}
