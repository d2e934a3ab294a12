//! GraphViz output.
//!
//! Each block becomes one node, or several for large blocks, clustered by the
//! subroutine it belongs to. Edges between the nodes show the control flow.

use std::io::Write;

use tracing::debug;

use crate::NcsError;
use crate::format::{
    analyzed_signature, block_label_name, format_instruction, format_jump_destination, quote_string,
    sub_routine_label_name,
};
use crate::game::Game;
use crate::graph::{Analysis, Block, BlockId, ControlType, EdgeType, SubId};

const MAX_NODE_SIZE: usize = 10;

/// Number of nodes a block of `instructions` instructions is split into.
///
/// A block without instructions still gets a single node for its label.
pub fn nodes_per_block(instructions: usize) -> usize {
    instructions.div_ceil(MAX_NODE_SIZE).max(1)
}

pub fn node_sizes(instructions: usize) -> Vec<usize> {
    let nodes = nodes_per_block(instructions);
    let per_node = instructions.div_ceil(nodes);
    (0..nodes)
        .map(|i| per_node.min(instructions.saturating_sub(i * per_node)))
        .collect()
}

pub fn node_name(address: u32, index: usize) -> String {
    format!("b{address:08X}_{index}")
}

pub fn edge_color(ty: EdgeType) -> &'static str {
    match ty {
        EdgeType::Unconditional => "blue",
        EdgeType::ConditionalTrue => "green",
        EdgeType::ConditionalFalse => "red",
        EdgeType::SubRoutineCall => "cyan",
        EdgeType::SubRoutineTail => "orange",
        EdgeType::SubRoutineStore => "purple",
        EdgeType::Dead => "gray40",
    }
}

fn control_tag(ty: ControlType) -> &'static str {
    match ty {
        ControlType::None => "<NONE>",
        ControlType::DoWhileHead => "<DOWHILEHEAD>",
        ControlType::DoWhileTail => "<DOWHILETAIL>",
        ControlType::DoWhileNext => "<DOWHILENEXT>",
        ControlType::WhileHead => "<WHILEHEAD>",
        ControlType::WhileTail => "<WHILETAIL>",
        ControlType::WhileNext => "<WHILENEXT>",
        ControlType::Break => "<BREAK>",
        ControlType::Continue => "<CONTINUE>",
        ControlType::Return => "<RETURN>",
        ControlType::IfCond => "<IFCOND>",
        ControlType::IfTrue => "<IFTRUE>",
        ControlType::IfElse => "<IFELSE>",
        ControlType::IfNext => "<IFNEXT>",
        ControlType::Unknown => "<>",
    }
}

fn block_controls(block: &Block) -> String {
    let mut control = String::new();
    for c in &block.controls {
        control.push_str(control_tag(c.kind));
        control.push_str("\\n");
    }
    if !control.is_empty() {
        control.push_str("\\n");
    }
    control
}

fn edge_attributes(block: &Block, child: &Block, ty: EdgeType) -> String {
    let mut attr = format!("color={}", edge_color(ty));

    // Jumping back
    if child.address < block.address {
        attr.push_str(" style=bold");
    }

    // Keep edges between subroutines from influencing the node rank
    if block.sub_routine != child.sub_routine {
        attr.push_str(" constraint=false");
    }

    attr
}

fn write_blocks<W: Write>(
    out: &mut W,
    analysis: &Analysis,
    game: &Game,
    blocks: &[BlockId],
    print_control_types: bool,
) -> Result<(), NcsError> {
    for (n, &id) in blocks.iter().enumerate() {
        let block = analysis.block(id);
        let sizes = node_sizes(block.instructions.len());
        let per_node = sizes[0].max(1);

        let mut labels = vec![String::new(); sizes.len()];

        if print_control_types {
            labels[0].push_str(&block_controls(block));
        }
        let name = block_label_name(analysis, id).unwrap_or_else(|| format_jump_destination(block.address));
        labels[0].push_str(&name);
        labels[0].push_str(":\\l");

        for (i, &instr) in block.instructions.iter().enumerate() {
            let text = format_instruction(analysis, analysis.instruction(instr), game);
            labels[i / per_node].push_str(&format!("  {}\\l", quote_string(&text)));
        }

        for (i, label) in labels.iter().enumerate() {
            writeln!(out, "    \"{}\" [ shape=\"box\" label=\"{label}\" ]", node_name(block.address, i))?;
        }

        if labels.len() > 1 {
            let chain: Vec<String> = (0..labels.len()).map(|i| node_name(block.address, i)).collect();
            writeln!(out, "    {} [ style=dotted ]", chain.join(" -> "))?;
        }

        if n + 1 != blocks.len() {
            writeln!(out)?;
        }
    }
    Ok(())
}

fn write_clustered_blocks<W: Write>(
    out: &mut W,
    analysis: &Analysis,
    game: &Game,
    print_control_types: bool,
) -> Result<(), NcsError> {
    for (index, sub) in analysis.sub_routines.iter().enumerate() {
        let id = SubId(index);
        let Some(&entry) = sub.blocks.first() else {
            continue;
        };
        if analysis.block(entry).instructions.is_empty() {
            continue;
        }

        writeln!(out, "  subgraph cluster_s{:08X} {{", sub.address)?;
        writeln!(out, "    style=filled")?;
        writeln!(out, "    color=lightgrey")?;

        let label = analyzed_signature(analysis, id, game)
            .or_else(|| sub_routine_label_name(analysis, id))
            .unwrap_or_else(|| format_jump_destination(sub.address));
        writeln!(out, "    label=\"{}\"\n", quote_string(&label))?;

        write_blocks(out, analysis, game, &sub.blocks, print_control_types)?;

        writeln!(out, "  }}\n")?;
    }
    Ok(())
}

fn write_block_edges<W: Write>(out: &mut W, analysis: &Analysis) -> Result<(), NcsError> {
    for block in &analysis.blocks {
        let last = nodes_per_block(block.instructions.len()) - 1;

        for (&child, &ty) in block.children.iter().zip(&block.children_types) {
            let child = analysis.block(child);
            writeln!(
                out,
                "  {} -> {} [ {} ]",
                node_name(block.address, last),
                node_name(child.address, 0),
                edge_attributes(block, child, ty),
            )?;
        }
    }
    Ok(())
}

pub fn write_dot<W: Write>(
    out: &mut W,
    analysis: &Analysis,
    game: &Game,
    print_control_types: bool,
) -> Result<(), NcsError> {
    writeln!(out, "digraph {{")?;
    writeln!(out, "  overlap=false")?;
    writeln!(out, "  concentrate=true")?;
    writeln!(out, "  splines=ortho\n")?;

    write_clustered_blocks(out, analysis, game, print_control_types)?;
    write_block_edges(out, analysis)?;

    writeln!(out, "}}")?;

    debug!(blocks = analysis.blocks.len(), subroutines = analysis.sub_routines.len(), "wrote dot graph");
    Ok(())
}
