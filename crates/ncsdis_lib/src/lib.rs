//! Rendering of analyzed NWScript bytecode.
//!
//! The decoding and analysis of `.ncs` files happens elsewhere; this crate
//! takes the finished [`Analysis`] graph and turns it into a listing, an
//! assembly dump, a GraphViz control flow graph or NSS pseudo-source.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod dot;
pub mod format;
pub mod game;
pub mod graph;
pub mod listing;
pub mod nss;
pub mod opcode;

pub use game::{Game, GameId};
pub use graph::Analysis;
pub use listing::LinearStyle;
pub use opcode::{InstructionType, Opcode};

use graph::ControlType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Listing,
    Assembly,
    Dot,
    Nss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub format: OutputFormat,
    /// Annotate listing and assembly output with the stack before each instruction.
    pub print_stack: bool,
    /// Tag graph nodes with the control structures found on their block.
    pub print_control_types: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Listing,
            print_stack: false,
            print_control_types: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum NcsError {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid analysis dump: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dangling {kind} reference: {index}")]
    DanglingReference { kind: &'static str, index: usize },

    #[error("block 0x{address:08X} has {children} children but {types} edge types")]
    ChildTypeMismatch { address: u32, children: usize, types: usize },

    #[error("variable {id} lists itself as a sibling")]
    SelfSibling { id: u32 },

    #[error("{opcode} at 0x{address:08X} needs {needed} variables, has {found}")]
    MissingVariables { address: u32, opcode: Opcode, needed: usize, found: usize },

    #[error("return block 0x{address:08X} has no instructions")]
    EmptyReturnBlock { address: u32 },

    #[error("{kind:?} structure at 0x{address:08X} has no {part} block")]
    IncompleteControl { address: u32, kind: ControlType, part: &'static str },

    #[error("subroutine 0x{address:08X} returns {count} values")]
    TooManyReturns { address: u32, count: usize },

    #[error("{0} analysis has not been performed")]
    MissingAnalysis(&'static str),
}

/// The external analysis engine: decoding, stack simulation and control flow
/// recovery all happen behind this trait.
pub trait AnalysisEngine {
    fn analyze_stack(&mut self) -> Result<(), NcsError>;
    fn analyze_control_flow(&mut self) -> Result<(), NcsError>;

    fn analysis(&self) -> &Analysis;
    fn game(&self) -> &Game;
}

/// A previously analyzed script, as exchanged in JSON dumps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptDump {
    #[serde(default)]
    pub game: Game,
    pub analysis: Analysis,
}

/// An engine over a pre-computed analysis. Its analysis passes do nothing
/// beyond reporting what the dump is missing.
#[derive(Debug, Clone)]
pub struct StaticAnalysis {
    dump: ScriptDump,
}

impl StaticAnalysis {
    pub fn new(analysis: Analysis, game: Game) -> Self {
        Self { dump: ScriptDump { game, analysis } }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, NcsError> {
        let dump: ScriptDump = serde_json::from_reader(reader)?;
        Ok(Self { dump })
    }

    pub fn from_json(json: &str) -> Result<Self, NcsError> {
        let dump: ScriptDump = serde_json::from_str(json)?;
        Ok(Self { dump })
    }

    pub fn into_dump(self) -> ScriptDump {
        self.dump
    }
}

impl AnalysisEngine for StaticAnalysis {
    fn analyze_stack(&mut self) -> Result<(), NcsError> {
        if !self.dump.analysis.has_stack_analysis {
            warn!("dump carries no stack analysis");
        }
        Ok(())
    }

    fn analyze_control_flow(&mut self) -> Result<(), NcsError> {
        if !self.dump.analysis.has_control_flow {
            warn!("dump carries no control flow analysis");
        }
        Ok(())
    }

    fn analysis(&self) -> &Analysis {
        &self.dump.analysis
    }

    fn game(&self) -> &Game {
        &self.dump.game
    }
}

/// Owns an analysis engine and renders its results.
///
/// Rendering only borrows the analysis, so any number of output forms can be
/// produced from one analyzed script.
pub struct Disassembler<E> {
    engine: E,
}

impl<E: AnalysisEngine> Disassembler<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn analyze_stack(&mut self) -> Result<(), NcsError> {
        self.engine.analyze_stack()
    }

    pub fn analyze_control_flow(&mut self) -> Result<(), NcsError> {
        self.engine.analyze_control_flow()
    }

    fn checked(&self) -> Result<(&Analysis, &Game), NcsError> {
        let analysis = self.engine.analysis();
        analysis.validate()?;
        Ok((analysis, self.engine.game()))
    }

    /// Full disassembly listing, with addresses and raw bytes.
    pub fn create_listing<W: Write>(&self, out: &mut W, print_stack: bool) -> Result<(), NcsError> {
        let (analysis, game) = self.checked()?;
        listing::write_linear(out, analysis, game, LinearStyle::Listing, print_stack)
    }

    pub fn create_assembly<W: Write>(&self, out: &mut W, print_stack: bool) -> Result<(), NcsError> {
        let (analysis, game) = self.checked()?;
        listing::write_linear(out, analysis, game, LinearStyle::Assembly, print_stack)
    }

    pub fn create_dot<W: Write>(&self, out: &mut W, print_control_types: bool) -> Result<(), NcsError> {
        let (analysis, game) = self.checked()?;
        dot::write_dot(out, analysis, game, print_control_types)
    }

    pub fn create_nss<W: Write>(&self, out: &mut W) -> Result<(), NcsError> {
        let (analysis, game) = self.checked()?;
        nss::write_nss(out, analysis, game)
    }

    pub fn render<W: Write>(&self, out: &mut W, options: RenderOptions) -> Result<(), NcsError> {
        debug!(?options, "rendering");
        match options.format {
            OutputFormat::Listing => self.create_listing(out, options.print_stack),
            OutputFormat::Assembly => self.create_assembly(out, options.print_stack),
            OutputFormat::Dot => self.create_dot(out, options.print_control_types),
            OutputFormat::Nss => self.create_nss(out),
        }
    }
}

pub fn render_dump(json: &str, options: RenderOptions) -> Result<String, NcsError> {
    let mut dis = Disassembler::new(StaticAnalysis::from_json(json)?);
    dis.analyze_stack()?;
    dis.analyze_control_flow()?;

    let mut out = Vec::new();
    dis.render(&mut out, options)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
