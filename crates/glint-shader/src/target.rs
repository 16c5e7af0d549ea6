//! Target selection.
//!
//! This is the only place that maps a target to its instruction model and encode/decode strategy.
//! Everything downstream works off the [`Backend`] it returns.

use std::fmt;
use std::str::FromStr;

use crate::asm;
use crate::blob::Blob;
use crate::disasm::{self, Listing};
use crate::error::{AssembleError, DisassembleError};
use crate::model::{self, InstructionModel};
use crate::program::ShaderProgram;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    Generic,
    Legacy,
    Tile,
}

impl Target {
    pub const ALL: [Target; 3] = [Target::Generic, Target::Legacy, Target::Tile];

    /// Stable id stored in blob headers.
    pub fn id(&self) -> u8 {
        match self {
            Self::Generic => 0,
            Self::Legacy => 1,
            Self::Tile => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Legacy => "legacy",
            Self::Tile => "tile",
        }
    }

    pub fn model(&self) -> &'static InstructionModel {
        for_target(*self).model
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown target `{0}` (expected one of: generic, legacy, tile)")]
pub struct UnknownTarget(pub String);

impl FromStr for Target {
    type Err = UnknownTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(Self::Generic),
            "legacy" | "r200" => Ok(Self::Legacy),
            "tile" | "mobile" => Ok(Self::Tile),
            _ => Err(UnknownTarget(s.to_owned())),
        }
    }
}

/// A target's instruction model paired with its assembler and disassembler.
#[derive(Debug, Clone, Copy)]
pub struct Backend {
    pub target: Target,
    pub model: &'static InstructionModel,
    pub assemble: fn(&ShaderProgram) -> Result<Blob, AssembleError>,
    pub disassemble: fn(&[u8]) -> Result<Listing, DisassembleError>,
}

pub fn for_target(target: Target) -> Backend {
    match target {
        Target::Generic => Backend {
            target,
            model: &model::GENERIC,
            assemble: asm::assemble_generic,
            disassemble: disasm::disassemble_generic,
        },
        Target::Legacy => Backend {
            target,
            model: &model::LEGACY,
            assemble: asm::legacy::assemble,
            disassemble: disasm::legacy::disassemble,
        },
        Target::Tile => Backend {
            target,
            model: &model::TILE,
            assemble: asm::tile::assemble,
            disassemble: disasm::tile::disassemble,
        },
    }
}
