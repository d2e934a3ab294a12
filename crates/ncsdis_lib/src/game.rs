use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameId {
    #[default]
    Unknown,
    Nwn,
    Nwn2,
    Kotor,
    Kotor2,
    Jade,
    Witcher,
    DragonAge,
    DragonAge2,
}

/// Per-game constant tables, supplied by whoever decoded the script.
///
/// Engine types are opaque handle types (`effect`, `location`, ...) that the
/// bytecode only knows by slot number. Slots without a name are left `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Game {
    /// Which game the tables belong to. Informational only; rendering reads
    /// the tables, never the id.
    pub id: GameId,
    pub engine_types: Vec<Option<String>>,
    pub functions: Vec<String>,
}

impl Game {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn engine_type_count(&self) -> usize {
        self.engine_types.len()
    }

    pub fn engine_type_name(&self, index: usize) -> Option<&str> {
        self.engine_types
            .get(index)
            .and_then(|n| n.as_deref())
            .filter(|n| !n.is_empty())
    }

    pub fn function_name(&self, index: usize) -> Option<&str> {
        self.functions.get(index).map(String::as_str).filter(|n| !n.is_empty())
    }
}
