// rpg-battle schema - shared data definitions.
// Everything the engine reads from data files lives here: skills, items,
// states, enemies, troops, actors, classes, equipment, the trait catalog and
// the damage formula language.

pub use entities::*;
pub use formula::{Formula, FormulaError, FormulaScope, Operand, Stat};
pub use params::*;
pub use system::*;
pub use traits::*;
pub use usable::*;

pub mod entities;
pub mod formula;
pub mod params;
pub mod system;
pub mod traits;
pub mod usable;
