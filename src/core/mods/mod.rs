// ─── Mods ───
// Every supported manifest format is converted to `Mod` before the installer
// sees it. The resolver then narrows the set to one side and selection.

pub mod curseforge;
pub mod model;
pub mod modpacksch;
pub mod modrinth;
mod resolver;
pub mod technic;

pub use model::{DownloadType, Mod, ModType};
pub use resolver::{ManifestMod, ModResolver, OptionalSelection};
