// ─── Libraries ───
// Declarations from manifests and loader profiles, platform rules, and the
// deduplicating resolver that turns them into downloads.

mod model;
mod resolver;

pub use model::{
    ArtifactDownload, Library, LibraryDeclaration, LibraryDownloads, Os, OsRule, Platform, Rule,
    RuleAction,
};
pub use resolver::LibraryResolver;
