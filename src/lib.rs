// Crate root library declaration and module exports.
pub mod export;
pub mod import;
pub mod logging;
pub mod model;
pub mod parser;

pub use export::{export, ExportBundle};
pub use import::{import, import_path, map_file, ImportOptions};
pub use model::{MappingResult, ValidationWarning};
pub use parser::{parse, GedcomFile, ParseError, RecordKind};
