//! Commands: parsing, the command registry and privilege extraction.

mod descriptor;
mod extractor;
mod parser;
mod registry;
mod views;

pub use descriptor::{
    CommandArgs, CommandDescriptor, CommandTarget, MapReduceOutput, Pipeline, Stage, StageTarget,
    WhenMatched,
};
pub use extractor::{DEFAULT_MAX_DEPTH, ExtractorOptions, PrivilegeExtractor};
pub use parser::{PARSE_DEPTH_LIMIT, parse_command, parse_command_str, parse_pipeline};
pub use registry::{command_names, is_known_command};
pub use views::{
    NoViews, ResolvedDependency, ViewCatalog, ViewDefinition, ViewGraph, resolve_view_chain,
};
