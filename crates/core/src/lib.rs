mod config;
mod error;
mod matcher;
mod materialize;
mod metadata;
mod packet;
mod pipeline;
mod resolver;
mod sanitize;
mod scanner;
mod xmp_reader;

pub use config::{
    app_paths, load_config_from, AppConfig, AppPaths, MetadataKeys,
    SidecarExtensions, SidecarRole, XMP_BASIC_NAMESPACE,
};
pub use error::{MetadataField, RenameError, SkipReason};
pub use matcher::{find_sidecars, Sidecar, SidecarIndex};
pub use materialize::{copy_preserving_metadata, materialize, Materialized};
pub use metadata::{
    device_identifier, extract_metadata, parse_packet, parse_timestamp, CanonicalName,
    MetadataRecord,
};
pub use packet::read_xmp_packet;
pub use pipeline::{process_file, run, FileOutcome, NoProgress, Progress, RunOptions, RunReport};
pub use resolver::resolve_target;
pub use scanner::scan_sources;
pub use xmp_reader::find_property;
