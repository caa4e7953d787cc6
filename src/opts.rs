use crate::types::LostEventsPolicy;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
pub struct ReaderOpts {
    /// Use configuration from file
    #[clap(long = "config", name = "config file", help_heading = "READER CONFIGURATION")]
    pub config_file: Option<PathBuf>,

    /// TOML schema file describing the trace's declarations
    #[clap(long, name = "schema file", help_heading = "READER CONFIGURATION")]
    pub schema: Option<PathBuf>,

    /// What to do when a packet's discarded event counter goes backwards, 'clamp' or 'error'
    #[clap(long, name = "policy", help_heading = "READER CONFIGURATION")]
    pub lost_events_policy: Option<LostEventsPolicy>,

    /// Skip events timestamped before this value
    #[clap(long, name = "timestamp", help_heading = "READER CONFIGURATION")]
    pub seek: Option<u64>,

    /// Stop after this many events
    #[clap(long, name = "count", help_heading = "READER CONFIGURATION")]
    pub limit: Option<u64>,
}
