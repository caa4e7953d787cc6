use crate::error::Error;
use crate::opts::ReaderOpts;
use crate::types::LostEventsPolicy;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming a configuration file, used when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "CTF_READER_CONFIG";

#[derive(Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CtfConfig {
    /// TOML schema describing the trace's declarations
    pub schema: Option<PathBuf>,

    /// Stream files, or directories of stream files
    pub inputs: Vec<PathBuf>,

    pub lost_events_policy: LostEventsPolicy,

    /// Skip events timestamped before this value
    pub seek: Option<u64>,

    /// Stop after this many events
    pub limit: Option<u64>,
}

impl CtfConfig {
    pub fn try_from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the configuration file, if any, and apply the command line options on top.
    pub fn load_merge_with_opts(opts: ReaderOpts) -> Result<Self, Error> {
        let cfg = if let Some(cfg_path) = &opts.config_file {
            Self::try_from_file(cfg_path)?
        } else if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
            Self::try_from_file(Path::new(&env_path))?
        } else {
            Self::default()
        };

        Ok(Self {
            schema: opts.schema.or(cfg.schema),
            inputs: cfg.inputs,
            lost_events_policy: opts.lost_events_policy.unwrap_or(cfg.lost_events_policy),
            seek: opts.seek.or(cfg.seek),
            limit: opts.limit.or(cfg.limit),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{env, fs::File, io::Write};

    const CONFIG: &str = r#"
schema = 'trace/schema.toml'
inputs = ['trace/stream_0', 'trace/stream_1']
lost-events-policy = 'error'
seek = 1000
limit = 25
"#;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("my_config.toml");
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        path
    }

    #[test]
    fn reader_cfg() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), CONFIG);

        let cfg = CtfConfig::load_merge_with_opts(ReaderOpts {
            config_file: Some(path.to_path_buf()),
            ..Default::default()
        })
        .unwrap();

        env::set_var(CONFIG_ENV_VAR, &path);
        let env_cfg = CtfConfig::load_merge_with_opts(Default::default()).unwrap();
        env::remove_var(CONFIG_ENV_VAR);
        assert_eq!(cfg, env_cfg);

        assert_eq!(
            cfg,
            CtfConfig {
                schema: PathBuf::from("trace/schema.toml").into(),
                inputs: vec![
                    PathBuf::from("trace/stream_0"),
                    PathBuf::from("trace/stream_1")
                ],
                lost_events_policy: LostEventsPolicy::Error,
                seek: Some(1000),
                limit: Some(25),
            }
        );
    }

    #[test]
    fn opts_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), CONFIG);

        let cfg = CtfConfig::load_merge_with_opts(ReaderOpts {
            config_file: Some(path),
            schema: PathBuf::from("other.toml").into(),
            lost_events_policy: LostEventsPolicy::Clamp.into(),
            seek: None,
            limit: Some(3),
        })
        .unwrap();
        assert_eq!(cfg.schema, Some(PathBuf::from("other.toml")));
        assert_eq!(cfg.lost_events_policy, LostEventsPolicy::Clamp);
        assert_eq!(cfg.seek, Some(1000));
        assert_eq!(cfg.limit, Some(3));
        assert_eq!(cfg.inputs.len(), 2);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "limit = 1\n");

        let cfg = CtfConfig::load_merge_with_opts(ReaderOpts {
            config_file: Some(path),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            cfg,
            CtfConfig {
                limit: Some(1),
                ..Default::default()
            }
        );
    }

    #[test]
    fn invalid_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "lost-events-policy = 'ignore'\n");
        let res = CtfConfig::try_from_file(&path);
        assert!(matches!(res, Err(Error::Schema(_))));
    }
}
