use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use std::{ffi::OsStr, path::Path};

/// Read a YAML file into a type safe configuration struct. Every config
/// in the ground station is loaded through here so that a missing or
/// malformed file is reported the same way everywhere.
///
/// * `filepath`: Path to file with configuration parameters.
pub fn from_yaml_file<T, F>(filepath: F) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
    F: AsRef<OsStr>,
{
    let file = Path::new(&filepath);
    if !file.is_file() {
        return Err(ConfigError::Missing(file.to_path_buf()));
    }

    let config_file = config::Config::builder()
        .add_source(config::File::new(
            &file.to_string_lossy(),
            config::FileFormat::Yaml,
        ))
        .build()?;

    Ok(config_file.try_deserialize::<T>()?)
}
