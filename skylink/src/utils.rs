/// Loading and validating YAML configuration files.
pub mod config;
