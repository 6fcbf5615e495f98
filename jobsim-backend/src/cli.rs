use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "jobsim-backend", version, about = "Simulated job processing server")]
pub struct CliArgs {
    /// Path to configuration file (TOML, YAML or JSON).
    #[arg(short = 'c', long = "config", env = "JOBSIM_CONFIG_PATH")]
    pub config_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_flag_forms() {
        let args = CliArgs::try_parse_from(["jobsim-backend", "-c", "a.toml"]).unwrap();
        assert_eq!(args.config_path.as_deref(), Some("a.toml"));

        let args = CliArgs::try_parse_from(["jobsim-backend", "--config=b.yaml"]).unwrap();
        assert_eq!(args.config_path.as_deref(), Some("b.yaml"));
    }
}
