use anyhow::Result;
use busloader_config::{codegen::generate_modules, Configuration};
use std::env;

fn main() -> Result<()> { process_configuration_file() }

fn process_configuration_file() -> Result<()> {
    println!("cargo:rerun-if-env-changed=BUSLOADER_CONFIG");

    // An empty or missing configuration selects the defaults, which is
    // what unit tests and host builds rely on.
    let configuration: Configuration = match env::var("BUSLOADER_CONFIG") {
        Ok(config) if !config.trim().is_empty() => {
            let configuration = ron::from_str(&config)?;
            validate_feature_flags_against_configuration(&configuration);
            configuration
        }
        _ => Configuration::default(),
    };

    generate_modules(env::var("OUT_DIR")?, &configuration)?;
    Ok(())
}

fn validate_feature_flags_against_configuration(configuration: &Configuration) {
    let supplied_flags: Vec<_> = env::vars()
        .filter_map(|(k, _)| Some(k.strip_prefix("CARGO_FEATURE_")?.to_lowercase()))
        .collect();

    let missing_flags: Vec<_> = configuration
        .required_feature_flags()
        .map(|s| s.replace('-', "_"))
        .filter(|f| !supplied_flags.contains(f))
        .collect();

    if configuration.required_feature_flags().next().is_none()
        && supplied_flags.contains(&"ecdsa_verify".to_owned())
    {
        panic!(
            "Configuration mismatch. Configuration file does not specify ECDSA security mode, \
             but the `ecdsa-verify` flag was supplied. Try again without `ecdsa-verify` for CRC mode."
        );
    }

    if !missing_flags.is_empty() {
        panic!(
            "\n\nThe configuration file requires flags that haven't been supplied. \
            Please build again with `--features={}`\n\n",
            missing_flags.join(",").replace('_', "-"),
        );
    }
}
