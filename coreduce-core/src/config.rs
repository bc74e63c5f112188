use std::collections::HashMap;

use crate::error::{Error, Result};

const DEFAULT_OPERATOR_NAME: &str = "co-reduce";
const DEFAULT_INPUT_BUFFER_SIZE: usize = 500;

const ENV_OPERATOR_NAME: &str = "COREDUCE_OPERATOR_NAME";
const ENV_INPUT_BUFFER_SIZE: &str = "COREDUCE_INPUT_BUFFER_SIZE";

/// Configurations of a co-reduce operator.
#[derive(Debug, Clone, PartialEq)]
pub struct CoReduceConfig {
    /// name of the operator, used for logs and metric labels.
    pub name: String,
    /// capacity of each of the two input channels of the driver.
    pub input_buffer_size: usize,
}

impl Default for CoReduceConfig {
    fn default() -> Self {
        CoReduceConfig {
            name: DEFAULT_OPERATOR_NAME.to_string(),
            input_buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
        }
    }
}

impl CoReduceConfig {
    /// Loads the config from the given environment variables, unset variables fall back to the
    /// defaults.
    pub fn load(
        env_vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<Self> {
        let env_vars: HashMap<String, String> = env_vars
            .into_iter()
            .map(|(key, val)| (key.into(), val.into()))
            .filter(|(key, _val)| [ENV_OPERATOR_NAME, ENV_INPUT_BUFFER_SIZE].contains(&key.as_str()))
            .collect();

        let mut config = CoReduceConfig::default();

        if let Some(name) = env_vars.get(ENV_OPERATOR_NAME) {
            if name.trim().is_empty() {
                return Err(Error::Config(format!("{ENV_OPERATOR_NAME} cannot be empty")));
            }
            config.name = name.clone();
        }

        if let Some(size) = env_vars.get(ENV_INPUT_BUFFER_SIZE) {
            let size: usize = size.parse().map_err(|e| {
                Error::Config(format!("Invalid {ENV_INPUT_BUFFER_SIZE} value {size:?}: {e}"))
            })?;
            if size == 0 {
                return Err(Error::Config(format!(
                    "{ENV_INPUT_BUFFER_SIZE} must be greater than 0"
                )));
            }
            config.input_buffer_size = size;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let config = CoReduceConfig::load(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config, CoReduceConfig::default());
        assert_eq!(config.name, "co-reduce");
        assert_eq!(config.input_buffer_size, 500);
    }

    #[test]
    fn test_load_from_env() {
        let env_vars = [
            (ENV_OPERATOR_NAME, "orders-join"),
            (ENV_INPUT_BUFFER_SIZE, "64"),
            ("UNRELATED", "ignored"),
        ];
        let config = CoReduceConfig::load(env_vars).unwrap();
        assert_eq!(config.name, "orders-join");
        assert_eq!(config.input_buffer_size, 64);
    }

    #[test]
    fn test_load_invalid_buffer_size() {
        let result = CoReduceConfig::load([(ENV_INPUT_BUFFER_SIZE, "lots")]);
        assert!(matches!(result, Err(Error::Config(_))));

        let result = CoReduceConfig::load([(ENV_INPUT_BUFFER_SIZE, "0")]);
        assert_eq!(
            result,
            Err(Error::Config(
                "COREDUCE_INPUT_BUFFER_SIZE must be greater than 0".to_string()
            ))
        );
    }

    #[test]
    fn test_load_empty_name() {
        let result = CoReduceConfig::load([(ENV_OPERATOR_NAME, " ")]);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
