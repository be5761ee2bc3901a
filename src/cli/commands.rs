// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `serve` and `predict`
// and all their configurable flags.
//
// Per-family flag mapping for `train`:
//   rf, et → n_estimators, max_depth
//   gb     → n_estimators, max_depth, learning_rate
//   lr     → C
// `--param key=value` is applied last and wins over the flags.
// Training reads its data and artifact paths from DATA_PATH and
// MODEL_PATH only; there are no flags for them.

use clap::{Args, Subcommand};
use serde_json::{json, Value};

use crate::api::ServeConfig;
use crate::application::train_use_case::TrainConfig;
use crate::infra::{
    model_store::DEFAULT_MODEL_PATH,
    tracking::{DEFAULT_EXPERIMENT, DEFAULT_TRACKING_URI},
};
use crate::ml::model::HyperParams;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a churn model, log it to the tracker and export it
    Train(TrainArgs),

    /// Serve predictions over HTTP
    Serve(ServeArgs),

    /// Score a JSON file of customer records
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Model family: rf, gb, et or lr
    #[arg(long, default_value = "rf")]
    pub model: String,

    #[arg(long, default_value_t = 300)]
    pub n_estimators: usize,

    /// Maximum tree depth (unlimited when omitted)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Shrinkage for gradient boosting
    #[arg(long, default_value_t = 0.05)]
    pub learning_rate: f64,

    /// Inverse regularisation strength for logistic regression
    #[arg(long = "c", default_value_t = 1.0)]
    pub c: f64,

    /// Extra hyperparameter override, e.g. --param min_samples_leaf=5
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, Value)>,

    /// MLflow server URL, or file:<dir> for a local run store
    #[arg(long, env = "MLFLOW_TRACKING_URI", default_value = DEFAULT_TRACKING_URI)]
    pub tracking_uri: String,

    #[arg(long, default_value = DEFAULT_EXPERIMENT)]
    pub experiment: String,
}

impl TrainArgs {
    /// Hyperparameter overrides for the chosen family.
    fn overrides(&self) -> HyperParams {
        let mut params = HyperParams::new();
        match self.model.as_str() {
            "rf" | "et" => {
                params.insert("n_estimators".into(), json!(self.n_estimators));
                params.insert("max_depth".into(), json!(self.max_depth));
            }
            "gb" => {
                params.insert("n_estimators".into(), json!(self.n_estimators));
                params.insert("max_depth".into(), json!(self.max_depth));
                params.insert("learning_rate".into(), json!(self.learning_rate));
            }
            "lr" => {
                params.insert("C".into(), json!(self.c));
            }
            // unknown tokens are rejected by the model factory
            _ => {}
        }
        for (key, value) in &self.params {
            params.insert(key.clone(), value.clone());
        }
        params
    }
}

pub const DEFAULT_DATA_PATH: &str = "dataset/Churn_Modelling.csv";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            params:       a.overrides(),
            model:        a.model,
            data_path:    env_or("DATA_PATH", DEFAULT_DATA_PATH),
            model_path:   env_or("MODEL_PATH", DEFAULT_MODEL_PATH),
            tracking_uri: a.tracking_uri,
            experiment:   a.experiment,
            ..TrainConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: String,

    /// Load the model at start-up instead of on the first request
    #[arg(long)]
    pub preload: bool,
}

impl From<ServeArgs> for ServeConfig {
    fn from(a: ServeArgs) -> Self {
        ServeConfig {
            host:       a.host,
            port:       a.port,
            model_path: a.model_path,
            preload:    a.preload,
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// JSON file shaped like the /predict body: {"data": [...]}
    #[arg(long)]
    pub input: String,

    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: String,
}

/// `key=value`; the value is read as JSON when it parses, else as a string.
fn parse_param(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{s}'"));
    }
    let value = serde_json::from_str(raw.trim()).unwrap_or_else(|_| Value::String(raw.trim().to_string()));
    Ok((key.to_string(), value))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn train_args(argv: &[&str]) -> TrainArgs {
        let mut full = vec!["churn", "train"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Train(args) => args,
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_param_values() {
        assert_eq!(parse_param("n_jobs=4").unwrap(), ("n_jobs".to_string(), json!(4)));
        assert_eq!(parse_param("max_features=sqrt").unwrap(), ("max_features".to_string(), json!("sqrt")));
        assert_eq!(parse_param("max_depth=null").unwrap(), ("max_depth".to_string(), Value::Null));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=3").is_err());
    }

    #[test]
    fn test_rf_gets_trees_and_depth() {
        let cfg: TrainConfig = train_args(&["--model", "rf", "--max-depth", "8"]).into();
        assert_eq!(cfg.params["n_estimators"], json!(300));
        assert_eq!(cfg.params["max_depth"], json!(8));
        assert!(!cfg.params.contains_key("learning_rate"));
    }

    #[test]
    fn test_gb_gets_learning_rate_and_unlimited_depth() {
        let cfg: TrainConfig = train_args(&["--model", "gb"]).into();
        assert_eq!(cfg.params["learning_rate"], json!(0.05));
        assert_eq!(cfg.params["max_depth"], Value::Null);
    }

    #[test]
    fn test_lr_gets_only_c() {
        let cfg: TrainConfig = train_args(&["--model", "lr", "--c", "0.5"]).into();
        assert_eq!(cfg.params.len(), 1);
        assert_eq!(cfg.params["C"], json!(0.5));
    }

    #[test]
    fn test_param_flag_wins() {
        let cfg: TrainConfig =
            train_args(&["--model", "et", "--param", "n_estimators=12", "--param", "bootstrap=true"]).into();
        assert_eq!(cfg.params["n_estimators"], json!(12));
        assert_eq!(cfg.params["bootstrap"], json!(true));
    }

    #[test]
    fn test_train_has_no_path_flags() {
        for flag in ["--data-path", "--model-path"] {
            let parsed = Cli::try_parse_from(["churn", "train", flag, "x.csv"]);
            assert!(parsed.is_err(), "{flag} should be rejected");
        }
    }

    #[test]
    fn test_env_or_falls_back_to_default() {
        assert_eq!(env_or("CHURN_TEST_UNSET_PATH_VAR", DEFAULT_DATA_PATH), DEFAULT_DATA_PATH);
        let cfg: TrainConfig = train_args(&["--model", "rf"]).into();
        assert_eq!(cfg.data_path, env_or("DATA_PATH", DEFAULT_DATA_PATH));
        assert_eq!(cfg.model_path, env_or("MODEL_PATH", DEFAULT_MODEL_PATH));
    }

    #[test]
    fn test_serve_defaults() {
        let cfg: ServeConfig = match Cli::parse_from(["churn", "serve", "--port", "9000"]).command {
            Commands::Serve(args) => args.into(),
            other => panic!("expected serve, got {other:?}"),
        };
        assert_eq!(cfg.port, 9000);
        assert!(!cfg.preload);
    }
}
