//! Result files: naming, JSON writing and loading.
//!
//! Models are stored as `rarepose.models.v1`:
//!
//! ```json
//! { "schema": "rarepose.models.v1",
//!   "models": [ { "bone": 0, "model": { "theta": 0.1, "phi": 1.2, ... } } ] }
//! ```
//!
//! Rareness results are a plain array of `{label, metadata, score}`.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::distribution::DirectionalModel;
use crate::error::{Error, Result};
use crate::fitting::BoneModels;
use crate::scoring::RarenessRecord;

const MODELS_SCHEMA_V1: &str = "rarepose.models.v1";

const TIMESTAMP_FORMAT: &str = "%y%m%d%H%M%S";

/// Local time formatted as `yymmddHHMMSS`; one per pipeline invocation.
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Output files of one invocation, sharing a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// `fb8_res_<ts>.json` / `fb8_res_toy_<ts>.json`.
    pub models: PathBuf,
    /// `rareness_<ts>.json` / `rareness_toy_<ts>.json`.
    pub rareness: PathBuf,
}

impl OutputPaths {
    pub fn new(res_dir: &Path, timestamp: &str, toy: bool) -> Self {
        let marker = if toy { "toy_" } else { "" };
        Self {
            models: res_dir.join(format!("fb8_res_{marker}{timestamp}.json")),
            rareness: res_dir.join(format!("rareness_{marker}{timestamp}.json")),
        }
    }
}

#[derive(Serialize)]
struct BoneModelRef<'a, M> {
    bone: usize,
    model: &'a M,
}

#[derive(Serialize)]
struct ModelFileRef<'a, M> {
    schema: &'static str,
    models: Vec<BoneModelRef<'a, M>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BoneModelEntry<M> {
    bone: usize,
    model: M,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelFileV1<M> {
    schema: String,
    models: Vec<BoneModelEntry<M>>,
}

/// Serialize `value` as pretty JSON into a new file, creating parent
/// directories. The file is closed before returning.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    let file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| Error::json(path, e))?;
    writer.flush().map_err(|e| Error::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| Error::json(path, e))
}

/// Write a model collection as `rarepose.models.v1`.
pub fn save_models<M: Serialize>(path: &Path, models: &BoneModels<M>) -> Result<()> {
    let file = ModelFileRef {
        schema: MODELS_SCHEMA_V1,
        models: models
            .iter()
            .map(|(bone, model)| BoneModelRef { bone, model })
            .collect(),
    };
    write_json(path, &file)
}

/// Read a model collection written by [`save_models`].
///
/// Every model is checked with [`DirectionalModel::validate`]; invalid
/// parameters are a format error.
pub fn load_models<M: DeserializeOwned + DirectionalModel>(path: &Path) -> Result<BoneModels<M>> {
    let file: ModelFileV1<M> = read_json(path)?;
    if file.schema != MODELS_SCHEMA_V1 {
        return Err(Error::Format {
            path: path.to_path_buf(),
            message: format!(
                "unsupported models schema '{}' (expected '{}')",
                file.schema, MODELS_SCHEMA_V1
            ),
        });
    }
    let mut models = BoneModels::new();
    for entry in file.models {
        entry.model.validate().map_err(|message| Error::Format {
            path: path.to_path_buf(),
            message: format!("invalid model for bone {}: {}", entry.bone, message),
        })?;
        if models.insert(entry.bone, entry.model).is_some() {
            return Err(Error::Format {
                path: path.to_path_buf(),
                message: format!("duplicate model for bone {}", entry.bone),
            });
        }
    }
    Ok(models)
}

/// Read a rareness results file.
pub fn load_rareness(path: &Path) -> Result<Vec<RarenessRecord>> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{Fb8Distribution, Fb8Params};
    use approx::assert_relative_eq;

    #[test]
    fn file_names_follow_toy_flag() {
        let dir = Path::new("res");
        let prod = OutputPaths::new(dir, "240131120000", false);
        assert_eq!(prod.models, PathBuf::from("res/fb8_res_240131120000.json"));
        assert_eq!(prod.rareness, PathBuf::from("res/rareness_240131120000.json"));
        let toy = OutputPaths::new(dir, "240131120000", true);
        assert_eq!(toy.models, PathBuf::from("res/fb8_res_toy_240131120000.json"));
        assert_eq!(toy.rareness, PathBuf::from("res/rareness_toy_240131120000.json"));
    }

    #[test]
    fn timestamp_has_twelve_digits() {
        let ts = timestamp();
        assert_eq!(ts.len(), 12);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }

    fn kent(kappa: f64, beta: f64) -> Fb8Distribution {
        Fb8Distribution::new(Fb8Params::kent(0.4, 1.0, 0.3, kappa, beta))
    }

    #[test]
    fn models_round_trip_and_schema_check() {
        let dir = std::env::temp_dir().join(format!("rarepose-output-{}", std::process::id()));
        let path = dir.join("models.json");
        let models: BoneModels<Fb8Distribution> =
            vec![(0, kent(12.0, 3.0)), (4, kent(40.0, 0.5))].into_iter().collect();
        save_models(&path, &models).unwrap();
        let back: BoneModels<Fb8Distribution> = load_models(&path).unwrap();
        assert_eq!(back.bones().collect::<Vec<_>>(), vec![0, 4]);
        for (bone, model) in back.iter() {
            let saved = models.get(bone).unwrap();
            assert_relative_eq!(model.kappa(), saved.kappa(), max_relative = 1e-15);
            assert_relative_eq!(model.beta(), saved.beta(), max_relative = 1e-15);
        }

        std::fs::write(&path, r#"{"schema": "other", "models": []}"#).unwrap();
        let err = load_models::<Fb8Distribution>(&path).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));

        let entry = |bone: usize| {
            format!(
                r#"{{"bone": {bone}, "model": {{"theta": 0.1, "phi": 0.2, "psi": 0.3, "kappa": 5.0, "beta": 1.0, "eta": 1.0, "alpha": 0.0, "rho": 0.0}}}}"#
            )
        };
        std::fs::write(
            &path,
            format!(r#"{{"schema": "rarepose.models.v1", "models": [{}, {}]}}"#, entry(1), entry(1)),
        )
        .unwrap();
        let err = load_models::<Fb8Distribution>(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate model for bone 1"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn invalid_parameters_are_rejected_on_load() {
        let dir = std::env::temp_dir().join(format!("rarepose-invalid-{}", std::process::id()));
        let path = dir.join("models.json");
        let cases = [
            ("kappa", -1.0, "kappa must be >= 0"),
            ("beta", -0.5, "beta must be >= 0"),
            ("eta", 1.5, "eta must lie in [-1, 1]"),
        ];
        for (field, value, expected) in cases {
            let mut params = serde_json::json!({
                "theta": 0.1, "phi": 0.2, "psi": 0.3, "kappa": 5.0,
                "beta": 1.0, "eta": 1.0, "alpha": 0.0, "rho": 0.0
            });
            params[field] = serde_json::json!(value);
            let file = serde_json::json!({
                "schema": "rarepose.models.v1",
                "models": [{"bone": 2, "model": params}]
            });
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(&path, file.to_string()).unwrap();

            let err = load_models::<Fb8Distribution>(&path).unwrap_err();
            assert!(matches!(err, Error::Format { .. }), "{field}: {err}");
            let message = err.to_string();
            assert!(message.contains("invalid model for bone 2"), "{message}");
            assert!(message.contains(expected), "{message}");
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}
