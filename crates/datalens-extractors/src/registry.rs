//! Name-based construction of feature extractors from configuration.
//!
//! A configuration entry is either a bare name or a single-key mapping from
//! name to parameters:
//!
//! ```json
//! ["images_average_brightness", {"count_small_objects": {"percent_of_an_image": 5}}]
//! ```
//!
//! Names are matched after normalization (case, `_`, `-` and spaces are
//! ignored), so `CountSmallObjects` and `count-small-objects` both resolve.
//! An unknown name fails with the full list of valid names and, when one is
//! close enough, a suggestion.
//!
//! # Examples
//!
//! ```
//! use datalens_extractors::{
//!     FeatureExtractor as _,
//!     registry::{BuildContext, ExtractorRegistry, ExtractorSpec},
//! };
//!
//! let registry = ExtractorRegistry::with_builtin();
//! let ctx = BuildContext::new(3, vec![]);
//! let spec: ExtractorSpec = serde_json::from_str(r#""CountSmallObjects""#)?;
//! let extractor = registry.build(&spec, &ctx)?;
//! assert_eq!(extractor.type_name(), "CountSmallObjects");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    BoxedFeatureExtractor,
    common::ImagesAverageBrightness,
    segmentation::{AppearancesInImages, CountSmallObjects, ObjectsCenterOfMass},
};

/// Minimum similarity score (0-100) for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display(
        "Unknown object type: {name} in configuration. valid types are: [{}]{}",
        choices.join(", "),
        did_you_mean(suggestion.as_deref())
    )]
    UnknownType {
        name: String,
        choices: Vec<String>,
        suggestion: Option<String>,
    },
    #[display(
        "extractor entry must map exactly one name to its parameters, got {} keys: [{}]",
        keys.len(),
        keys.join(", ")
    )]
    Malformed { keys: Vec<String> },
    #[display("invalid parameters for {name}: {message}")]
    InvalidParameters { name: String, message: String },
}

fn did_you_mean(suggestion: Option<&str>) -> String {
    suggestion
        .map(|s| format!("\n Did you mean: {s}?"))
        .unwrap_or_default()
}

/// One entry of an extractor list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractorSpec {
    Name(String),
    WithParams(serde_json::Map<String, serde_json::Value>),
}

impl ExtractorSpec {
    /// Splits the entry into its name and parameters (`null` for a bare name).
    pub fn name_and_params(&self) -> Result<(&str, &serde_json::Value), ConfigError> {
        static NULL: serde_json::Value = serde_json::Value::Null;
        match self {
            ExtractorSpec::Name(name) => Ok((name, &NULL)),
            ExtractorSpec::WithParams(map) => {
                let mut iter = map.iter();
                match (iter.next(), iter.next()) {
                    (Some((name, params)), None) => Ok((name, params)),
                    _ => Err(ConfigError::Malformed {
                        keys: map.keys().cloned().collect(),
                    }),
                }
            }
        }
    }
}

impl From<&str> for ExtractorSpec {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

/// Dataset facts every extractor may need at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildContext {
    pub number_of_classes: usize,
    pub ignore_labels: Vec<u8>,
    /// Top of the pixel value range shared by every image of the dataset.
    pub pixel_max: f64,
}

impl BuildContext {
    /// Pixel range top for 8-bit data.
    pub const DEFAULT_PIXEL_MAX: f64 = 255.0;

    #[must_use]
    pub fn new(number_of_classes: usize, ignore_labels: Vec<u8>) -> Self {
        Self {
            number_of_classes,
            ignore_labels,
            pixel_max: Self::DEFAULT_PIXEL_MAX,
        }
    }

    #[must_use]
    pub fn with_pixel_max(mut self, pixel_max: f64) -> Self {
        self.pixel_max = pixel_max;
        self
    }
}

pub type ExtractorConstructor =
    fn(&BuildContext, &serde_json::Value) -> Result<BoxedFeatureExtractor, ConfigError>;

#[derive(Debug, Clone)]
struct Entry {
    name: &'static str,
    constructor: ExtractorConstructor,
}

/// Maps configuration names to extractor constructors.
#[derive(Debug, Clone, Default)]
pub struct ExtractorRegistry {
    entries: BTreeMap<String, Entry>,
}

impl ExtractorRegistry {
    /// Returns an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a registry holding every built-in extractor.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("images_average_brightness", build_brightness);
        registry.register("count_small_objects", build_small_objects);
        registry.register("objects_center_of_mass", build_center_of_mass);
        registry.register("appearances_in_images", build_appearances);
        registry
    }

    /// Registers `constructor` under `name`, replacing any previous entry
    /// with the same normalized name.
    pub fn register(&mut self, name: &'static str, constructor: ExtractorConstructor) {
        self.entries
            .insert(normalize(name), Entry { name, constructor });
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.values().map(|e| e.name)
    }

    /// Builds one extractor.
    pub fn build(
        &self,
        spec: &ExtractorSpec,
        ctx: &BuildContext,
    ) -> Result<BoxedFeatureExtractor, ConfigError> {
        let (name, params) = spec.name_and_params()?;
        let entry = self
            .entries
            .get(&normalize(name))
            .ok_or_else(|| self.unknown_type(name))?;
        (entry.constructor)(ctx, params)
    }

    /// Builds every entry of `specs`, in order.
    pub fn build_all(
        &self,
        specs: &[ExtractorSpec],
        ctx: &BuildContext,
    ) -> Result<Vec<BoxedFeatureExtractor>, ConfigError> {
        specs.iter().map(|spec| self.build(spec, ctx)).collect()
    }

    fn unknown_type(&self, name: &str) -> ConfigError {
        let normalized = normalize(name);
        let suggestion = self
            .entries
            .iter()
            .map(|(key, entry)| (strsim::normalized_levenshtein(&normalized, key) * 100.0, entry))
            .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, entry)| entry.name.to_owned());
        ConfigError::UnknownType {
            name: name.to_owned(),
            choices: self.names().map(str::to_owned).collect(),
            suggestion,
        }
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Decodes `params` into `T`, treating `null` as "all defaults".
fn parse_params<T>(name: &str, params: &serde_json::Value) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).map_err(|e| ConfigError::InvalidParameters {
        name: name.to_owned(),
        message: e.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct SmallObjectsParams {
    percent_of_an_image: f64,
}

impl Default for SmallObjectsParams {
    fn default() -> Self {
        Self {
            percent_of_an_image: CountSmallObjects::DEFAULT_PERCENT,
        }
    }
}

fn build_brightness(
    ctx: &BuildContext,
    params: &serde_json::Value,
) -> Result<BoxedFeatureExtractor, ConfigError> {
    let name = "images_average_brightness";
    let NoParams {} = parse_params(name, params)?;
    if !ImagesAverageBrightness::is_valid_pixel_max(ctx.pixel_max) {
        return Err(ConfigError::InvalidParameters {
            name: name.to_owned(),
            message: format!("pixel_max must be finite and positive, got {}", ctx.pixel_max),
        });
    }
    Ok(Box::new(ImagesAverageBrightness::new(ctx.pixel_max)))
}

fn build_small_objects(
    _ctx: &BuildContext,
    params: &serde_json::Value,
) -> Result<BoxedFeatureExtractor, ConfigError> {
    let name = "count_small_objects";
    let SmallObjectsParams {
        percent_of_an_image,
    } = parse_params(name, params)?;
    if !CountSmallObjects::is_valid_percent(percent_of_an_image) {
        return Err(ConfigError::InvalidParameters {
            name: name.to_owned(),
            message: format!("percent_of_an_image must be in (0, 100], got {percent_of_an_image}"),
        });
    }
    Ok(Box::new(CountSmallObjects::new(percent_of_an_image)))
}

fn build_center_of_mass(
    ctx: &BuildContext,
    params: &serde_json::Value,
) -> Result<BoxedFeatureExtractor, ConfigError> {
    let NoParams {} = parse_params("objects_center_of_mass", params)?;
    Ok(Box::new(ObjectsCenterOfMass::new(
        ctx.number_of_classes,
        &ctx.ignore_labels,
    )))
}

fn build_appearances(
    ctx: &BuildContext,
    params: &serde_json::Value,
) -> Result<BoxedFeatureExtractor, ConfigError> {
    let NoParams {} = parse_params("appearances_in_images", params)?;
    Ok(Box::new(AppearancesInImages::new(
        ctx.number_of_classes,
        &ctx.ignore_labels,
    )))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::FeatureExtractor as _;

    fn ctx() -> BuildContext {
        BuildContext::new(3, vec![])
    }

    fn spec(value: serde_json::Value) -> ExtractorSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_builds_in_order() {
        let registry = ExtractorRegistry::with_builtin();
        let specs = [
            spec(json!("objects_center_of_mass")),
            spec(json!({"count_small_objects": {"percent_of_an_image": 5}})),
            spec(json!("ImagesAverageBrightness")),
        ];
        let extractors = registry.build_all(&specs, &ctx()).unwrap();
        let names = extractors.iter().map(|e| e.type_name()).collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                "ObjectsCenterOfMass",
                "CountSmallObjects",
                "ImagesAverageBrightness"
            ]
        );
    }

    #[test]
    fn test_unknown_name_with_suggestion() {
        let mut registry = ExtractorRegistry::new();
        registry.register("blur", build_brightness);
        registry.register("count_small_objects", build_small_objects);

        let Err(err) = registry.build(&"blurr".into(), &ctx()) else {
            panic!("expected an error");
        };
        let ConfigError::UnknownType {
            name,
            choices,
            suggestion,
        } = &err
        else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(name, "blurr");
        assert_eq!(choices, &["blur", "count_small_objects"]);
        assert_eq!(suggestion.as_deref(), Some("blur"));
        assert!(err.to_string().starts_with(
            "Unknown object type: blurr in configuration. valid types are: [blur, count_small_objects]"
        ));
        assert!(err.to_string().ends_with("\n Did you mean: blur?"));
    }

    #[test]
    fn test_suggests_registered_name_for_shorter_request() {
        let mut registry = ExtractorRegistry::new();
        registry.register("blurr", build_brightness);

        let Err(err) = registry.build(&"blur".into(), &ctx()) else {
            panic!("expected an error");
        };
        assert!(matches!(
            &err,
            ConfigError::UnknownType { suggestion: Some(s), .. } if s == "blurr"
        ));
        assert_eq!(
            err.to_string(),
            "Unknown object type: blur in configuration. valid types are: [blurr]\n Did you mean: blurr?"
        );
    }

    #[test]
    fn test_display_of_other_errors() {
        let malformed = ConfigError::Malformed {
            keys: vec!["a".to_owned(), "b".to_owned()],
        };
        assert_eq!(
            malformed.to_string(),
            "extractor entry must map exactly one name to its parameters, got 2 keys: [a, b]"
        );
        let invalid = ConfigError::InvalidParameters {
            name: "count_small_objects".to_owned(),
            message: "bad".to_owned(),
        };
        assert_eq!(
            invalid.to_string(),
            "invalid parameters for count_small_objects: bad"
        );
    }

    #[test]
    fn test_brightness_rejects_bad_pixel_max() {
        let registry = ExtractorRegistry::with_builtin();
        let Err(err) = registry.build(
            &"images_average_brightness".into(),
            &ctx().with_pixel_max(0.0),
        ) else {
            panic!("expected an error");
        };
        assert!(matches!(err, ConfigError::InvalidParameters { .. }));
        assert!(
            registry
                .build(&"images_average_brightness".into(), &ctx().with_pixel_max(1.0))
                .is_ok()
        );
    }

    #[test]
    fn test_unknown_name_without_suggestion() {
        let registry = ExtractorRegistry::with_builtin();
        let Err(err) = registry.build(&"histogram_of_gradients".into(), &ctx()) else {
            panic!("expected an error");
        };
        assert!(matches!(
            err,
            ConfigError::UnknownType {
                suggestion: None,
                ..
            }
        ));
        assert!(!err.to_string().contains("Did you mean"));
    }

    #[test]
    fn test_malformed_entries() {
        let registry = ExtractorRegistry::with_builtin();
        for value in [json!({}), json!({"a": null, "b": null})] {
            let Err(err) = registry.build(&spec(value), &ctx()) else {
                panic!("expected an error");
            };
            assert!(matches!(err, ConfigError::Malformed { .. }));
        }
    }

    #[test]
    fn test_invalid_parameters() {
        let registry = ExtractorRegistry::with_builtin();
        for value in [
            json!({"count_small_objects": {"percent_of_an_image": 0}}),
            json!({"count_small_objects": {"percent_of_an_image": 150}}),
            json!({"count_small_objects": {"percent": 5}}),
            json!({"objects_center_of_mass": {"bins": 5}}),
        ] {
            let Err(err) = registry.build(&spec(value.clone()), &ctx()) else {
                panic!("expected an error for {value}");
            };
            assert!(
                matches!(err, ConfigError::InvalidParameters { .. }),
                "{value}: {err}"
            );
        }
    }

    #[test]
    fn test_names_are_normalized() {
        let registry = ExtractorRegistry::with_builtin();
        for name in ["count_small_objects", "CountSmallObjects", "count-small-objects"] {
            assert_eq!(
                registry.build(&name.into(), &ctx()).unwrap().type_name(),
                "CountSmallObjects"
            );
        }
    }
}
