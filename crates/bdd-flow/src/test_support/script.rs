//! Declarative spec files understood by the scripted engine.

use std::fmt;
use std::rc::Rc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::RegistrationError;
use crate::keyword::StepKeyword;
use crate::registration::RegistrationContext;

/// Variant title used for scenarios scripted without variants.
pub const DEFAULT_VARIANT: &str = "default";

/// Step and hook definitions a spec file registers when it is loaded.
pub type Definitions = Rc<dyn Fn(&RegistrationContext) -> Result<(), RegistrationError>>;

/// A spec file: its definitions plus the features it describes.
#[derive(Clone)]
pub struct SpecFile {
    path: Utf8PathBuf,
    definitions: Option<Definitions>,
    features: Vec<FeatureScript>,
}

impl SpecFile {
    /// Creates an empty spec file.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            definitions: None,
            features: Vec::new(),
        }
    }

    /// Sets the definitions registered when the file is loaded.
    #[must_use]
    pub fn with_definitions(
        mut self,
        definitions: impl Fn(&RegistrationContext) -> Result<(), RegistrationError> + 'static,
    ) -> Self {
        self.definitions = Some(Rc::new(definitions));
        self
    }

    /// Appends a feature.
    #[must_use]
    pub fn with_feature(mut self, feature: FeatureScript) -> Self {
        self.features.push(feature);
        self
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub(crate) fn definitions(&self) -> Option<&Definitions> {
        self.definitions.as_ref()
    }

    pub(crate) fn features(&self) -> &[FeatureScript] {
        &self.features
    }
}

impl fmt::Debug for SpecFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecFile")
            .field("path", &self.path)
            .field("has_definitions", &self.definitions.is_some())
            .field("features", &self.features)
            .finish()
    }
}

/// A scripted feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureScript {
    title: String,
    scenarios: Vec<ScenarioScript>,
}

impl FeatureScript {
    /// Creates a feature with no scenarios.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            scenarios: Vec::new(),
        }
    }

    /// Appends a scenario.
    #[must_use]
    pub fn with_scenario(mut self, scenario: ScenarioScript) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Returns the feature title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the scenarios.
    #[must_use]
    pub fn scenarios(&self) -> &[ScenarioScript] {
        &self.scenarios
    }
}

/// A scripted scenario with its variants and steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioScript {
    title: String,
    variants: Vec<String>,
    steps: Vec<(StepKeyword, String)>,
    reported_failed: bool,
}

impl ScenarioScript {
    /// Creates a scenario with no variants and no steps.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            variants: Vec::new(),
            steps: Vec::new(),
            reported_failed: false,
        }
    }

    /// Appends a variant.
    #[must_use]
    pub fn with_variant(mut self, title: impl Into<String>) -> Self {
        self.variants.push(title.into());
        self
    }

    /// Appends a step.
    #[must_use]
    pub fn with_step(mut self, keyword: StepKeyword, title: impl Into<String>) -> Self {
        self.steps.push((keyword, title.into()));
        self
    }

    /// Makes the engine report every variant as failed, whatever its steps
    /// do.
    #[must_use]
    pub fn reported_failed(mut self) -> Self {
        self.reported_failed = true;
        self
    }

    /// Returns the scenario title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the variant titles, or [`DEFAULT_VARIANT`] when none were
    /// scripted.
    #[must_use]
    pub fn variant_titles(&self) -> Vec<&str> {
        if self.variants.is_empty() {
            vec![DEFAULT_VARIANT]
        } else {
            self.variants.iter().map(String::as_str).collect()
        }
    }

    pub(crate) fn steps(&self) -> &[(StepKeyword, String)] {
        &self.steps
    }

    pub(crate) fn is_reported_failed(&self) -> bool {
        self.reported_failed
    }
}
