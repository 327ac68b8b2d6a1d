//! Step keywords and lifecycle hook names exposed by the registration
//! context.

use std::fmt;
use std::str::FromStr;

/// Keyword a step body is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepKeyword {
    /// Setup preconditions for a scenario.
    Given,
    /// Perform an action when testing behaviour.
    When,
    /// Assert the expected outcome of a scenario.
    Then,
    /// Additional conditions sharing context with the previous step.
    And,
    /// Negative or contrasting conditions.
    But,
}

impl StepKeyword {
    /// Every step keyword, in the order the registration context exposes them.
    pub const ALL: [Self; 5] = [Self::Given, Self::When, Self::Then, Self::And, Self::But];

    /// Returns the registration function name for the keyword.
    ///
    /// # Examples
    ///
    /// ```
    /// use bdd_flow::StepKeyword;
    ///
    /// assert_eq!(StepKeyword::Given.as_str(), "given");
    /// assert_eq!(StepKeyword::But.as_str(), "but");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Given => "given",
            Self::When => "when",
            Self::Then => "then",
            Self::And => "and",
            Self::But => "but",
        }
    }
}

impl fmt::Display for StepKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a keyword or hook name fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordParseError(pub String);

impl fmt::Display for KeywordParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid keyword: {}", self.0)
    }
}

impl std::error::Error for KeywordParseError {}

impl FromStr for StepKeyword {
    type Err = KeywordParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|keyword| trimmed.eq_ignore_ascii_case(keyword.as_str()))
            .ok_or_else(|| KeywordParseError(trimmed.to_string()))
    }
}

/// Lifecycle hook a body can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookKind {
    /// Runs once before every feature.
    BeforeAll,
    /// Runs before each feature.
    BeforeFeature,
    /// Runs before each scenario of the enclosing feature.
    BeforeEachScenario,
    /// Runs before the enclosing scenario.
    BeforeScenario,
    /// Runs before each variant of the enclosing scenario.
    BeforeEachVariant,
    /// Runs once after every feature.
    AfterAll,
    /// Runs after each feature.
    AfterFeature,
    /// Runs after each scenario of the enclosing feature.
    AfterEachScenario,
    /// Runs after the enclosing scenario.
    AfterScenario,
    /// Runs after each variant of the enclosing scenario.
    AfterEachVariant,
}

impl HookKind {
    /// Every hook name, in the order the registration context exposes them.
    pub const ALL: [Self; 10] = [
        Self::BeforeAll,
        Self::BeforeFeature,
        Self::BeforeEachScenario,
        Self::BeforeScenario,
        Self::BeforeEachVariant,
        Self::AfterAll,
        Self::AfterFeature,
        Self::AfterEachScenario,
        Self::AfterScenario,
        Self::AfterEachVariant,
    ];

    /// Returns the registration function name for the hook.
    ///
    /// # Examples
    ///
    /// ```
    /// use bdd_flow::HookKind;
    ///
    /// assert_eq!(HookKind::BeforeEachVariant.as_str(), "beforeEachVariant");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeAll => "beforeAll",
            Self::BeforeFeature => "beforeFeature",
            Self::BeforeEachScenario => "beforeEachScenario",
            Self::BeforeScenario => "beforeScenario",
            Self::BeforeEachVariant => "beforeEachVariant",
            Self::AfterAll => "afterAll",
            Self::AfterFeature => "afterFeature",
            Self::AfterEachScenario => "afterEachScenario",
            Self::AfterScenario => "afterScenario",
            Self::AfterEachVariant => "afterEachVariant",
        }
    }

    /// Returns `true` for hooks that run before the code they surround.
    #[must_use]
    pub const fn is_before(self) -> bool {
        matches!(
            self,
            Self::BeforeAll
                | Self::BeforeFeature
                | Self::BeforeEachScenario
                | Self::BeforeScenario
                | Self::BeforeEachVariant
        )
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookKind {
    type Err = KeywordParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|hook| hook.as_str() == trimmed)
            .ok_or_else(|| KeywordParseError(trimmed.to_string()))
    }
}
