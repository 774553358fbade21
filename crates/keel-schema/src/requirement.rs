use crate::tokenizer::tokenize;
use crate::types::ComponentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const TYPE_ATTRIBUTE: &str = "type";
pub const VERSION_ATTRIBUTE: &str = "version";
pub const LOCATION_DIRECTIVE: &str = "location";
pub const START_PHASE_DIRECTIVE: &str = "start-phase";

/// Start level of components that are boot artifacts rather than activatable
/// components. Only produced by boot-mode reads.
pub const BOOT_SENTINEL_LEVEL: i32 = -1;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor: {0}")]
    Io(#[from] std::io::Error),
    #[error("descriptor syntax error: unknown start phase '{phase}' on component '{id}'")]
    UnknownStartPhase { id: String, phase: String },
}

/// Activation phase of a component. Closed set; each maps to a start level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StartPhase {
    ServiceEarly,
    Service,
    ServiceLate,
    ContainerEarly,
    Container,
    ContainerLate,
    ApplicationEarly,
    Application,
    ApplicationLate,
    Active,
}

impl StartPhase {
    pub const ALL: [StartPhase; 10] = [
        StartPhase::ServiceEarly,
        StartPhase::Service,
        StartPhase::ServiceLate,
        StartPhase::ContainerEarly,
        StartPhase::Container,
        StartPhase::ContainerLate,
        StartPhase::ApplicationEarly,
        StartPhase::Application,
        StartPhase::ApplicationLate,
        StartPhase::Active,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            StartPhase::ServiceEarly => "SERVICE_EARLY",
            StartPhase::Service => "SERVICE",
            StartPhase::ServiceLate => "SERVICE_LATE",
            StartPhase::ContainerEarly => "CONTAINER_EARLY",
            StartPhase::Container => "CONTAINER",
            StartPhase::ContainerLate => "CONTAINER_LATE",
            StartPhase::ApplicationEarly => "APPLICATION_EARLY",
            StartPhase::Application => "APPLICATION",
            StartPhase::ApplicationLate => "APPLICATION_LATE",
            StartPhase::Active => "ACTIVE",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.tag() == tag)
    }

    pub fn level(self) -> i32 {
        match self {
            StartPhase::ServiceEarly => 9,
            StartPhase::Service => 10,
            StartPhase::ServiceLate => 11,
            StartPhase::ContainerEarly => 13,
            StartPhase::Container => 14,
            StartPhase::ContainerLate => 15,
            StartPhase::ApplicationEarly => 17,
            StartPhase::Application => 18,
            StartPhase::ApplicationLate => 19,
            StartPhase::Active => 20,
        }
    }
}

impl fmt::Display for StartPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Classification carried by the `type` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Placed directly on the boot classpath.
    BootArtifact,
    /// Points at another descriptor whose resolution rolls up.
    FeatureInclusion,
    Ordinary,
    /// An unrecognized `type` value; treated like an ordinary component.
    Unspecified(String),
}

impl ComponentKind {
    pub const BOOT_JAR_TYPE: &'static str = "boot.jar";
    pub const FEATURE_TYPE: &'static str = "osgi.subsystem.feature";
    pub const BUNDLE_TYPE: &'static str = "osgi.bundle";

    pub fn from_type(value: Option<&str>) -> Self {
        match value {
            None | Some(Self::BUNDLE_TYPE) => ComponentKind::Ordinary,
            Some(Self::BOOT_JAR_TYPE) => ComponentKind::BootArtifact,
            Some(Self::FEATURE_TYPE) => ComponentKind::FeatureInclusion,
            Some(other) => ComponentKind::Unspecified(other.to_owned()),
        }
    }

    pub fn type_tag(&self) -> &str {
        match self {
            ComponentKind::BootArtifact => Self::BOOT_JAR_TYPE,
            ComponentKind::FeatureInclusion => Self::FEATURE_TYPE,
            ComponentKind::Ordinary => Self::BUNDLE_TYPE,
            ComponentKind::Unspecified(tag) => tag,
        }
    }
}

/// Parsed attributes of one requirement line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementLine {
    pub id: ComponentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub kind: ComponentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_phase: Option<StartPhase>,
}

impl RequirementLine {
    pub fn new(id: impl Into<ComponentId>) -> Self {
        Self {
            id: id.into(),
            version_range: None,
            location: None,
            kind: ComponentKind::Ordinary,
            start_phase: None,
        }
    }

    #[must_use]
    pub fn with_version_range(mut self, range: &str) -> Self {
        self.version_range = Some(range.to_owned());
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ComponentKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_owned());
        self
    }

    #[must_use]
    pub fn with_start_phase(mut self, phase: StartPhase) -> Self {
        self.start_phase = Some(phase);
        self
    }

    /// Start level derived from the start phase. Boot artifacts get the
    /// sentinel level; components without a phase start at `ACTIVE`.
    pub fn start_level(&self) -> i32 {
        if self.kind == ComponentKind::BootArtifact {
            return BOOT_SENTINEL_LEVEL;
        }
        self.start_phase.unwrap_or(StartPhase::Active).level()
    }
}

/// Render in descriptor grammar; parsing the output yields an equal value.
impl fmt::Display for RequirementLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; {TYPE_ATTRIBUTE}=\"{}\"", self.id, self.kind.type_tag())?;
        if let Some(range) = &self.version_range {
            write!(f, "; {VERSION_ATTRIBUTE}=\"{range}\"")?;
        }
        if let Some(location) = &self.location {
            write!(f, "; {LOCATION_DIRECTIVE}:=\"{location}\"")?;
        }
        if let Some(phase) = self.start_phase {
            write!(f, "; {START_PHASE_DIRECTIVE}:=\"{phase}\"")?;
        }
        Ok(())
    }
}

/// Parse one requirement line (trimmed, continuation comma removed).
///
/// Returns `Ok(None)` for lines that are not multi-attribute lines. The only
/// error is a start phase outside [`StartPhase`].
///
/// `type` and `version` are read only in attribute form and `start-phase`
/// only in directive form; the wrong form is ignored like any unknown token.
/// `location` is accepted in both forms.
pub fn parse_requirement_line(line: &str) -> Result<Option<RequirementLine>, DescriptorError> {
    let Some(tokens) = tokenize(line) else {
        return Ok(None);
    };

    let start_phase = match tokens.directive(START_PHASE_DIRECTIVE) {
        None => None,
        Some(tag) => Some(StartPhase::from_tag(tag.trim()).ok_or_else(|| {
            DescriptorError::UnknownStartPhase {
                id: tokens.id.to_owned(),
                phase: tag.to_owned(),
            }
        })?),
    };

    Ok(Some(RequirementLine {
        id: ComponentId::new(tokens.id),
        version_range: tokens.attribute(VERSION_ATTRIBUTE).map(str::to_owned),
        location: tokens.value(LOCATION_DIRECTIVE).map(str::to_owned),
        kind: ComponentKind::from_type(tokens.attribute(TYPE_ATTRIBUTE)),
        start_phase,
    }))
}
