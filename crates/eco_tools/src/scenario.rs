//! Scenario loading and playback.
//!
//! A scenario describes one opponent: the match profile at frame 0, timed
//! sightings and profile changes, and the questions to ask the model along
//! the way. Running it drives a model frame by frame exactly as a host would.

use std::path::{Path, PathBuf};

use eco_model::prelude::{
    Frame, MatchSnapshot, ModelConfig, ModelError, Observation, OpponentEconomicModel, Race,
    ResearchKind, UnitCountBound, UnitId, UnitType,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Events or queries out of frame order.
    #[error("Scenario {what} at frame {frame} comes after frame {previous}")]
    OutOfOrder {
        /// `event` or `query`.
        what: &'static str,
        /// The offending frame.
        frame: Frame,
        /// The frame before it.
        previous: Frame,
    },
    /// Failed to save the recorded log.
    #[error("Failed to save observation log: {0}")]
    Record(#[from] ModelError),
}

/// Something that happens at a scenario frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A unit is seen.
    Created {
        /// Unit type.
        unit_type: UnitType,
        /// Identity.
        id: u32,
        /// Creation frame, exact or estimated.
        creation_frame: Frame,
        /// Whether the creation frame is exact.
        #[serde(default)]
        known: bool,
    },
    /// A unit is seen dying at the event frame.
    Destroyed {
        /// Unit type.
        unit_type: UnitType,
        /// Identity.
        id: u32,
    },
    /// A tech is seen researching.
    Researched {
        /// Tech.
        tech: ResearchKind,
        /// Start frame, if known.
        #[serde(default)]
        start_frame: Option<Frame>,
    },
    /// An upgrade level is seen in progress.
    Upgraded {
        /// Upgrade.
        upgrade: ResearchKind,
        /// Level being researched.
        level: u8,
        /// Start frame.
        start_frame: Frame,
    },
    /// The opponent's race becomes known.
    RaceRevealed(Race),
    /// The opponent's completed main base count changes.
    BasesCompleted(usize),
    /// The opponent's geyser is seen without a refinery.
    GeyserScouted,
}

impl From<Observation> for EventKind {
    fn from(observation: Observation) -> Self {
        match observation {
            Observation::UnitCreated {
                unit_type,
                id,
                creation_frame,
                creation_frame_known,
            } => Self::Created {
                unit_type,
                id: id.0,
                creation_frame,
                known: creation_frame_known,
            },
            Observation::UnitDestroyed { unit_type, id, .. } => Self::Destroyed {
                unit_type,
                id: id.0,
            },
            Observation::Researched { item, start_frame } => match (item.level, start_frame) {
                (level, Some(start_frame)) if level > 1 => Self::Upgraded {
                    upgrade: item.kind,
                    level,
                    start_frame,
                },
                _ => Self::Researched {
                    tech: item.kind,
                    start_frame,
                },
            },
        }
    }
}

/// A timed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioEvent {
    /// Frame the event is delivered.
    pub frame: Frame,
    /// What happens.
    pub kind: EventKind,
}

impl ScenarioEvent {
    /// A model observation delivered at `frame`.
    #[must_use]
    pub fn observation(frame: Frame, observation: Observation) -> Self {
        Self {
            frame,
            kind: observation.into(),
        }
    }
}

/// A question for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    /// Whether the model is running.
    Enabled,
    /// Seen and maximum possible count, at a frame or now.
    WorstCase(UnitType, Option<Frame>),
    /// Producers the opponent must have.
    MinimumProducers(UnitType),
    /// Whether the opponent has built a type.
    HasBuilt(UnitType),
    /// Earliest frame the opponent could have started a type.
    EarliestProduction(UnitType),
}

/// A question asked after the update of `frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioQuery {
    /// Frame to ask at.
    pub frame: Frame,
    /// The question.
    pub kind: QueryKind,
}

/// The model's answer to a [`QueryKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryAnswer {
    /// Enabled flag.
    Enabled(bool),
    /// Unit count bound.
    Count(UnitCountBound),
    /// Producer count.
    Producers(usize),
    /// Has-built flag.
    Built(bool),
    /// A frame.
    Frame(Frame),
}

impl std::fmt::Display for QueryAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enabled(flag) | Self::Built(flag) => write!(f, "{flag}"),
            Self::Count(bound) => write!(f, "{} seen, {} possible", bound.observed, bound.max_possible),
            Self::Producers(count) => write!(f, "{count}"),
            Self::Frame(frame) => write!(f, "frame {frame}"),
        }
    }
}

/// A query and what the model said.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuery {
    /// Frame asked at.
    pub frame: Frame,
    /// The question.
    pub query: QueryKind,
    /// The answer.
    pub answer: QueryAnswer,
}

/// An implied unit in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpliedUnit {
    /// Type.
    pub unit_type: UnitType,
    /// Creation frame.
    pub frame: Frame,
}

/// Outcome of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Last frame played.
    pub final_frame: Frame,
    /// Whether the model was still running at the end.
    pub enabled: bool,
    /// Model state hash at the end.
    pub state_hash: u64,
    /// Units the model inferred.
    pub implied_units: Vec<ImpliedUnit>,
    /// Supply buildings the model placed.
    pub supply_buildings: Vec<Frame>,
    /// Every query answer, in order.
    pub answers: Vec<AnsweredQuery>,
}

/// A complete scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Match profile at the first frame.
    #[serde(default)]
    pub profile: MatchSnapshot,
    /// Model constants, if not the defaults.
    #[serde(default)]
    pub config: Option<ModelConfig>,
    /// Timed events, in frame order.
    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
    /// Timed queries, in frame order.
    #[serde(default)]
    pub queries: Vec<ScenarioQuery>,
    /// Last frame to play.
    pub until: Frame,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        let event_frames = self.events.iter().map(|e| ("event", e.frame));
        let query_frames = self.queries.iter().map(|q| ("query", q.frame));
        for frames in [
            event_frames.collect::<Vec<_>>(),
            query_frames.collect::<Vec<_>>(),
        ] {
            for pair in frames.windows(2) {
                let ((_, previous), (what, frame)) = (pair[0], pair[1]);
                if frame < previous {
                    return Err(ScenarioError::OutOfOrder {
                        what,
                        frame,
                        previous,
                    });
                }
            }
        }
        Ok(())
    }

    /// Play the scenario on a fresh model.
    #[must_use]
    pub fn run(&self) -> ScenarioReport {
        let (report, _) = self.play(OpponentEconomicModel::new(self.config()));
        report
    }

    /// Play the scenario and save everything fed to the model to `log_path`.
    pub fn run_recorded(&self, log_path: &Path) -> Result<ScenarioReport, ScenarioError> {
        let model = OpponentEconomicModel::new(self.config()).with_recording();
        let (report, mut model) = self.play(model);
        if let Some(log) = model.take_observation_log() {
            log.save(log_path)?;
            tracing::info!(path = %log_path.display(), entries = log.entries.len(), "Saved observation log");
        }
        Ok(report)
    }

    fn config(&self) -> ModelConfig {
        self.config.clone().unwrap_or_default()
    }

    fn play(&self, mut model: OpponentEconomicModel) -> (ScenarioReport, OpponentEconomicModel) {
        let mut view = self.profile.clone();
        model.initialize(&view);

        let mut events = self.events.iter().peekable();
        let mut queries = self.queries.iter().peekable();
        let mut answers = Vec::with_capacity(self.queries.len());

        for frame in self.profile.frame..=self.until {
            view.frame = frame;
            while let Some(event) = events.next_if(|e| e.frame <= frame) {
                apply_event(&mut model, &mut view, event);
            }
            model.update(&view);

            while let Some(query) = queries.next_if(|q| q.frame <= frame) {
                let answer = ask(&mut model, query.kind);
                tracing::debug!(frame, query = ?query.kind, %answer, "Answered query");
                answers.push(AnsweredQuery {
                    frame,
                    query: query.kind,
                    answer,
                });
            }
        }

        let report = ScenarioReport {
            name: self.name.clone(),
            final_frame: self.until,
            enabled: model.enabled(None),
            state_hash: model.state_hash(),
            implied_units: model
                .implied_units()
                .into_iter()
                .map(|(unit_type, frame)| ImpliedUnit { unit_type, frame })
                .collect(),
            supply_buildings: model.supply_buildings().to_vec(),
            answers,
        };
        (report, model)
    }
}

fn apply_event(model: &mut OpponentEconomicModel, view: &mut MatchSnapshot, event: &ScenarioEvent) {
    match &event.kind {
        EventKind::Created {
            unit_type,
            id,
            creation_frame,
            known,
        } => model.unit_created(*unit_type, UnitId(*id), *creation_frame, *known),
        EventKind::Destroyed { unit_type, id } => {
            model.unit_destroyed(*unit_type, UnitId(*id), Some(event.frame));
        }
        EventKind::Researched { tech, start_frame } => model.researched(*tech, *start_frame),
        EventKind::Upgraded {
            upgrade,
            level,
            start_frame,
        } => model.upgraded(*upgrade, *level, *start_frame),
        EventKind::RaceRevealed(race) => view.race = *race,
        EventKind::BasesCompleted(bases) => view.completed_main_bases = *bases,
        EventKind::GeyserScouted => view.geyser_last_scouted = Some(event.frame),
    }
}

fn ask(model: &mut OpponentEconomicModel, query: QueryKind) -> QueryAnswer {
    match query {
        QueryKind::Enabled => QueryAnswer::Enabled(model.enabled(None)),
        QueryKind::WorstCase(unit_type, frame) => {
            QueryAnswer::Count(model.worst_case_unit_count(unit_type, frame))
        }
        QueryKind::MinimumProducers(producer) => {
            QueryAnswer::Producers(model.minimum_producer_count(producer))
        }
        QueryKind::HasBuilt(unit_type) => QueryAnswer::Built(model.has_built(unit_type)),
        QueryKind::EarliestProduction(unit_type) => {
            QueryAnswer::Frame(model.earliest_unit_production_frame(unit_type))
        }
    }
}

/// Path of a bundled scenario by name.
#[must_use]
pub fn bundled_scenario_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(format!("{name}.ron"))
}
