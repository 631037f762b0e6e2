//! Move vocabulary
//!
//! A move is a named, finite list of actions pinned to frame offsets relative
//! to the moment the move starts. Moves are pure data: the scheduler walks the
//! timeline, so the same [`Move`] can be executed any number of times.
//!
//! ```text
//! jump:  frame 0  press(south)
//!        frame 4  release(south)
//! ```
//!
//! The [`MoveVocabulary`] is filled once at startup (built-ins, then moves from
//! the config file) and shared read-only behind an `Arc` afterwards.

pub mod builtin;
mod params;

pub use params::{MoveParams, ParamValue, Params};

use crate::config::MoveDefinition;
use crate::core::types::{Action, ActionStep, AxisId, AxisStep, ButtonId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Invalid move definition. Fatal at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("move name must not be empty")]
    EmptyName,

    #[error("move '{0}' has no steps")]
    Empty(String),

    #[error("move '{0}' is already registered")]
    Duplicate(String),

    #[error("move '{name}' step {index}: frame {frame} is before previous frame {previous}")]
    NonMonotonic {
        name: String,
        index: usize,
        frame: u32,
        previous: u32,
    },

    #[error("move '{name}' step {index}: {reason}")]
    InvalidAction {
        name: String,
        index: usize,
        reason: String,
    },
}

/// Named timeline of frame-indexed actions
#[derive(Debug, Clone, PartialEq)]
pub struct Move {
    name: String,
    steps: Vec<ActionStep>,
}

impl Move {
    pub fn new(name: impl Into<String>, steps: Vec<ActionStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Start building a move step by step
    pub fn builder(name: &str) -> MoveBuilder {
        MoveBuilder {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[ActionStep] {
        &self.steps
    }

    /// Offset of the final step
    pub fn last_frame(&self) -> u32 {
        self.steps.last().map_or(0, |s| s.frame)
    }

    /// Number of frames the timeline spans (last offset + 1)
    pub fn frame_length(&self) -> u32 {
        if self.steps.is_empty() {
            0
        } else {
            self.last_frame().saturating_add(1)
        }
    }

    /// Check the timeline: non-empty, non-decreasing offsets, in-range axis values
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        if self.steps.is_empty() {
            return Err(DefinitionError::Empty(self.name.clone()));
        }

        let mut previous = 0;
        for (index, step) in self.steps.iter().enumerate() {
            if step.frame < previous {
                return Err(DefinitionError::NonMonotonic {
                    name: self.name.clone(),
                    index,
                    frame: step.frame,
                    previous,
                });
            }
            previous = step.frame;

            if let Action::SetAxis { axis, value } = step.action {
                value
                    .check(axis)
                    .map_err(|reason| DefinitionError::InvalidAction {
                        name: self.name.clone(),
                        index,
                        reason,
                    })?;
            }
        }
        Ok(())
    }
}

/// Fluent construction of a [`Move`]
pub struct MoveBuilder {
    name: String,
    steps: Vec<ActionStep>,
}

impl MoveBuilder {
    pub fn at(mut self, frame: u32, action: Action) -> Self {
        self.steps.push(ActionStep::new(frame, action));
        self
    }

    pub fn press(self, frame: u32, button: ButtonId) -> Self {
        self.at(frame, Action::press(button))
    }

    pub fn release(self, frame: u32, button: ButtonId) -> Self {
        self.at(frame, Action::release(button))
    }

    /// Press at `frame` and release `hold` frames later
    pub fn tap(self, frame: u32, button: ButtonId, hold: u32) -> Self {
        self.press(frame, button).release(frame + hold, button)
    }

    pub fn axis(self, frame: u32, axis: AxisId, value: f32) -> Self {
        self.at(frame, Action::axis(axis, value))
    }

    pub fn hat(self, frame: u32, axis: AxisId, step: AxisStep) -> Self {
        self.at(frame, Action::hat(axis, step))
    }

    pub fn center(self, frame: u32, axis: AxisId) -> Self {
        self.at(frame, Action::center(axis))
    }

    pub fn build(self) -> Move {
        Move::new(self.name, self.steps)
    }
}

/// Move name and timeline length, as reported by `ListMoves`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInfo {
    pub name: String,
    pub frames: u32,
}

/// Registry of moves, keyed by unique name
#[derive(Debug, Default)]
pub struct MoveVocabulary {
    moves: BTreeMap<String, Arc<Move>>,
}

impl MoveVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vocabulary holding the built-in moves
    pub fn with_builtins() -> Result<Self, DefinitionError> {
        let mut vocabulary = Self::new();
        for mv in builtin::moves() {
            vocabulary.register(mv)?;
        }
        Ok(vocabulary)
    }

    /// Built-ins followed by the moves defined in the config file
    pub fn from_definitions(definitions: &[MoveDefinition]) -> Result<Self, DefinitionError> {
        let mut vocabulary = Self::with_builtins()?;
        for definition in definitions {
            vocabulary.register(definition.to_move())?;
        }
        Ok(vocabulary)
    }

    /// Validate and add a move. Names are unique.
    pub fn register(&mut self, mv: Move) -> Result<(), DefinitionError> {
        mv.validate()?;
        if self.moves.contains_key(mv.name()) {
            return Err(DefinitionError::Duplicate(mv.name().to_string()));
        }
        log::debug!(
            "Registered move '{}' ({} steps, {} frames)",
            mv.name(),
            mv.steps().len(),
            mv.frame_length()
        );
        self.moves.insert(mv.name().to_string(), Arc::new(mv));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Move>> {
        self.moves.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.moves.keys().map(String::as_str)
    }

    /// Name and frame length of every move, sorted by name
    pub fn infos(&self) -> Vec<MoveInfo> {
        self.moves
            .values()
            .map(|mv| MoveInfo {
                name: mv.name().to_string(),
                frames: mv.frame_length(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AxisValue;

    fn jump() -> Move {
        Move::builder("jump")
            .press(0, ButtonId::South)
            .release(4, ButtonId::South)
            .build()
    }

    #[test]
    fn test_lookup_returns_registered_move() {
        let mut vocabulary = MoveVocabulary::new();
        vocabulary.register(jump()).unwrap();
        assert_eq!(*vocabulary.lookup("jump").unwrap(), jump());
        assert!(vocabulary.lookup("moonwalk").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut vocabulary = MoveVocabulary::new();
        vocabulary.register(jump()).unwrap();
        assert_eq!(
            vocabulary.register(jump()),
            Err(DefinitionError::Duplicate("jump".to_string()))
        );
        assert_eq!(vocabulary.len(), 1);
    }

    #[test]
    fn test_non_monotonic_rejected() {
        let mv = Move::builder("backwards")
            .press(4, ButtonId::South)
            .release(2, ButtonId::South)
            .build();
        assert_eq!(
            mv.validate(),
            Err(DefinitionError::NonMonotonic {
                name: "backwards".to_string(),
                index: 1,
                frame: 2,
                previous: 4,
            })
        );
    }

    #[test]
    fn test_equal_offsets_allowed() {
        let mv = Move::builder("both")
            .press(0, ButtonId::South)
            .press(0, ButtonId::East)
            .build();
        assert!(mv.validate().is_ok());
        assert_eq!(mv.frame_length(), 1);
    }

    #[test]
    fn test_invalid_axis_value_rejected() {
        let mv = Move::new(
            "overdrive",
            vec![ActionStep::new(
                0,
                Action::SetAxis {
                    axis: AxisId::LeftTrigger,
                    value: AxisValue::Analog(-0.3),
                },
            )],
        );
        assert!(matches!(
            mv.validate(),
            Err(DefinitionError::InvalidAction { index: 0, .. })
        ));
    }

    #[test]
    fn test_empty_move_rejected() {
        assert_eq!(
            Move::new("nothing", Vec::new()).validate(),
            Err(DefinitionError::Empty("nothing".to_string()))
        );
        assert_eq!(
            Move::builder(" ").press(0, ButtonId::South).build().validate(),
            Err(DefinitionError::EmptyName)
        );
    }

    #[test]
    fn test_builtins_and_config_moves() {
        let definitions = vec![MoveDefinition {
            name: "taunt".to_string(),
            steps: vec![
                ActionStep::new(0, Action::hat(AxisId::HatY, AxisStep::Negative)),
                ActionStep::new(3, Action::center(AxisId::HatY)),
            ],
        }];
        let vocabulary = MoveVocabulary::from_definitions(&definitions).unwrap();
        assert!(vocabulary.lookup("jump").is_some());
        assert_eq!(vocabulary.lookup("taunt").unwrap().frame_length(), 4);

        let names: Vec<&str> = vocabulary.names().collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_config_move_cannot_shadow_builtin() {
        let definitions = vec![MoveDefinition {
            name: "jump".to_string(),
            steps: vec![ActionStep::new(0, Action::press(ButtonId::North))],
        }];
        assert_eq!(
            MoveVocabulary::from_definitions(&definitions).unwrap_err(),
            DefinitionError::Duplicate("jump".to_string())
        );
    }
}
