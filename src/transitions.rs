//! Transition registration and validation

use crate::{EventKind, RegistrationError, SagaState};

/// Where a transition may fire from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// The implicit condition before an instance exists
    Initial,
    /// Any existing instance, whatever its state
    Any,
}

impl Source {
    fn label(&self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::Any => "Any",
        }
    }
}

/// What a transition does
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Create the instance, run the start action, move to `target`
    Create {
        /// State the new instance lands in
        target: SagaState,
    },
    /// Answer with the current state; never persists anything
    Respond,
}

/// A single registered transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Source condition
    pub source: Source,
    /// Triggering event type
    pub event: EventKind,
    /// Behavior when fired
    pub effect: Effect,
}

/// Builder for a state machine's transitions.
///
/// Shape errors are caught as transitions are registered; `build` then
/// checks that every event type is handled.
#[derive(Default)]
pub struct TransitionTable {
    transitions: Vec<Transition>,
    error: Option<RegistrationError>,
}

impl TransitionTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Transitions equivalent to the base state machine: `StartProcessing`
    /// creates the instance in `Processing`, `ProcessingStatusRequested`
    /// answers from any state.
    pub fn standard() -> Transitions {
        Transitions {
            start_target: SagaState::Processing,
            transitions: vec![
                Transition {
                    source: Source::Initial,
                    event: EventKind::StartProcessing,
                    effect: Effect::Create {
                        target: SagaState::Processing,
                    },
                },
                Transition {
                    source: Source::Any,
                    event: EventKind::ProcessingStatusRequested,
                    effect: Effect::Respond,
                },
            ],
        }
    }

    /// Register the start transition: from the initial condition, `event`
    /// creates the instance and moves it to `target`.
    pub fn initially(mut self, event: EventKind, target: SagaState) -> Self {
        if !event.is_creating() {
            self.reject(RegistrationError::WrongShape {
                event,
                transition: "start",
            });
            return self;
        }
        self.register(Transition {
            source: Source::Initial,
            event,
            effect: Effect::Create { target },
        })
    }

    /// Register a read-only query transition usable from any state
    pub fn during_any_respond(mut self, event: EventKind) -> Self {
        if event.is_creating() {
            self.reject(RegistrationError::WrongShape {
                event,
                transition: "query",
            });
            return self;
        }
        self.register(Transition {
            source: Source::Any,
            event,
            effect: Effect::Respond,
        })
    }

    /// Validate and freeze the table
    pub fn build(self) -> Result<Transitions, RegistrationError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        for event in EventKind::ALL {
            if !self.transitions.iter().any(|t| t.event == *event) {
                return Err(RegistrationError::Unhandled(*event));
            }
        }
        let start_target = self
            .transitions
            .iter()
            .find_map(|t| match t.effect {
                Effect::Create { target } => Some(target),
                Effect::Respond => None,
            })
            .ok_or(RegistrationError::Unhandled(EventKind::StartProcessing))?;
        Ok(Transitions {
            transitions: self.transitions,
            start_target,
        })
    }

    fn register(mut self, transition: Transition) -> Self {
        let conflict = self
            .transitions
            .iter()
            .any(|t| t.event == transition.event && t.source == transition.source);
        if conflict {
            self.reject(RegistrationError::Conflict {
                event: transition.event,
                source_state: transition.source.label().into(),
            });
        } else {
            self.transitions.push(transition);
        }
        self
    }

    fn reject(&mut self, error: RegistrationError) {
        // First error wins; later registrations cannot mask it.
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// A validated transition table. Only obtainable through
/// [`TransitionTable::build`] or [`TransitionTable::standard`].
#[derive(Clone, Debug)]
pub struct Transitions {
    transitions: Vec<Transition>,
    start_target: SagaState,
}

impl Transitions {
    /// State a freshly created instance lands in
    pub fn start_target(&self) -> SagaState {
        self.start_target
    }

    /// All registered transitions
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_matches_built() {
        let built = TransitionTable::new()
            .initially(EventKind::StartProcessing, SagaState::Processing)
            .during_any_respond(EventKind::ProcessingStatusRequested)
            .build()
            .unwrap();

        let standard = TransitionTable::standard();
        assert_eq!(built.start_target(), SagaState::Processing);
        assert_eq!(
            built.iter().copied().collect::<Vec<_>>(),
            standard.iter().copied().collect::<Vec<_>>()
        );

        let query = standard
            .iter()
            .find(|t| t.event == EventKind::ProcessingStatusRequested)
            .unwrap();
        assert_eq!(query.source, Source::Any);
        assert_eq!(query.effect, Effect::Respond);
    }

    #[test]
    fn test_missing_query_is_unhandled() {
        let err = TransitionTable::new()
            .initially(EventKind::StartProcessing, SagaState::Processing)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::Unhandled(EventKind::ProcessingStatusRequested)
        );
    }

    #[test]
    fn test_conflicting_start_registration() {
        let err = TransitionTable::new()
            .initially(EventKind::StartProcessing, SagaState::Processing)
            .initially(EventKind::StartProcessing, SagaState::Processing)
            .during_any_respond(EventKind::ProcessingStatusRequested)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::Conflict {
                event: EventKind::StartProcessing,
                ..
            }
        ));
    }

    #[test]
    fn test_wrong_shapes_rejected() {
        let err = TransitionTable::new()
            .during_any_respond(EventKind::StartProcessing)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::WrongShape {
                event: EventKind::StartProcessing,
                transition: "query"
            }
        );

        let err = TransitionTable::new()
            .initially(EventKind::ProcessingStatusRequested, SagaState::Processing)
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::WrongShape { transition: "start", .. }));
    }
}
