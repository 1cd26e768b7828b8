// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
    Idle,
    Registering,
    UploadPrompt,
    Analyzing,
    Results,
    Error,
    Success,
    Admin,
}

impl FlowState {
    pub const ALL: [Self; 8] = [
        Self::Idle,
        Self::Registering,
        Self::UploadPrompt,
        Self::Analyzing,
        Self::Results,
        Self::Error,
        Self::Success,
        Self::Admin,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Registering => "registering",
            Self::UploadPrompt => "upload_prompt",
            Self::Analyzing => "analyzing",
            Self::Results => "results",
            Self::Error => "error",
            Self::Success => "success",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowEvent {
    StartQuote,
    CancelRegistration,
    RegistrationSubmitted,
    ImageSelected,
    AnalysisSucceeded,
    AnalysisFailed,
    OrderSubmitted,
    Reset,
    OpenAdmin,
    CloseAdmin,
}

impl FlowEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartQuote => "start_quote",
            Self::CancelRegistration => "cancel_registration",
            Self::RegistrationSubmitted => "registration_submitted",
            Self::ImageSelected => "image_selected",
            Self::AnalysisSucceeded => "analysis_succeeded",
            Self::AnalysisFailed => "analysis_failed",
            Self::OrderSubmitted => "order_submitted",
            Self::Reset => "reset",
            Self::OpenAdmin => "open_admin",
            Self::CloseAdmin => "close_admin",
        }
    }
}

impl fmt::Display for FlowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work the caller performs after a transition is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEffect {
    ClearSession,
    ReloadLandingMedia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {event} while {state} -- finish or reset the current step first")]
pub struct FlowError {
    pub state: FlowState,
    pub event: FlowEvent,
}

pub struct Transition {
    pub from: FlowState,
    pub event: FlowEvent,
    pub to: FlowState,
    pub effects: &'static [FlowEffect],
}

pub const TRANSITIONS: &[Transition] = &[
    Transition {
        from: FlowState::Idle,
        event: FlowEvent::StartQuote,
        to: FlowState::Registering,
        effects: &[FlowEffect::ClearSession],
    },
    Transition {
        from: FlowState::Registering,
        event: FlowEvent::CancelRegistration,
        to: FlowState::Idle,
        effects: &[],
    },
    Transition {
        from: FlowState::Registering,
        event: FlowEvent::Reset,
        to: FlowState::Idle,
        effects: &[FlowEffect::ClearSession],
    },
    Transition {
        from: FlowState::Registering,
        event: FlowEvent::RegistrationSubmitted,
        to: FlowState::UploadPrompt,
        effects: &[],
    },
    Transition {
        from: FlowState::UploadPrompt,
        event: FlowEvent::ImageSelected,
        to: FlowState::Analyzing,
        effects: &[],
    },
    Transition {
        from: FlowState::UploadPrompt,
        event: FlowEvent::Reset,
        to: FlowState::Idle,
        effects: &[FlowEffect::ClearSession],
    },
    Transition {
        from: FlowState::Analyzing,
        event: FlowEvent::AnalysisSucceeded,
        to: FlowState::Results,
        effects: &[],
    },
    Transition {
        from: FlowState::Analyzing,
        event: FlowEvent::AnalysisFailed,
        to: FlowState::Error,
        effects: &[],
    },
    Transition {
        from: FlowState::Results,
        event: FlowEvent::OrderSubmitted,
        to: FlowState::Success,
        effects: &[],
    },
    Transition {
        from: FlowState::Results,
        event: FlowEvent::Reset,
        to: FlowState::Idle,
        effects: &[FlowEffect::ClearSession],
    },
    Transition {
        from: FlowState::Error,
        event: FlowEvent::Reset,
        to: FlowState::Idle,
        effects: &[FlowEffect::ClearSession],
    },
    Transition {
        from: FlowState::Success,
        event: FlowEvent::Reset,
        to: FlowState::Idle,
        effects: &[FlowEffect::ClearSession],
    },
    Transition {
        from: FlowState::Idle,
        event: FlowEvent::OpenAdmin,
        to: FlowState::Admin,
        effects: &[],
    },
    Transition {
        from: FlowState::Admin,
        event: FlowEvent::CloseAdmin,
        to: FlowState::Idle,
        effects: &[FlowEffect::ReloadLandingMedia],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomerFlow {
    state: FlowState,
}

impl Default for CustomerFlow {
    fn default() -> Self {
        Self {
            state: FlowState::Idle,
        }
    }
}

impl CustomerFlow {
    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn can(&self, event: FlowEvent) -> bool {
        lookup(self.state, event).is_some()
    }

    /// Applies `event`, returning the effects to run. A rejected event leaves
    /// the state untouched.
    pub fn dispatch(&mut self, event: FlowEvent) -> Result<&'static [FlowEffect], FlowError> {
        let transition = lookup(self.state, event).ok_or(FlowError {
            state: self.state,
            event,
        })?;
        tracing::debug!(
            from = %self.state,
            to = %transition.to,
            event = %event,
            "flow transition"
        );
        self.state = transition.to;
        Ok(transition.effects)
    }
}

fn lookup(state: FlowState, event: FlowEvent) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|transition| transition.from == state && transition.event == event)
}
