//! Console UI State
//!
//! Alerts and call-to-action state, updated only through [`reduce`]. The
//! console owns one [`UiState`] and threads it through explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Alerts
// =============================================================================

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertVariant {
    Danger,
    Warning,
    Info,
    Success,
}

/// A user-visible alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Raising an alert with an existing id replaces it
    pub id: String,
    pub variant: AlertVariant,
    pub title: String,
    pub description: String,
    pub dismissible: bool,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        id: impl Into<String>,
        variant: AlertVariant,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            variant,
            title: title.into(),
            description: description.into(),
            dismissible: true,
            raised_at: Utc::now(),
        }
    }

    /// Alerts that stay until the condition behind them clears
    pub fn sticky(mut self) -> Self {
        self.dismissible = false;
        self
    }
}

// =============================================================================
// Call To Action
// =============================================================================

/// State of the primary "create storage cluster" action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CtaState {
    pub enabled: bool,
    /// Why the action is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// =============================================================================
// State + Reducer
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub alerts: Vec<Alert>,
    pub cta: CtaState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Add an alert, replacing one with the same id
    RaiseAlert(Alert),
    /// User dismissal; ignored for sticky alerts
    DismissAlert { id: String },
    /// Condition cleared; removes any alert with this id
    RetractAlert { id: String },
    SetCta(CtaState),
}

/// Apply one action
pub fn reduce(mut state: UiState, action: Action) -> UiState {
    match action {
        Action::RaiseAlert(alert) => {
            match state.alerts.iter_mut().find(|a| a.id == alert.id) {
                Some(existing) => *existing = alert,
                None => state.alerts.push(alert),
            }
        }
        Action::DismissAlert { id } => {
            state.alerts.retain(|a| a.id != id || !a.dismissible);
        }
        Action::RetractAlert { id } => {
            state.alerts.retain(|a| a.id != id);
        }
        Action::SetCta(cta) => state.cta = cta,
    }
    state
}
