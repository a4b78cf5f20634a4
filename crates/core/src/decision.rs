use serde::Serialize;

/// A button offered by a failure banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Retry,
    Cancel,
    EditAnyway,
    DontEdit,
    SaveAnyway,
    DontSave,
    Reload,
}

impl Action {
    /// Button label; `_` marks the mnemonic character.
    pub fn label(self) -> &'static str {
        match self {
            Action::Retry => "_Retry",
            Action::Cancel => "_Cancel",
            Action::EditAnyway => "Edit Any_way",
            Action::DontEdit => "D_on't Edit",
            Action::SaveAnyway => "S_ave Anyway",
            Action::DontSave => "D_on't Save",
            Action::Reload => "_Reload",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// What a failure banner should show. Messages are already escaped for markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub primary_message: String,
    pub secondary_message: Option<String>,
    pub actions: Vec<Action>,
    pub severity: Severity,
    /// The banner carries an encoding selector next to its buttons.
    pub requires_encoding_choice: bool,
}

impl Decision {
    pub(crate) fn new(severity: Severity, primary: String, secondary: Option<String>) -> Self {
        Self {
            primary_message: primary,
            secondary_message: secondary,
            actions: Vec::new(),
            severity,
            requires_encoding_choice: false,
        }
    }

    pub(crate) fn with_actions(mut self, actions: &[Action]) -> Self {
        for action in actions {
            if !self.actions.contains(action) {
                self.actions.push(*action);
            }
        }
        self
    }

    pub(crate) fn with_encoding_choice(mut self) -> Self {
        self.requires_encoding_choice = true;
        self
    }

    pub fn has_action(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    pub fn primary_markup(&self) -> String {
        format!("<b>{}</b>", self.primary_message)
    }

    pub fn secondary_markup(&self) -> Option<String> {
        self.secondary_message
            .as_ref()
            .map(|text| format!("<small>{text}</small>"))
    }
}
