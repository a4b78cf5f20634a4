pub mod preferences;

pub use preferences::{
    EditorPreferences, Preferences, PreferencesError, PreferencesStore, PrintPreferences,
    PrintWrapMode, DEFAULT_BODY_FONT, DEFAULT_HEADER_FONT, DEFAULT_NUMBERS_FONT,
};
