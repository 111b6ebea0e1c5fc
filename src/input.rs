use crossterm::event::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Quit,
    ToggleSampling,
    /// Move to the next longer sampling period.
    LongerPeriod,
    ShorterPeriod,
    ToggleWindow,
    Refresh,
    Export,
    NextInstrument,
    PrevInstrument,
}

pub fn parse_command(key_code: &KeyCode) -> Option<UiCommand> {
    match key_code {
        KeyCode::Esc => Some(UiCommand::Quit),
        KeyCode::Right => Some(UiCommand::NextInstrument),
        KeyCode::Left => Some(UiCommand::PrevInstrument),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(UiCommand::LongerPeriod),
        KeyCode::Char('-') | KeyCode::Char('_') => Some(UiCommand::ShorterPeriod),
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'q' => Some(UiCommand::Quit),
            's' | ' ' => Some(UiCommand::ToggleSampling),
            'w' => Some(UiCommand::ToggleWindow),
            'r' => Some(UiCommand::Refresh),
            'e' => Some(UiCommand::Export),
            'n' => Some(UiCommand::NextInstrument),
            'p' => Some(UiCommand::PrevInstrument),
            _ => None,
        },
        _ => None,
    }
}
