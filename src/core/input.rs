use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Lane {
    Left = 0,
    Down = 1,
    Up = 2,
    Right = 3,
}

impl Lane {
    pub const ALL: [Lane; 4] = [Lane::Left, Lane::Down, Lane::Up, Lane::Right];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn from_index(i: usize) -> Self {
        Self::ALL[i % 4]
    }
}

impl core::fmt::Display for Lane {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Left => write!(f, "Left"),
            Self::Down => write!(f, "Down"),
            Self::Up => write!(f, "Up"),
            Self::Right => write!(f, "Right"),
        }
    }
}

/// A logical pad action, independent of the device that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VirtualAction {
    Arrow(Lane),
    /// Hit the beatline with the current note bar.
    Confirm,
}

impl FromStr for VirtualAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Arrow(Lane::Left)),
            "down" => Ok(Self::Arrow(Lane::Down)),
            "up" => Ok(Self::Arrow(Lane::Up)),
            "right" => Ok(Self::Arrow(Lane::Right)),
            "confirm" | "space" | "hit" => Ok(Self::Confirm),
            other => Err(format!("'{other}' is not a valid VirtualAction setting")),
        }
    }
}

impl core::fmt::Display for VirtualAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Arrow(lane) => write!(f, "{lane}"),
            Self::Confirm => write!(f, "Confirm"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputEvent {
    /// 1-based pad number.
    pub player: u8,
    pub action: VirtualAction,
    pub pressed: bool,
    /// Round time of the press in milliseconds.
    pub timestamp_ms: f64,
}

impl InputEvent {
    pub fn press(player: u8, action: VirtualAction, timestamp_ms: f64) -> Self {
        Self {
            player,
            action,
            pressed: true,
            timestamp_ms,
        }
    }

    /// 0-based slot, or `None` for player 0.
    #[inline(always)]
    pub fn slot(&self) -> Option<usize> {
        (self.player as usize).checked_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::{InputEvent, Lane, VirtualAction};

    #[test]
    fn actions_parse_from_config_names() {
        assert_eq!("LEFT".parse::<VirtualAction>(), Ok(VirtualAction::Arrow(Lane::Left)));
        assert_eq!(" confirm ".parse::<VirtualAction>(), Ok(VirtualAction::Confirm));
        assert!("jump".parse::<VirtualAction>().is_err());
        for lane in Lane::ALL {
            let action = VirtualAction::Arrow(lane);
            assert_eq!(action.to_string().parse::<VirtualAction>(), Ok(action));
        }
    }

    #[test]
    fn player_numbers_are_one_based() {
        let ev = InputEvent::press(1, VirtualAction::Confirm, 0.0);
        assert_eq!(ev.slot(), Some(0));
        let ev = InputEvent::press(0, VirtualAction::Confirm, 0.0);
        assert_eq!(ev.slot(), None);
    }

    #[test]
    fn lane_indices_round_trip() {
        for lane in Lane::ALL {
            assert_eq!(Lane::from_index(lane.index()), lane);
        }
    }
}
