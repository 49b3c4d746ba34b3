//! Rooms and divisions known to the booking service.

/// Filter value that disables the room filter.
pub const ALL_ROOMS: &str = "all";
pub const SQUATS: &str = "squats";
pub const LUNGLES: &str = "lungles";
/// Value for schedule entries whose room is not recognised.
pub const UNKNOWN_ROOM: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOption {
  pub label: &'static str,
  pub value: &'static str,
}

/// Room choices for the schedule filter, "all" first.
pub const ROOM_OPTIONS: [SelectOption; 3] = [
  SelectOption {
    label: "Semua Ruangan",
    value: ALL_ROOMS,
  },
  SelectOption {
    label: "Squats Room",
    value: SQUATS,
  },
  SelectOption {
    label: "Lungles Room",
    value: LUNGLES,
  },
];

/// Rooms that can actually be booked.
pub const BOOKING_ROOM_OPTIONS: [SelectOption; 2] = [
  SelectOption {
    label: "Squats Room",
    value: SQUATS,
  },
  SelectOption {
    label: "Lungles Room",
    value: LUNGLES,
  },
];

pub const DIVISION_OPTIONS: [SelectOption; 6] = [
  SelectOption {
    label: "HR",
    value: "hr",
  },
  SelectOption {
    label: "Engineering",
    value: "engineering",
  },
  SelectOption {
    label: "Marketing",
    value: "marketing",
  },
  SelectOption {
    label: "Sales",
    value: "sales",
  },
  SelectOption {
    label: "Finance",
    value: "finance",
  },
  SelectOption {
    label: "Operations",
    value: "operations",
  },
];

/// Map a room name from the schedule ("Squats Room") to its filter value.
pub fn room_value_for_name(name: &str) -> &'static str {
  match name {
    "Squats Room" => SQUATS,
    "Lungles Room" => LUNGLES,
    _ => UNKNOWN_ROOM,
  }
}

/// Display name for a room value; unknown values are shown as given.
pub fn room_display_name(value: &str) -> &str {
  match value {
    SQUATS => "Squats Room",
    LUNGLES => "Lungles Room",
    ALL_ROOMS => "Semua Ruangan",
    other => other,
  }
}

pub fn is_bookable_room(value: &str) -> bool {
  BOOKING_ROOM_OPTIONS.iter().any(|o| o.value == value)
}

pub fn is_division(value: &str) -> bool {
  DIVISION_OPTIONS.iter().any(|o| o.value == value)
}
