//! Core gamepad data model: the control layout advertised to the kernel and
//! the current state of every control.

use serde::{Deserialize, Serialize};

/// Maximum number of digital buttons a layout may declare. The state keeps
/// buttons in a single 64-bit field.
pub const MAX_BUTTONS: u8 = 64;

/// Default logical range for analog axes, matching a signed 16-bit stick.
pub const AXIS_MIN: i32 = -32767;
pub const AXIS_MAX: i32 = 32767;

/// HID Generic Desktop usages for analog axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisUsage {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
}

impl AxisUsage {
    /// Usage ID on the Generic Desktop usage page.
    pub fn usage_id(&self) -> u8 {
        match self {
            AxisUsage::X => 0x30,
            AxisUsage::Y => 0x31,
            AxisUsage::Z => 0x32,
            AxisUsage::Rx => 0x33,
            AxisUsage::Ry => 0x34,
            AxisUsage::Rz => 0x35,
        }
    }
}

/// One analog axis and its logical value range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AxisSpec {
    pub usage: AxisUsage,
    #[serde(default = "AxisSpec::default_min")]
    pub min: i32,
    #[serde(default = "AxisSpec::default_max")]
    pub max: i32,
}

impl AxisSpec {
    /// Create an axis with the default ±32767 range.
    pub fn new(usage: AxisUsage) -> Self {
        Self {
            usage,
            min: AXIS_MIN,
            max: AXIS_MAX,
        }
    }

    fn default_min() -> i32 {
        AXIS_MIN
    }

    fn default_max() -> i32 {
        AXIS_MAX
    }
}

/// Control layout of the virtual gamepad. Fixed at startup; both the report
/// descriptor and the report codec are generated from the same layout, so the
/// two can never disagree about field placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct GamepadLayout {
    /// Number of digital buttons, numbered from 1.
    pub button_count: u8,
    /// Analog axes in report order, each packed as a signed 16-bit field.
    pub axes: Vec<AxisSpec>,
    /// Advertise a 2-byte rumble output report (left/right motor levels).
    pub rumble: bool,
}

impl Default for GamepadLayout {
    /// 32 buttons and two sticks (X/Y and Z/Rz) at ±32767.
    fn default() -> Self {
        Self {
            button_count: 32,
            axes: vec![
                AxisSpec::new(AxisUsage::X),
                AxisSpec::new(AxisUsage::Y),
                AxisSpec::new(AxisUsage::Z),
                AxisSpec::new(AxisUsage::Rz),
            ],
            rumble: false,
        }
    }
}

impl GamepadLayout {
    /// Bytes occupied by the button bitfield, including pad bits.
    pub fn button_bytes(&self) -> usize {
        (self.button_count as usize).div_ceil(8)
    }

    /// Total size of one input report in bytes.
    pub fn input_report_len(&self) -> usize {
        self.button_bytes() + 2 * self.axes.len()
    }

    /// Position of the given axis usage in the report, if declared.
    pub fn axis_index(&self, usage: AxisUsage) -> Option<usize> {
        self.axes.iter().position(|spec| spec.usage == usage)
    }
}

/// Snapshot of every control. Buttons are numbered from 1; bit `n - 1` of the
/// bitfield holds button `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamepadState {
    pub buttons: u64,
    pub axes: Vec<i32>,
}

impl GamepadState {
    /// A centered state with all buttons released for the given layout.
    pub fn new(layout: &GamepadLayout) -> Self {
        Self {
            buttons: 0,
            axes: vec![0; layout.axes.len()],
        }
    }

    /// Whether the given 1-based button is currently pressed.
    pub fn button(&self, number: u8) -> bool {
        number >= 1 && number <= 64 && (self.buttons >> (number - 1)) & 1 == 1
    }

    /// Apply a single change from the input source. Returns `false` when the
    /// change names a control the layout does not declare, leaving the state
    /// untouched.
    pub fn apply(&mut self, layout: &GamepadLayout, change: &InputChange) -> bool {
        match change {
            InputChange::Button { number, pressed } => {
                if *number == 0 || *number > layout.button_count {
                    return false;
                }
                let bit = 1u64 << (number - 1);
                if *pressed {
                    self.buttons |= bit;
                } else {
                    self.buttons &= !bit;
                }
                true
            }
            InputChange::Axis { usage, value } => {
                let Some(index) = layout.axis_index(*usage) else {
                    return false;
                };
                self.axes[index] = *value;
                true
            }
            InputChange::Snapshot(snapshot) => {
                if snapshot.axes.len() != layout.axes.len() {
                    return false;
                }
                *self = snapshot.clone();
                true
            }
            InputChange::Reset => {
                self.buttons = 0;
                self.axes.fill(0);
                true
            }
        }
    }
}

/// A discrete state change produced by the external input source.
#[derive(Debug, Clone, PartialEq)]
pub enum InputChange {
    /// Press or release one button (numbered from 1).
    Button { number: u8, pressed: bool },
    /// Move one axis to an absolute position.
    Axis { usage: AxisUsage, value: i32 },
    /// Replace the whole state with a new snapshot.
    Snapshot(GamepadState),
    /// Release all buttons and center all axes.
    Reset,
}
