use crate::gamepad::{AxisSpec, AxisUsage, GamepadLayout, GamepadState, InputChange};
use crate::report::{decode_input, decode_output, encode_input, CodecError};

fn pressed(layout: &GamepadLayout, numbers: &[u8]) -> GamepadState {
    let mut state = GamepadState::new(layout);
    for number in numbers {
        state.apply(
            layout,
            &InputChange::Button {
                number: *number,
                pressed: true,
            },
        );
    }
    state
}

#[test]
fn test_default_report_layout() {
    let layout = GamepadLayout::default();
    let mut state = pressed(&layout, &[1, 9, 32]);
    state.axes = vec![-32767, 32767, 0, 258];

    let report = encode_input(&state, &layout).expect("should encode");
    // 4 button bytes followed by 4 little-endian i16 axes.
    assert_eq!(report.len(), 12);
    assert_eq!(&report[0..4], &[0x01, 0x01, 0x00, 0x80]);
    assert_eq!(&report[4..6], &[0x01, 0x80]);
    assert_eq!(&report[6..8], &[0xFF, 0x7F]);
    assert_eq!(&report[8..10], &[0x00, 0x00]);
    assert_eq!(&report[10..12], &[0x02, 0x01]);
}

#[test]
fn test_round_trip() {
    let layout = GamepadLayout::default();
    let mut state = pressed(&layout, &[2, 17, 31]);
    state.axes = vec![123, -456, 7, -32767];

    let report = encode_input(&state, &layout).expect("should encode");
    let decoded = decode_input(&report, &layout).expect("should decode");
    assert_eq!(decoded, state);
}

#[test]
fn test_round_trip_with_padded_buttons() {
    let layout = GamepadLayout {
        button_count: 10,
        ..Default::default()
    };
    let state = pressed(&layout, &[1, 10]);

    let report = encode_input(&state, &layout).expect("should encode");
    // 2 button bytes (6 pad bits) plus 4 axes.
    assert_eq!(report.len(), 10);
    assert_eq!(&report[0..2], &[0x01, 0x02]);
    let decoded = decode_input(&report, &layout).expect("should decode");
    assert_eq!(decoded, state);
}

#[test]
fn test_encoding_is_deterministic() {
    let layout = GamepadLayout::default();
    let mut state = pressed(&layout, &[5]);
    state.axes = vec![1, 2, 3, 4];
    assert_eq!(
        encode_input(&state, &layout).expect("should encode"),
        encode_input(&state.clone(), &layout).expect("should encode"),
    );
}

#[test]
fn test_axis_overflow_rejected() {
    let layout = GamepadLayout::default();
    let mut state = GamepadState::new(&layout);
    state.axes[1] = 32768;

    let err = encode_input(&state, &layout).expect_err("out-of-range axis should fail");
    assert_eq!(
        err,
        CodecError::FieldOverflow {
            field: "axis Y".to_string(),
            value: 32768,
            min: -32767,
            max: 32767,
        }
    );
}

#[test]
fn test_narrow_axis_range_enforced() {
    let layout = GamepadLayout {
        button_count: 1,
        axes: vec![AxisSpec {
            usage: AxisUsage::Z,
            min: 0,
            max: 255,
        }],
        rumble: false,
    };
    let mut state = GamepadState::new(&layout);
    state.axes[0] = 255;
    assert!(encode_input(&state, &layout).is_ok());
    state.axes[0] = 256;
    assert!(matches!(
        encode_input(&state, &layout),
        Err(CodecError::FieldOverflow { .. })
    ));
}

#[test]
fn test_button_beyond_layout_rejected() {
    let layout = GamepadLayout::default();
    let mut state = GamepadState::new(&layout);
    state.buttons = 1 << 40;

    let err = encode_input(&state, &layout).expect_err("stray button bit should fail");
    assert_eq!(
        err,
        CodecError::FieldOverflow {
            field: "button".to_string(),
            value: 41,
            min: 1,
            max: 32,
        }
    );
}

#[test]
fn test_decode_length_checked() {
    let layout = GamepadLayout::default();
    let err = decode_input(&[0u8; 11], &layout).expect_err("wrong length should fail");
    assert_eq!(
        err,
        CodecError::BadLength {
            len: 11,
            expected: 12
        }
    );
}

#[test]
fn test_decode_output_rumble() {
    let layout = GamepadLayout {
        rumble: true,
        ..Default::default()
    };
    let output = decode_output(&[0x12, 0x34], &layout).expect("should decode");
    assert_eq!(output.rumble_left, 0x12);
    assert_eq!(output.rumble_right, 0x34);

    // hidraw prepends a zero report-ID byte
    let output = decode_output(&[0x00, 0x12, 0x34], &layout).expect("should decode");
    assert_eq!(output.rumble_left, 0x12);

    assert!(matches!(
        decode_output(&[0x12], &layout),
        Err(CodecError::BadLength { .. })
    ));
    assert!(matches!(
        decode_output(&[0x12, 0x34], &GamepadLayout::default()),
        Err(CodecError::NoOutputFields)
    ));
}
