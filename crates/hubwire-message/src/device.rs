//! Device notification sub-records.
//!
//! A device notification aggregates live sensor and actuator state. Its
//! payload is a sequence of sub-records, each a sub-type byte followed by a
//! fixed little-endian layout. The layouts live in [`RECORD_LAYOUTS`] and the
//! parser is driven entirely by that table.

use bytes::{Buf, BufMut};
use serde::Serialize;

use crate::error::{MessageError, Result};
use crate::types::MessageType;

/// Primitive field encodings used by sub-records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    U8,
    I8,
    U16,
    I16,
    I32,
}

impl FieldType {
    pub const fn width(self) -> usize {
        match self {
            FieldType::U8 | FieldType::I8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::I32 => 4,
        }
    }

    fn range(self) -> (i64, i64) {
        match self {
            FieldType::U8 => (0, u8::MAX.into()),
            FieldType::I8 => (i8::MIN.into(), i8::MAX.into()),
            FieldType::U16 => (0, u16::MAX.into()),
            FieldType::I16 => (i16::MIN.into(), i16::MAX.into()),
            FieldType::I32 => (i32::MIN.into(), i32::MAX.into()),
        }
    }

    fn read(self, src: &mut &[u8]) -> i32 {
        match self {
            FieldType::U8 => src.get_u8().into(),
            FieldType::I8 => src.get_i8().into(),
            FieldType::U16 => src.get_u16_le().into(),
            FieldType::I16 => src.get_i16_le().into(),
            FieldType::I32 => src.get_i32_le(),
        }
    }

    // Values are range-checked when a record is constructed.
    fn write(self, value: i32, dst: &mut Vec<u8>) {
        match self {
            FieldType::U8 => dst.put_u8(value as u8),
            FieldType::I8 => dst.put_i8(value as i8),
            FieldType::U16 => dst.put_u16_le(value as u16),
            FieldType::I16 => dst.put_i16_le(value as i16),
            FieldType::I32 => dst.put_i32_le(value),
        }
    }
}

/// A named run of `count` fields of the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: &'static str,
    pub ty: FieldType,
    pub count: usize,
}

const fn field(name: &'static str, ty: FieldType) -> FieldLayout {
    FieldLayout { name, ty, count: 1 }
}

const fn repeated(name: &'static str, ty: FieldType, count: usize) -> FieldLayout {
    FieldLayout { name, ty, count }
}

/// Sub-record kinds, keyed by their sub-type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum DeviceRecordKind {
    Battery = 0x00,
    Imu = 0x01,
    Matrix5x5 = 0x02,
    Motor = 0x0A,
    Force = 0x0B,
    Color = 0x0C,
    Distance = 0x0D,
    Matrix3x3 = 0x0E,
}

impl DeviceRecordKind {
    pub const fn sub_type(self) -> u8 {
        self as u8
    }

    pub fn layout(self) -> &'static RecordLayout {
        match self {
            Self::Battery => &BATTERY,
            Self::Imu => &IMU,
            Self::Matrix5x5 => &MATRIX_5X5,
            Self::Motor => &MOTOR,
            Self::Force => &FORCE,
            Self::Color => &COLOR,
            Self::Distance => &DISTANCE,
            Self::Matrix3x3 => &MATRIX_3X3,
        }
    }

    pub fn name(self) -> &'static str {
        self.layout().name
    }
}

/// Fixed layout of one sub-record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub kind: DeviceRecordKind,
    pub name: &'static str,
    /// Encoded size including the sub-type byte.
    pub width: usize,
    pub fields: &'static [FieldLayout],
}

impl RecordLayout {
    /// Number of decoded values (the sub-type byte is not one of them).
    pub fn value_count(&self) -> usize {
        self.fields.iter().map(|field| field.count).sum()
    }

    fn types(&self) -> impl Iterator<Item = FieldType> + '_ {
        self.fields
            .iter()
            .flat_map(|field| std::iter::repeat_n(field.ty, field.count))
    }
}

use FieldType::{I16, I32, I8, U16, U8};

/// Layouts of all known sub-records.
const BATTERY: RecordLayout = RecordLayout {
    kind: DeviceRecordKind::Battery,
    name: "Battery",
    width: 2,
    fields: &[field("level", U8)],
};

const IMU: RecordLayout = RecordLayout {
    kind: DeviceRecordKind::Imu,
    name: "IMU",
    width: 21,
    fields: &[
        field("face_up", U8),
        field("yaw_face", U8),
        field("yaw", I16),
        field("pitch", I16),
        field("roll", I16),
        field("accel_x", I16),
        field("accel_y", I16),
        field("accel_z", I16),
        field("gyro_x", I16),
        field("gyro_y", I16),
        field("gyro_z", I16),
    ],
};

const MATRIX_5X5: RecordLayout = RecordLayout {
    kind: DeviceRecordKind::Matrix5x5,
    name: "5x5",
    width: 26,
    fields: &[repeated("pixels", U8, 25)],
};

const MOTOR: RecordLayout = RecordLayout {
    kind: DeviceRecordKind::Motor,
    name: "Motor",
    width: 12,
    fields: &[
        field("port", U8),
        field("device_type", U8),
        field("absolute_position", I16),
        field("power", I16),
        field("speed", I8),
        field("position", I32),
    ],
};

const FORCE: RecordLayout = RecordLayout {
    kind: DeviceRecordKind::Force,
    name: "Force",
    width: 4,
    fields: &[field("port", U8), field("value", U8), field("pressed", U8)],
};

const COLOR: RecordLayout = RecordLayout {
    kind: DeviceRecordKind::Color,
    name: "Color",
    width: 9,
    fields: &[
        field("port", U8),
        field("color", I8),
        field("red", U16),
        field("green", U16),
        field("blue", U16),
    ],
};

const DISTANCE: RecordLayout = RecordLayout {
    kind: DeviceRecordKind::Distance,
    name: "Distance",
    width: 4,
    fields: &[field("port", U8), field("distance", I16)],
};

const MATRIX_3X3: RecordLayout = RecordLayout {
    kind: DeviceRecordKind::Matrix3x3,
    name: "3x3",
    width: 11,
    fields: &[field("port", U8), repeated("pixels", U8, 9)],
};

pub static RECORD_LAYOUTS: &[RecordLayout] = &[
    BATTERY,
    IMU,
    MATRIX_5X5,
    MOTOR,
    FORCE,
    COLOR,
    DISTANCE,
    MATRIX_3X3,
];

/// Look up the layout for a sub-type byte.
pub fn layout_for(sub_type: u8) -> Option<&'static RecordLayout> {
    RECORD_LAYOUTS
        .iter()
        .find(|layout| layout.kind.sub_type() == sub_type)
}

/// One decoded sub-record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    kind: DeviceRecordKind,
    values: Vec<i32>,
}

impl DeviceRecord {
    /// Build a record, checking the value count and each value's range.
    pub fn new(kind: DeviceRecordKind, values: Vec<i32>) -> Result<Self> {
        let layout = kind.layout();
        if values.len() != layout.value_count() {
            return Err(MessageError::InvalidField {
                message: MessageType::DeviceNotification,
                field: layout.name,
                reason: format!(
                    "expected {} values, got {}",
                    layout.value_count(),
                    values.len()
                ),
            });
        }

        for (ty, &value) in layout.types().zip(&values) {
            let (min, max) = ty.range();
            if !(min..=max).contains(&i64::from(value)) {
                return Err(MessageError::InvalidField {
                    message: MessageType::DeviceNotification,
                    field: layout.name,
                    reason: format!("value {value} out of range for {ty:?}"),
                });
            }
        }

        Ok(Self { kind, values })
    }

    pub fn kind(&self) -> DeviceRecordKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// Values grouped by field name, in layout order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &[i32])> + '_ {
        let mut start = 0usize;
        self.kind.layout().fields.iter().map(move |field| {
            let values = &self.values[start..start + field.count];
            start += field.count;
            (field.name, values)
        })
    }

    /// First value of the named field.
    pub fn get(&self, name: &str) -> Option<i32> {
        self.fields()
            .find(|(field, _)| *field == name)
            .and_then(|(_, values)| values.first().copied())
    }

    fn decode(layout: &RecordLayout, mut src: &[u8]) -> Self {
        src.advance(1);
        let values = layout.types().map(|ty| ty.read(&mut src)).collect();
        Self {
            kind: layout.kind,
            values,
        }
    }

    fn encode_into(&self, dst: &mut Vec<u8>) {
        dst.put_u8(self.kind.sub_type());
        for (ty, &value) in self.kind.layout().types().zip(&self.values) {
            ty.write(value, dst);
        }
    }
}

/// Where and why a device notification stopped parsing early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartialParse {
    /// Payload offset of the record that could not be parsed.
    pub offset: usize,
    /// Its sub-type byte.
    pub sub_type: u8,
    /// Payload bytes left unparsed.
    pub dropped: usize,
}

/// Aggregated device state (type 0x3C).
///
/// Decoding never discards the records parsed before a problem: an unknown
/// sub-type or a record cut short stops the parse and is kept as
/// [`PartialParse`], and a declared size that disagrees with the payload is
/// kept too. [`validate`](Self::validate) turns either into an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceNotification {
    declared_size: u16,
    #[serde(skip)]
    payload: Vec<u8>,
    records: Vec<DeviceRecord>,
    partial: Option<PartialParse>,
}

/// Bytes before the payload: type byte and declared size.
pub(crate) const DEVICE_NOTIFICATION_HEADER: usize = 3;

impl DeviceNotification {
    /// Build a notification from records.
    pub fn from_records(records: Vec<DeviceRecord>) -> Result<Self> {
        let mut payload = Vec::new();
        for record in &records {
            record.encode_into(&mut payload);
        }
        let declared_size =
            u16::try_from(payload.len()).map_err(|_| MessageError::EncodingConstraint {
                field: "device notification payload",
                len: payload.len(),
                max: u16::MAX.into(),
            })?;

        Ok(Self {
            declared_size,
            payload,
            records,
            partial: None,
        })
    }

    /// Parse a payload with its declared size.
    ///
    /// Records are read in order from the first `declared_size` bytes (or the
    /// whole payload, if shorter).
    pub fn parse(declared_size: u16, payload: Vec<u8>) -> Self {
        let window = usize::from(declared_size).min(payload.len());
        let mut records = Vec::new();
        let mut partial = None;
        let mut offset = 0usize;

        while offset < window {
            let sub_type = payload[offset];
            let remaining = window - offset;
            match layout_for(sub_type) {
                Some(layout) if layout.width <= remaining => {
                    records.push(DeviceRecord::decode(
                        layout,
                        &payload[offset..offset + layout.width],
                    ));
                    offset += layout.width;
                }
                _ => {
                    tracing::warn!(
                        sub_type,
                        offset,
                        dropped = remaining,
                        "device notification parse stopped early"
                    );
                    partial = Some(PartialParse {
                        offset,
                        sub_type,
                        dropped: remaining,
                    });
                    break;
                }
            }
        }

        Self {
            declared_size,
            payload,
            records,
            partial,
        }
    }

    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    /// Most recent record of a kind.
    pub fn record(&self, kind: DeviceRecordKind) -> Option<&DeviceRecord> {
        self.records.iter().rev().find(|record| record.kind == kind)
    }

    pub fn declared_size(&self) -> u16 {
        self.declared_size
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn partial(&self) -> Option<PartialParse> {
        self.partial
    }

    /// Report a size mismatch or a partial parse.
    pub fn validate(&self) -> Result<()> {
        let declared = usize::from(self.declared_size);
        if declared != self.payload.len() {
            return Err(MessageError::SizeMismatch {
                message: MessageType::DeviceNotification,
                expected: declared + DEVICE_NOTIFICATION_HEADER,
                actual: self.payload.len() + DEVICE_NOTIFICATION_HEADER,
            });
        }
        if let Some(partial) = self.partial {
            return Err(MessageError::PartialParse {
                offset: partial.offset,
                sub_type: partial.sub_type,
                dropped: partial.dropped,
            });
        }
        Ok(())
    }

    pub(crate) fn encode_into(&self, dst: &mut Vec<u8>) {
        dst.put_u16_le(self.declared_size);
        dst.put_slice(&self.payload);
    }
}
