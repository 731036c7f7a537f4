use crate::arsc::string_pool::StringPool;

pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_DIMENSION: u8 = 0x05;
pub const TYPE_FRACTION: u8 = 0x06;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;
pub const TYPE_INT_COLOR_ARGB8: u8 = 0x1C;
pub const TYPE_INT_COLOR_RGB8: u8 = 0x1D;
pub const TYPE_INT_COLOR_ARGB4: u8 = 0x1E;
pub const TYPE_INT_COLOR_RGB4: u8 = 0x1F;

/// Unit suffix carried in the low nibble of a dimension value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DimensionUnit {
    Px,
    Dp,
    Sp,
    Pt,
    In,
    Mm,
}

impl DimensionUnit {
    fn from_nibble(nibble: u8) -> Option<DimensionUnit> {
        match nibble {
            0 => Some(DimensionUnit::Px),
            1 => Some(DimensionUnit::Dp),
            2 => Some(DimensionUnit::Sp),
            3 => Some(DimensionUnit::Pt),
            4 => Some(DimensionUnit::In),
            5 => Some(DimensionUnit::Mm),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            DimensionUnit::Px => "px",
            DimensionUnit::Dp => "dp",
            DimensionUnit::Sp => "sp",
            DimensionUnit::Pt => "pt",
            DimensionUnit::In => "in",
            DimensionUnit::Mm => "mm",
        }
    }
}

/// Unit suffix carried in the low nibble of a fraction value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FractionUnit {
    /// Fraction of the base dimension (`%`).
    Base,
    /// Fraction of the parent dimension (`%p`).
    Parent,
}

impl FractionUnit {
    fn from_nibble(nibble: u8) -> Option<FractionUnit> {
        match nibble {
            0 => Some(FractionUnit::Base),
            1 => Some(FractionUnit::Parent),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            FractionUnit::Base => "%",
            FractionUnit::Parent => "%p",
        }
    }
}

/// Channel layout of a packed color value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorFormat {
    Argb8,
    Rgb8,
    Argb4,
    Rgb4,
}

/// A decoded `(data_type, data)` pair from a resource entry or XML
/// attribute.
///
/// `String` keeps its pool index so the same value can be rendered against
/// whichever pool the containing document uses; everything else is decoded
/// eagerly. Types this decoder does not understand land in `Opaque`.
#[derive(Clone, Debug, PartialEq)]
pub enum TypedValue {
    Null,
    Reference(u32),
    String(u32),
    Float(f32),
    Dimension(f32, DimensionUnit),
    Fraction(f32, FractionUnit),
    Int(i32),
    IntHex(u32),
    Bool(u32),
    Color(u32, ColorFormat),
    Opaque(u8, u32),
}

impl TypedValue {
    /// Decode a raw typed value word.
    pub fn decode(data_type: u8, data: u32) -> TypedValue {
        match data_type {
            TYPE_NULL => TypedValue::Null,
            TYPE_REFERENCE => TypedValue::Reference(data),
            TYPE_STRING => TypedValue::String(data),
            TYPE_FLOAT => TypedValue::Float(f32::from_bits(data)),
            TYPE_DIMENSION => match DimensionUnit::from_nibble((data & 0xF) as u8) {
                Some(unit) => TypedValue::Dimension(complex_to_float(data), unit),
                None => TypedValue::Opaque(data_type, data),
            },
            TYPE_FRACTION => match FractionUnit::from_nibble((data & 0xF) as u8) {
                Some(unit) => TypedValue::Fraction(round4(complex_to_float(data) * 100.0), unit),
                None => TypedValue::Opaque(data_type, data),
            },
            TYPE_INT_DEC => TypedValue::Int(data as i32),
            TYPE_INT_HEX => TypedValue::IntHex(data),
            TYPE_INT_BOOLEAN => TypedValue::Bool(data),
            TYPE_INT_COLOR_ARGB8 => TypedValue::Color(data, ColorFormat::Argb8),
            TYPE_INT_COLOR_RGB8 => TypedValue::Color(data, ColorFormat::Rgb8),
            TYPE_INT_COLOR_ARGB4 => TypedValue::Color(data, ColorFormat::Argb4),
            TYPE_INT_COLOR_RGB4 => TypedValue::Color(data, ColorFormat::Rgb4),
            other => TypedValue::Opaque(other, data),
        }
    }

    /// Render the textual form, resolving string indices against `strings`.
    /// `Null` has no textual form.
    pub fn render(&self, strings: &StringPool) -> Option<String> {
        match self {
            TypedValue::Null => None,
            TypedValue::Reference(id) => Some(format!("0x{id:x}")),
            TypedValue::String(idx) => Some(strings.get(*idx).unwrap_or_default().to_string()),
            TypedValue::Float(value) => Some(value.to_string()),
            TypedValue::Dimension(value, unit) => {
                Some(format!("{}{}", format_complex(*value), unit.suffix()))
            }
            TypedValue::Fraction(value, unit) => {
                Some(format!("{}{}", format_complex(*value), unit.suffix()))
            }
            TypedValue::Int(value) => Some(value.to_string()),
            TypedValue::IntHex(value) => Some(format!("0x{value:x}")),
            TypedValue::Bool(raw) => Some(
                match *raw {
                    0xFFFF_FFFF => "true",
                    0 => "false",
                    _ => "undefined",
                }
                .to_string(),
            ),
            TypedValue::Color(data, format) => Some(render_color(*data, *format)),
            TypedValue::Opaque(_, data) => Some(data.to_string()),
        }
    }
}

fn render_color(data: u32, format: ColorFormat) -> String {
    match format {
        ColorFormat::Argb8 => format!("#{data:08x}"),
        ColorFormat::Rgb8 => format!("#{:06x}", data & 0x00FF_FFFF),
        ColorFormat::Argb4 => format!(
            "#{:x}{:x}{:x}{:x}",
            (data >> 28) & 0xF,
            (data >> 20) & 0xF,
            (data >> 12) & 0xF,
            (data >> 4) & 0xF
        ),
        ColorFormat::Rgb4 => format!(
            "#{:x}{:x}{:x}",
            (data >> 20) & 0xF,
            (data >> 12) & 0xF,
            (data >> 4) & 0xF
        ),
    }
}

/// Decode the 32-bit fixed-point "complex" encoding used by dimensions and
/// fractions: a 24-bit mantissa in the high bits and a radix selector in
/// bits 4-5. The result is rounded to four decimal places.
pub(crate) fn complex_to_float(data: u32) -> f32 {
    const RADIX_MULTS: [f32; 4] = [
        1.0 / 256.0,
        1.0 / 32_768.0,
        1.0 / 8_388_608.0,
        1.0 / 2_147_483_648.0,
    ];
    let mantissa = (data & 0xFFFF_FF00) as i32 as f32;
    let radix = ((data >> 4) & 0x3) as usize;
    round4(mantissa * RADIX_MULTS[radix])
}

fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}

/// Dimension and fraction magnitudes always carry at least one decimal
/// digit (`16.0dp`, not `16dp`).
fn format_complex(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::empty_pool;

    fn rendered(data_type: u8, data: u32) -> Option<String> {
        TypedValue::decode(data_type, data).render(&empty_pool())
    }

    #[test]
    fn bool_decode() {
        assert_eq!(rendered(TYPE_INT_BOOLEAN, 0xFFFF_FFFF).as_deref(), Some("true"));
        assert_eq!(rendered(TYPE_INT_BOOLEAN, 0).as_deref(), Some("false"));
        assert_eq!(rendered(TYPE_INT_BOOLEAN, 1).as_deref(), Some("undefined"));
    }

    #[test]
    fn color_decode() {
        assert_eq!(
            rendered(TYPE_INT_COLOR_ARGB8, 0xFF11_2233).as_deref(),
            Some("#ff112233")
        );
        assert_eq!(
            rendered(TYPE_INT_COLOR_RGB8, 0x00AA_BBCC).as_deref(),
            Some("#aabbcc")
        );
        assert_eq!(
            rendered(TYPE_INT_COLOR_ARGB4, 0xFFAA_BBCC).as_deref(),
            Some("#fabc")
        );
        assert_eq!(
            rendered(TYPE_INT_COLOR_RGB4, 0x00AA_BBCC).as_deref(),
            Some("#abc")
        );
    }

    #[test]
    fn dimension_decode() {
        assert_eq!(rendered(TYPE_DIMENSION, (16 << 8) | 0x01).as_deref(), Some("16.0dp"));
        assert_eq!(rendered(TYPE_DIMENSION, (8 << 8) | 0x02).as_deref(), Some("8.0sp"));
        assert_eq!(rendered(TYPE_DIMENSION, 24 << 8).as_deref(), Some("24.0px"));
    }

    #[test]
    fn fraction_decode() {
        assert_eq!(rendered(TYPE_FRACTION, 1 << 8).as_deref(), Some("100.0%"));
        assert_eq!(rendered(TYPE_FRACTION, (1 << 8) | 0x01).as_deref(), Some("100.0%p"));
    }

    #[test]
    fn integer_decode() {
        assert_eq!(rendered(TYPE_INT_DEC, 10).as_deref(), Some("10"));
        assert_eq!(rendered(TYPE_INT_DEC, 0xFFFF_FFFF).as_deref(), Some("-1"));
        assert_eq!(rendered(TYPE_INT_HEX, 0x1A).as_deref(), Some("0x1a"));
    }

    #[test]
    fn reference_and_null() {
        assert_eq!(
            rendered(TYPE_REFERENCE, 0x7F01_0000).as_deref(),
            Some("0x7f010000")
        );
        assert_eq!(rendered(TYPE_NULL, 0), None);
    }

    #[test]
    fn unknown_type_renders_raw_decimal() {
        assert_eq!(rendered(0x42, 1234).as_deref(), Some("1234"));
    }

    #[test]
    fn complex_roundtrips_radix0_mantissas() {
        for mantissa in 0u32..=255 {
            let data = mantissa << 8;
            assert_eq!(complex_to_float(data), mantissa as f32);
        }
    }

    #[test]
    fn float_decode() {
        assert_eq!(
            rendered(TYPE_FLOAT, 1.5f32.to_bits()).as_deref(),
            Some("1.5")
        );
    }
}
